//! [`Service`] — the external facade, mapping every front-end-visible
//! operation onto the registry and its session actors.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use mini_agent_core::{Event, EventPayload, RuntimeConfig, ServiceError, TurnService};
use mini_agent_registry::Registry;
use tokio::time::Instant;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};

use crate::state_view::StateView;

/// The external service facade.
///
/// Wraps one [`Registry`] (and thus one event store and turn service) per
/// process. Every method maps actor/registry errors onto a single
/// [`ServiceError`], so front-ends never need to know about
/// [`mini_agent_core::NotFound`], [`mini_agent_core::CreationError`], or
/// [`mini_agent_core::SaveError`] individually.
#[derive(Clone)]
pub struct Service {
    registry: Arc<Registry>,
    config: RuntimeConfig,
}

impl Service {
    /// Build a facade over the given event store and turn service, using
    /// `config`'s `debounce_ms`/`idle_timeout_ms`/`idle_safety_cap_ms`.
    #[must_use]
    pub fn new(
        store: Arc<dyn mini_agent_core::EventStore>,
        turn_service: Arc<dyn TurnService>,
        config: RuntimeConfig,
    ) -> Self {
        let registry = Arc::new(Registry::new(store, turn_service, config.debounce_ms));
        Self { registry, config }
    }

    /// Submit events for ingest, creating the session if it does not yet
    /// exist. Returns the stamped events in submission order.
    pub async fn add_events(&self, session_name: &str, events: Vec<EventPayload>) -> Result<Vec<Event>, ServiceError> {
        let handle = self.registry.get_or_create(session_name).await?;
        let mut stamped = Vec::with_capacity(events.len());
        for payload in events {
            let event = handle
                .add_event(payload)
                .await
                .map_err(|e| ServiceError::message(e.to_string()))??;
            stamped.push(event);
        }
        Ok(stamped)
    }

    /// Subscribe to the live event broadcast. Yields only events published
    /// after this call — it does not replay history.
    pub async fn tap_event_stream(
        &self,
        session_name: &str,
    ) -> Result<Pin<Box<dyn Stream<Item = Event> + Send>>, ServiceError> {
        let handle = self.registry.get_or_create(session_name).await?;
        let receiver = handle.events().await.map_err(|e| ServiceError::message(e.to_string()))?;
        let stream = BroadcastStream::new(receiver).filter_map(|item| item.ok());
        Ok(Box::pin(stream))
    }

    /// A snapshot of the full persisted log.
    pub async fn get_events(&self, session_name: &str) -> Result<Vec<Event>, ServiceError> {
        let handle = self.registry.get(session_name).await?;
        handle.get_events().await.map_err(|e| ServiceError::message(e.to_string()))
    }

    /// A snapshot of derived state, shaped for front-ends.
    pub async fn get_state(&self, session_name: &str) -> Result<StateView, ServiceError> {
        let handle = self.registry.get(session_name).await?;
        let state = handle.get_state().await.map_err(|e| ServiceError::message(e.to_string()))?;
        Ok(state.into())
    }

    /// `true` iff no turn is in flight for the session.
    pub async fn is_idle(&self, session_name: &str) -> Result<bool, ServiceError> {
        let handle = self.registry.get(session_name).await?;
        handle.is_idle().await.map_err(|e| ServiceError::message(e.to_string()))
    }

    /// Gracefully stop and remove a session.
    pub async fn end_session(&self, session_name: &str) -> Result<(), ServiceError> {
        self.registry.shutdown(session_name).await;
        Ok(())
    }

    /// Cancel any in-flight turn for the session.
    pub async fn interrupt_turn(&self, session_name: &str) -> Result<(), ServiceError> {
        let handle = self.registry.get(session_name).await?;
        handle.interrupt_turn().await.map_err(|e| ServiceError::message(e.to_string()))
    }

    /// List every currently-cached session name.
    pub async fn list(&self) -> Vec<String> {
        self.registry.list().await
    }

    /// Submit events, then stream every resulting event (including ones
    /// from this call's own session creation) until the session returns to
    /// idle, bounded by an inactivity timeout and an overall safety cap.
    pub async fn add_and_stream_until_idle(
        &self,
        session_name: &str,
        events: Vec<EventPayload>,
        idle_timeout_ms: Option<u64>,
    ) -> Result<Pin<Box<dyn Stream<Item = Event> + Send>>, ServiceError> {
        let already_existed = self.registry.get(session_name).await.is_ok();
        let handle = self.registry.get_or_create(session_name).await?;

        // If this call is the one that created the session, its creation
        // events (at minimum `SessionStarted`) are already persisted but
        // predate any subscriber — replay them from the log snapshot so the
        // caller sees the full sequence from session start.
        let backlog = if already_existed {
            Vec::new()
        } else {
            handle.get_events().await.map_err(|e| ServiceError::message(e.to_string()))?
        };

        let mut subscription =
            handle.events().await.map_err(|e| ServiceError::message(e.to_string()))?;

        for payload in events {
            handle
                .add_event(payload)
                .await
                .map_err(|e| ServiceError::message(e.to_string()))??;
        }

        let idle_timeout = Duration::from_millis(idle_timeout_ms.unwrap_or(self.config.idle_timeout_ms));
        let safety_cap = Duration::from_millis(self.config.idle_safety_cap_ms);
        let handle = handle.clone();

        let stream = async_stream::stream! {
            for event in backlog {
                yield event;
            }

            let call_started = Instant::now();
            loop {
                if call_started.elapsed() >= safety_cap {
                    break;
                }

                tokio::select! {
                    biased;

                    received = subscription.recv() => {
                        match received {
                            Ok(event) => yield event,
                            Err(_) => break,
                        }
                    }
                    () = tokio::time::sleep(idle_timeout) => {
                        if handle.is_idle().await.unwrap_or(true) {
                            break;
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
