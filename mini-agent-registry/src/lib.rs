#![deny(missing_docs)]
//! The process-wide registry: creates session actors on demand, caches
//! them, and tears them down cleanly.
//!
//! Creation dedup combines a lookup map with a "creation in progress" map
//! whose values are single-shot promises: concurrent `get_or_create` calls
//! for the same name either find a cached actor, await an in-progress
//! promise, or become the one caller that performs the creation. The
//! promise is a [`tokio::sync::watch`] channel seeded with `None` and
//! resolved once to `Some(result)` — every waiter observes the same
//! outcome, success or failure.

use std::collections::HashMap;
use std::sync::Arc;

use mini_agent_actor::SessionHandle;
use mini_agent_core::{CreationError, EventStore, NotFound, SessionName, TurnService};
use tokio::sync::{watch, Mutex};

type CreationResult = Result<SessionHandle, CreationError>;

/// The process-wide session registry.
///
/// One `Registry` is shared (via `Arc`) across every front-end in a
/// process; it owns the mapping from session name to actor and is the only
/// thing that creates or tears down actors.
pub struct Registry {
    store: Arc<dyn EventStore>,
    turn_service: Arc<dyn TurnService>,
    debounce_ms: u64,
    cache: Mutex<HashMap<String, SessionHandle>>,
    creating: Mutex<HashMap<String, watch::Receiver<Option<CreationResult>>>>,
}

impl Registry {
    /// Build a registry backed by the given store and turn service, shared
    /// by every session it creates.
    #[must_use]
    pub fn new(store: Arc<dyn EventStore>, turn_service: Arc<dyn TurnService>, debounce_ms: u64) -> Self {
        Self {
            store,
            turn_service,
            debounce_ms,
            cache: Mutex::new(HashMap::new()),
            creating: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached actor for `name`, creating and loading it first if
    /// necessary. Concurrent calls for the same name are deduplicated onto a
    /// single creation and return the same actor instance.
    pub async fn get_or_create(&self, name: &str) -> CreationResult {
        if let Some(handle) = self.cache.lock().await.get(name).cloned() {
            return Ok(handle);
        }

        let role = {
            let mut creating = self.creating.lock().await;

            // Re-check under the creating-map lock: another caller may have
            // finished and populated the cache between our fast-path check
            // above and acquiring this lock.
            if let Some(handle) = self.cache.lock().await.get(name).cloned() {
                return Ok(handle);
            }

            if let Some(rx) = creating.get(name).cloned() {
                Role::Waiter(rx)
            } else {
                let (tx, rx) = watch::channel(None);
                creating.insert(name.to_string(), rx);
                Role::Creator(tx)
            }
        };

        match role {
            Role::Waiter(rx) => await_promise(rx).await,
            Role::Creator(tx) => {
                let result = self.create(name).await;

                if let Ok(handle) = &result {
                    self.cache.lock().await.insert(name.to_string(), handle.clone());
                }
                let _ = tx.send(Some(result.clone()));
                self.creating.lock().await.remove(name);

                result
            }
        }
    }

    async fn create(&self, name: &str) -> CreationResult {
        let handle = mini_agent_actor::spawn(
            SessionName::new(name),
            Arc::clone(&self.store),
            Arc::clone(&self.turn_service),
            self.debounce_ms,
        )
        .await?;
        Ok(handle)
    }

    /// Return the cached actor for `name`, failing if it was never created.
    /// Unlike [`Registry::get_or_create`], this never creates one.
    pub async fn get(&self, name: &str) -> Result<SessionHandle, NotFound> {
        self.cache
            .lock()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| NotFound(name.to_string()))
    }

    /// List every currently-cached session name.
    pub async fn list(&self) -> Vec<String> {
        self.cache.lock().await.keys().cloned().collect()
    }

    /// Gracefully stop and remove one session, if present. A no-op if `name`
    /// is not cached.
    pub async fn shutdown(&self, name: &str) {
        let handle = self.cache.lock().await.remove(name);
        if let Some(handle) = handle {
            if let Err(error) = handle.end_session().await {
                tracing::warn!(session = name, %error, "session actor already gone during shutdown");
            }
        }
    }

    /// Gracefully stop and remove every session.
    pub async fn shutdown_all(&self) {
        let handles: Vec<(String, SessionHandle)> = self.cache.lock().await.drain().collect();
        let mut tasks = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            tasks.push(tokio::spawn(async move {
                if let Err(error) = handle.end_session().await {
                    tracing::warn!(session = %name, %error, "session actor already gone during shutdown_all");
                }
            }));
        }
        for task in tasks {
            let _ = task.await;
        }
    }
}

enum Role {
    Creator(watch::Sender<Option<CreationResult>>),
    Waiter(watch::Receiver<Option<CreationResult>>),
}

async fn await_promise(mut rx: watch::Receiver<Option<CreationResult>>) -> CreationResult {
    loop {
        if let Some(result) = rx.borrow().clone() {
            return result;
        }
        if rx.changed().await.is_err() {
            return Err(CreationError::Other(
                "creation task dropped its promise without resolving it".into(),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mini_agent_store_memory::InMemoryEventStore;
    use mini_agent_turn::EchoTurnService;

    fn registry() -> Registry {
        Registry::new(Arc::new(InMemoryEventStore::new()), Arc::new(EchoTurnService), 5)
    }

    #[tokio::test]
    async fn get_or_create_then_get_returns_same_session() {
        let registry = registry();
        registry.get_or_create("alpha").await.unwrap();
        assert!(registry.get("alpha").await.is_ok());
        assert_eq!(registry.list().await, vec!["alpha".to_string()]);
    }

    #[tokio::test]
    async fn get_on_unknown_session_is_not_found() {
        let registry = registry();
        assert!(registry.get("missing").await.is_err());
    }

    #[tokio::test]
    async fn concurrent_get_or_create_dedups_to_one_actor() {
        let registry = Arc::new(registry());

        let a = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.get_or_create("beta").await.unwrap() })
        };
        let b = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.get_or_create("beta").await.unwrap() })
        };

        let handle_a = a.await.unwrap();
        let handle_b = b.await.unwrap();

        let events = handle_a.get_events().await.unwrap();
        let session_started_count = events.iter().filter(|e| e.payload.tag() == "SessionStarted").count();
        assert_eq!(session_started_count, 1);

        // Both callers share the same mailbox sender — a message sent
        // through one handle is observable through the other.
        handle_b.interrupt_turn().await.unwrap();
        assert!(handle_a.is_idle().await.unwrap());
    }

    #[tokio::test]
    async fn shutdown_removes_the_session_from_the_cache() {
        let registry = registry();
        registry.get_or_create("gamma").await.unwrap();
        registry.shutdown("gamma").await;
        assert!(registry.get("gamma").await.is_err());
    }

    #[tokio::test]
    async fn shutdown_all_clears_every_session() {
        let registry = registry();
        registry.get_or_create("alpha").await.unwrap();
        registry.get_or_create("beta").await.unwrap();
        registry.shutdown_all().await;
        assert!(registry.list().await.is_empty());
    }
}
