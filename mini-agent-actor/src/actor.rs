//! The session actor task: a single-consumer loop owning one conversation's
//! event log, derived state, broadcast fan-out, and turn scheduling.
//!
//! Cancellation follows the pattern of a cooperating consumer loop observing
//! a [`CancellationToken`], not an asynchronous kill: the in-flight turn
//! runs in its own spawned task, which stops pulling its stream as soon as
//! the token fires and reports back through the same mailbox the actor
//! already serializes every other mutation through.

use std::time::{Duration, Instant};

use futures::StreamExt;
use mini_agent_core::{
    reduce_one, DerivedState, Event, EventId, EventPayload, EventStore, InterruptReason,
    SaveError, SessionEndReason, SessionName, TurnItem, TurnService,
};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::sleep_until;
use tokio_util::sync::CancellationToken;

use crate::command::Command;
use crate::handle::SessionHandle;

const MAILBOX_CAPACITY: usize = 256;
const BROADCAST_CAPACITY: usize = 256;

/// Spawn a new session actor task, loading `name`'s log from `store` first.
///
/// Returns once the actor has loaded its log and emitted `SessionStarted` —
/// callers (the registry) can rely on the returned handle immediately
/// reflecting that state.
pub async fn spawn(
    name: SessionName,
    store: Arc<dyn EventStore>,
    turn_service: Arc<dyn TurnService>,
    debounce_ms: u64,
) -> Result<SessionHandle, mini_agent_core::LoadError> {
    let loaded = store.load(name.as_str()).await?;
    let loaded_event_count = loaded.len() as u64;
    let derived = reduce_all(&loaded);

    let (mailbox_tx, mailbox_rx) = mpsc::channel(MAILBOX_CAPACITY);
    let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);

    let handle = SessionHandle { session_name: name.clone(), mailbox: mailbox_tx.clone() };

    let mut actor = SessionActor {
        name,
        store,
        turn_service,
        debounce_ms,
        events: loaded,
        derived,
        broadcast_tx,
        mailbox_tx,
        mailbox_rx,
        turn_counter: 0,
        current_turn: None,
    };

    actor
        .accept_persisted(EventPayload::SessionStarted { loaded_event_count }, None)
        .await
        .map_err(|e| mini_agent_core::LoadError::Io {
            name: actor.name.to_string(),
            cause: e.to_string(),
        })?;

    tokio::spawn(actor.run());

    Ok(handle)
}

fn reduce_all(events: &[Event]) -> DerivedState {
    events.iter().fold(DerivedState::default(), |state, event| reduce_one(&state, event))
}

struct ActiveTurn {
    turn_number: u64,
    cancel: CancellationToken,
    started_event_id: EventId,
    started_at: Instant,
    partial_response: String,
    saw_assistant_message: bool,
}

struct SessionActor {
    name: SessionName,
    store: Arc<dyn EventStore>,
    turn_service: Arc<dyn TurnService>,
    debounce_ms: u64,
    events: Vec<Event>,
    derived: DerivedState,
    broadcast_tx: broadcast::Sender<Event>,
    mailbox_tx: mpsc::Sender<Command>,
    mailbox_rx: mpsc::Receiver<Command>,
    turn_counter: u64,
    current_turn: Option<ActiveTurn>,
}

impl SessionActor {
    async fn run(mut self) {
        let mut debounce_deadline: Option<Instant> = None;

        loop {
            let sleep = async {
                match debounce_deadline {
                    Some(deadline) => sleep_until(deadline.into()).await,
                    None => futures::future::pending().await,
                }
            };

            tokio::select! {
                biased;

                maybe_command = self.mailbox_rx.recv() => {
                    match maybe_command {
                        Some(Command::EndSession { reply }) => {
                            self.teardown(SessionEndReason::Requested).await;
                            let _ = reply.send(());
                            break;
                        }
                        Some(command) => {
                            if self.handle_command(command).await {
                                debounce_deadline = Some(Instant::now() + Duration::from_millis(self.debounce_ms));
                            }
                        }
                        None => {
                            // Unreachable: `self.mailbox_tx` (cloned into every
                            // spawned turn-stream task) keeps at least one
                            // sender alive for as long as this loop runs, so
                            // `recv()` can only return `None` after `run`
                            // itself has already returned.
                            unreachable!("SessionActor holds its own mailbox sender for its entire lifetime")
                        }
                    }
                }

                () = sleep, if debounce_deadline.is_some() => {
                    debounce_deadline = None;
                    self.start_turn().await;
                }
            }
        }
    }

    /// Returns `true` if a (re)arm of the debounce timer is now warranted.
    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::AddEvent { payload, reply } => {
                let triggers_turn = payload.triggers_turn();
                if triggers_turn && self.current_turn.is_some() {
                    self.cancel_current_turn(InterruptReason::NewInput).await;
                }
                let result = self.accept_persisted(payload, None).await;
                let _ = reply.send(result);
                triggers_turn
            }
            Command::Subscribe { reply } => {
                let _ = reply.send(self.broadcast_tx.subscribe());
                false
            }
            Command::GetEvents { reply } => {
                let _ = reply.send(self.events.clone());
                false
            }
            Command::GetState { reply } => {
                let _ = reply.send(self.derived.clone());
                false
            }
            Command::IsIdle { reply } => {
                let _ = reply.send(self.current_turn.is_none());
                false
            }
            Command::InterruptTurn => {
                if self.current_turn.is_some() {
                    self.cancel_current_turn(InterruptReason::Explicit).await;
                }
                false
            }
            Command::EndSession { .. } => unreachable!("handled in run()"),
            Command::TurnStreamItem { turn_number, item } => {
                self.handle_turn_stream_item(turn_number, item).await;
                false
            }
            Command::TurnStreamEnded { turn_number } => {
                self.handle_turn_stream_ended(turn_number).await;
                false
            }
        }
    }

    async fn handle_turn_stream_item(&mut self, turn_number: u64, item: TurnItem) {
        let Some(active) = self.current_turn.as_ref() else { return };
        if active.turn_number != turn_number {
            return; // stale message from an already-cancelled turn
        }

        match item {
            Ok(EventPayload::TextDelta { delta }) => {
                let parent_id = self.current_turn.as_ref().map(|t| t.started_event_id.clone());
                if let Some(active) = self.current_turn.as_mut() {
                    active.partial_response.push_str(&delta);
                }
                self.accept_ephemeral(EventPayload::TextDelta { delta }, parent_id);
            }
            Ok(payload @ EventPayload::AssistantMessage { .. }) => {
                let parent_id = self.current_turn.as_ref().map(|t| t.started_event_id.clone());
                if self.accept_persisted(payload, parent_id).await.is_ok() {
                    if let Some(active) = self.current_turn.as_mut() {
                        active.saw_assistant_message = true;
                    }
                }
            }
            Ok(other) => {
                tracing::warn!(tag = other.tag(), "turn service yielded an unexpected event kind");
            }
            Err(turn_error) => {
                self.fail_current_turn(turn_number, turn_error.to_string()).await;
            }
        }
    }

    async fn handle_turn_stream_ended(&mut self, turn_number: u64) {
        let Some(active) = self.current_turn.as_ref() else { return };
        if active.turn_number != turn_number {
            return;
        }

        if active.saw_assistant_message {
            let duration_ms = active.started_at.elapsed().as_millis() as u64;
            let _ = self
                .accept_persisted(
                    EventPayload::TurnCompleted { turn_number, duration_ms },
                    Some(active.started_event_id.clone()),
                )
                .await;
            self.current_turn = None;
        } else {
            self.fail_current_turn(turn_number, "turn stream ended without a terminal AssistantMessage".into())
                .await;
        }
    }

    async fn fail_current_turn(&mut self, turn_number: u64, error: String) {
        let Some(active) = self.current_turn.take() else { return };
        if active.turn_number != turn_number {
            self.current_turn = Some(active);
            return;
        }
        let _ = self
            .accept_persisted(
                EventPayload::TurnFailed { turn_number, error },
                Some(active.started_event_id),
            )
            .await;
    }

    async fn cancel_current_turn(&mut self, reason: InterruptReason) {
        let Some(active) = self.current_turn.take() else { return };
        active.cancel.cancel();
        let _ = self
            .accept_persisted(
                EventPayload::TurnInterrupted {
                    turn_number: active.turn_number,
                    partial_response: active.partial_response,
                    reason,
                },
                Some(active.started_event_id),
            )
            .await;
    }

    async fn start_turn(&mut self) {
        if self.current_turn.is_some() {
            return;
        }

        self.turn_counter += 1;
        let turn_number = self.turn_counter;

        let started = match self
            .accept_persisted(EventPayload::TurnStarted { turn_number }, None)
            .await
        {
            Ok(event) => event,
            Err(_) => {
                self.turn_counter -= 1;
                return;
            }
        };

        let cancel = CancellationToken::new();
        self.current_turn = Some(ActiveTurn {
            turn_number,
            cancel: cancel.clone(),
            started_event_id: started.id.clone(),
            started_at: Instant::now(),
            partial_response: String::new(),
            saw_assistant_message: false,
        });

        let turn_service = Arc::clone(&self.turn_service);
        let state = self.derived.clone();
        let mailbox = self.mailbox_tx.clone();
        tokio::spawn(run_turn_stream(turn_number, cancel, state, turn_service, mailbox));
    }

    /// Stamp, persist, reduce, and broadcast one event. On a store failure
    /// the event is not applied to in-memory state and is not broadcast.
    async fn accept_persisted(
        &mut self,
        payload: EventPayload,
        parent_id: Option<EventId>,
    ) -> Result<Event, SaveError> {
        let mut event = Event::unstamped(payload);
        let event_number = self.derived.next_event_number;
        event.stamp(&self.name, event_number, parent_id);

        self.store.append(self.name.as_str(), std::slice::from_ref(&event)).await?;

        self.events.push(event.clone());
        self.derived = reduce_one(&self.derived, &event);
        let _ = self.broadcast_tx.send(event.clone());
        Ok(event)
    }

    /// Stamp, reduce, and broadcast an ephemeral event (`TextDelta`) without
    /// persisting it. Still advances `next_event_number`.
    fn accept_ephemeral(&mut self, payload: EventPayload, parent_id: Option<EventId>) -> Event {
        let mut event = Event::unstamped(payload);
        let event_number = self.derived.next_event_number;
        event.stamp(&self.name, event_number, parent_id);

        self.derived = reduce_one(&self.derived, &event);
        let _ = self.broadcast_tx.send(event.clone());
        event
    }

    async fn teardown(&mut self, reason: SessionEndReason) {
        if self.current_turn.is_some() {
            self.cancel_current_turn(InterruptReason::SessionEnding).await;
        }
        if let Err(error) = self.accept_persisted(EventPayload::SessionEnded { reason }, None).await {
            tracing::error!(session = %self.name, %error, "failed to persist SessionEnded; not retrying");
        }
    }
}

async fn run_turn_stream(
    turn_number: u64,
    cancel: CancellationToken,
    state: DerivedState,
    turn_service: Arc<dyn TurnService>,
    mailbox: mpsc::Sender<Command>,
) {
    let mut stream = turn_service.execute(&state);

    loop {
        let next = tokio::select! {
            () = cancel.cancelled() => break,
            next = stream.next() => next,
        };
        match next {
            Some(item) => {
                if mailbox.send(Command::TurnStreamItem { turn_number, item }).await.is_err() {
                    return; // actor is gone
                }
            }
            None => break,
        }
    }

    let _ = mailbox.send(Command::TurnStreamEnded { turn_number }).await;
}
