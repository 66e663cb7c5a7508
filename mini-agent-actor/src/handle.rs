//! [`SessionHandle`] — the cheap, clonable public face of a running
//! [`crate::actor::SessionActor`] task.

use mini_agent_core::{DerivedState, Event, EventPayload, SaveError, SessionName};
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::command::Command;

/// A lightweight, clonable reference to a running session actor.
///
/// Cloning a handle is cheap (an `mpsc::Sender` clone); every clone talks to
/// the same actor task. Dropping every handle does not stop the actor — only
/// [`SessionHandle::end_session`] or closing the mailbox does, since the
/// registry is what owns the actor's lifetime.
#[derive(Clone)]
pub struct SessionHandle {
    pub(crate) session_name: SessionName,
    pub(crate) mailbox: mpsc::Sender<Command>,
}

/// The mailbox closed — the actor task has already stopped. Callers treat
/// this as the session being gone, equivalent to a `NotFound`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("session actor for {0} is no longer running")]
pub struct ActorGone(pub String);

impl SessionHandle {
    /// This handle's session name.
    #[must_use]
    pub fn session_name(&self) -> &SessionName {
        &self.session_name
    }

    /// Submit one event for ingest. Resolves once the event has been durably
    /// appended (or failed to append) — not once any resulting turn
    /// completes.
    pub async fn add_event(&self, payload: EventPayload) -> Result<Result<Event, SaveError>, ActorGone> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::AddEvent { payload, reply }).await?;
        rx.await.map_err(|_| self.gone())
    }

    /// Subscribe to the live broadcast. The returned receiver yields only
    /// events published after this call — it does not replay history.
    pub async fn events(&self) -> Result<broadcast::Receiver<Event>, ActorGone> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Subscribe { reply }).await?;
        rx.await.map_err(|_| self.gone())
    }

    /// A snapshot of the full persisted log.
    pub async fn get_events(&self) -> Result<Vec<Event>, ActorGone> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::GetEvents { reply }).await?;
        rx.await.map_err(|_| self.gone())
    }

    /// A snapshot of the derived state.
    pub async fn get_state(&self) -> Result<DerivedState, ActorGone> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::GetState { reply }).await?;
        rx.await.map_err(|_| self.gone())
    }

    /// `true` iff no turn is currently in flight.
    pub async fn is_idle(&self) -> Result<bool, ActorGone> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::IsIdle { reply }).await?;
        rx.await.map_err(|_| self.gone())
    }

    /// Cancel any in-flight turn. A no-op if the actor is idle.
    pub async fn interrupt_turn(&self) -> Result<(), ActorGone> {
        self.send(Command::InterruptTurn).await
    }

    /// Gracefully stop the actor: cancel any in-flight turn, emit
    /// `SessionEnded`, and close the mailbox. Resolves once the actor task
    /// has finished tearing down.
    pub async fn end_session(&self) -> Result<(), ActorGone> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::EndSession { reply }).await?;
        rx.await.map_err(|_| self.gone())
    }

    async fn send(&self, command: Command) -> Result<(), ActorGone> {
        self.mailbox.send(command).await.map_err(|_| self.gone())
    }

    fn gone(&self) -> ActorGone {
        ActorGone(self.session_name.to_string())
    }
}
