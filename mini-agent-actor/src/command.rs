//! The mailbox message type. The actor task is the only consumer; every
//! public [`crate::SessionHandle`] method is a thin `send` + await-reply.

use mini_agent_core::{DerivedState, Event, EventPayload, SaveError, TurnItem};
use tokio::sync::{broadcast, oneshot};

pub(crate) enum Command {
    AddEvent {
        payload: EventPayload,
        reply: oneshot::Sender<Result<Event, SaveError>>,
    },
    Subscribe {
        reply: oneshot::Sender<broadcast::Receiver<Event>>,
    },
    GetEvents {
        reply: oneshot::Sender<Vec<Event>>,
    },
    GetState {
        reply: oneshot::Sender<DerivedState>,
    },
    IsIdle {
        reply: oneshot::Sender<bool>,
    },
    InterruptTurn,
    EndSession {
        reply: oneshot::Sender<()>,
    },
    /// One item produced by the in-flight turn's stream, routed back through
    /// the mailbox so the actor loop remains the sole writer of its state.
    TurnStreamItem {
        turn_number: u64,
        item: TurnItem,
    },
    /// The in-flight turn's stream has been fully drained (success, error,
    /// or cancellation already handled upstream).
    TurnStreamEnded {
        turn_number: u64,
    },
}
