//! The streaming turn contract: a pluggable language-model oracle.

use std::pin::Pin;

use futures::Stream;

use crate::error::TurnError;
use crate::event::EventPayload;
use crate::reducer::DerivedState;

/// One event produced by a turn in progress, before the session actor has
/// stamped identity fields onto it.
pub type TurnItem = Result<EventPayload, TurnError>;

/// A boxed stream of turn events. Dropping the stream (the consumer simply
/// stops polling it) is how cancellation propagates — the turn service is
/// expected to release its backing request on `Drop`, not via an explicit
/// cancel signal threaded through the trait.
pub type TurnStream = Pin<Box<dyn Stream<Item = TurnItem> + Send>>;

/// A pluggable streaming oracle that drives one model turn.
///
/// Pure with respect to the actor's state: `execute` takes a snapshot of
/// [`DerivedState`] and must not mutate it. The returned stream yields zero
/// or more `EventPayload::TextDelta` followed by exactly one
/// `EventPayload::AssistantMessage`, or a terminal `Err(TurnError)`.
pub trait TurnService: Send + Sync {
    /// Begin a turn against the given derived state, returning a stream of
    /// its events.
    fn execute(&self, state: &DerivedState) -> TurnStream;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn turn_service_is_object_safe_and_send_sync() {
        fn _assert_send_sync<T: Send + Sync>() {}
        _assert_send_sync::<Arc<dyn TurnService>>();
    }
}
