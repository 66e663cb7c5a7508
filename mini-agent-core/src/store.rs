//! The event-store contract: per-conversation, serialized, atomic append.

use async_trait::async_trait;

use crate::error::{LoadError, SaveError};
use crate::event::Event;

/// A backend that durably persists each conversation's event log.
///
/// Implementations must serialize `append` per conversation name: concurrent
/// appenders for the same name enqueue and a single consumer processes them
/// in arrival order, committing atomically. Different names proceed fully
/// independently.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Load the full log for `name`. Returns an empty sequence if the
    /// conversation has never been persisted — absence is not an error.
    async fn load(&self, name: &str) -> Result<Vec<Event>, LoadError>;

    /// Atomically append `events` to `name`'s log. On failure, the caller's
    /// in-memory state must not be updated — the events are not committed.
    async fn append(&self, name: &str, events: &[Event]) -> Result<(), SaveError>;

    /// Whether a log exists for `name`.
    async fn exists(&self, name: &str) -> Result<bool, LoadError>;

    /// List every conversation name known to the store.
    async fn list(&self) -> Result<Vec<String>, LoadError>;
}
