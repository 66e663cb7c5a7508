#![deny(missing_docs)]
//! In-memory implementation of `mini-agent-core`'s `EventStore` trait.
//!
//! Uses a `HashMap<String, Vec<Event>>` behind a `RwLock`, with a per-name
//! `tokio::sync::Mutex` guarding append ordering so concurrent appenders for
//! the same conversation still serialize, matching the on-disk backend's
//! per-conversation discipline even though there is nothing to corrupt in
//! memory. Suitable for testing and short-lived processes — nothing survives
//! process restart.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use mini_agent_core::{Event, EventStore, LoadError, SaveError};
use tokio::sync::{Mutex, RwLock};

/// In-memory event store backed by a `HashMap` behind a `RwLock`.
pub struct InMemoryEventStore {
    logs: RwLock<HashMap<String, Vec<Event>>>,
    write_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl InMemoryEventStore {
    /// Create a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            logs: RwLock::new(HashMap::new()),
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock_for(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.write_locks.lock().await;
        Arc::clone(
            locks
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn load(&self, name: &str) -> Result<Vec<Event>, LoadError> {
        let logs = self.logs.read().await;
        Ok(logs.get(name).cloned().unwrap_or_default())
    }

    async fn append(&self, name: &str, events: &[Event]) -> Result<(), SaveError> {
        let lock = self.lock_for(name).await;
        let _guard = lock.lock().await;

        let mut logs = self.logs.write().await;
        logs.entry(name.to_string()).or_default().extend_from_slice(events);
        Ok(())
    }

    async fn exists(&self, name: &str) -> Result<bool, LoadError> {
        let logs = self.logs.read().await;
        Ok(logs.contains_key(name))
    }

    async fn list(&self) -> Result<Vec<String>, LoadError> {
        let logs = self.logs.read().await;
        Ok(logs.keys().cloned().collect())
    }
}
