#![deny(missing_docs)]
//! Filesystem-backed implementation of `mini-agent-core`'s `EventStore`
//! trait.
//!
//! Each conversation maps to one JSON file, `{root}/conversations/{name}.json`,
//! holding `{ "events": [...] }`. Appends for the same conversation are
//! serialized by a single consumer task per name (spawned lazily on first
//! use); each commit reads the current file, concatenates the new events,
//! writes a freshly-serialized full file to a sibling temp path, and
//! atomically renames it into place. Different conversations proceed fully
//! independently — there is one consumer task per name, not a global writer.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mini_agent_core::{Event, EventStore, LoadError, SaveError};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, Mutex};

#[derive(Serialize, Deserialize)]
struct Container {
    events: Vec<Event>,
}

struct AppendRequest {
    events: Vec<Event>,
    reply: oneshot::Sender<Result<(), SaveError>>,
}

/// Filesystem-backed event store.
///
/// Directory layout:
/// ```text
/// root/
///   conversations/
///     <name>.json
/// ```
pub struct FsEventStore {
    root: PathBuf,
    writers: Mutex<HashMap<String, mpsc::UnboundedSender<AppendRequest>>>,
}

impl FsEventStore {
    /// Create a new filesystem store rooted at the given directory. The
    /// directory is created lazily on first append.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), writers: Mutex::new(HashMap::new()) }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join("conversations").join(format!("{name}.json"))
    }

    async fn writer_for(&self, name: &str) -> mpsc::UnboundedSender<AppendRequest> {
        let mut writers = self.writers.lock().await;
        if let Some(tx) = writers.get(name) {
            return tx.clone();
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let path = self.path_for(name);
        tokio::spawn(run_writer(path, rx));
        writers.insert(name.to_string(), tx.clone());
        tx
    }
}

async fn run_writer(path: PathBuf, mut rx: mpsc::UnboundedReceiver<AppendRequest>) {
    while let Some(request) = rx.recv().await {
        let result = commit_append(&path, request.events).await;
        // The caller may have dropped its receiver (e.g. timed out); that's
        // fine, the commit still happened durably.
        let _ = request.reply.send(result);
    }
}

async fn commit_append(path: &Path, new_events: Vec<Event>) -> Result<(), SaveError> {
    let mut events = read_events(path).await.map_err(|e| SaveError::Io {
        name: conversation_name(path),
        cause: e.to_string(),
    })?;
    events.extend(new_events);

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| SaveError::Io {
            name: conversation_name(path),
            cause: e.to_string(),
        })?;
    }

    let json = serde_json::to_string_pretty(&Container { events }).map_err(|e| SaveError::Io {
        name: conversation_name(path),
        cause: e.to_string(),
    })?;

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, json).await.map_err(|e| SaveError::Io {
        name: conversation_name(path),
        cause: e.to_string(),
    })?;
    tokio::fs::rename(&tmp_path, path).await.map_err(|e| SaveError::Io {
        name: conversation_name(path),
        cause: e.to_string(),
    })?;
    Ok(())
}

async fn read_events(path: &Path) -> Result<Vec<Event>, LoadError> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => {
            let container: Container = serde_json::from_str(&contents).map_err(|e| LoadError::Corrupt {
                name: conversation_name(path),
                cause: e.to_string(),
            })?;
            Ok(container.events)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(LoadError::Io { name: conversation_name(path), cause: e.to_string() }),
    }
}

fn conversation_name(path: &Path) -> String {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or("unknown").to_string()
}

#[async_trait]
impl EventStore for FsEventStore {
    async fn load(&self, name: &str) -> Result<Vec<Event>, LoadError> {
        read_events(&self.path_for(name)).await
    }

    async fn append(&self, name: &str, events: &[Event]) -> Result<(), SaveError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let tx = self.writer_for(name).await;
        tx.send(AppendRequest { events: events.to_vec(), reply: reply_tx })
            .map_err(|_| SaveError::Io {
                name: name.to_string(),
                cause: "writer task for conversation is gone".to_string(),
            })?;
        reply_rx.await.map_err(|_| SaveError::Io {
            name: name.to_string(),
            cause: "writer task dropped the reply channel".to_string(),
        })?
    }

    async fn exists(&self, name: &str) -> Result<bool, LoadError> {
        Ok(tokio::fs::metadata(self.path_for(name)).await.is_ok())
    }

    async fn list(&self) -> Result<Vec<String>, LoadError> {
        let dir = self.root.join("conversations");
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(LoadError::Io { name: "*".to_string(), cause: e.to_string() }),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| LoadError::Io { name: "*".to_string(), cause: e.to_string() })?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                names.push(conversation_name(&path));
            }
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mini_agent_core::{EventPayload, SessionName};
    use std::sync::Arc;

    fn user_message(text: &str, n: u64) -> Event {
        let mut event = Event::unstamped(EventPayload::UserMessage {
            content: text.into(),
            attachments: vec![],
        });
        event.stamp(&SessionName::new("alpha"), n, None);
        event
    }

    #[tokio::test]
    async fn load_on_absent_conversation_is_empty_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsEventStore::new(dir.path());
        let events = store.load("missing").await.unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn append_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsEventStore::new(dir.path());
        store.append("alpha", &[user_message("hi", 0)]).await.unwrap();
        let loaded = store.load("alpha").await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].payload, EventPayload::UserMessage {
            content: "hi".into(),
            attachments: vec![],
        });
    }

    #[tokio::test]
    async fn sequential_appends_accumulate() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsEventStore::new(dir.path());
        store.append("alpha", &[user_message("a", 0)]).await.unwrap();
        store.append("alpha", &[user_message("b", 1)]).await.unwrap();
        let loaded = store.load("alpha").await.unwrap();
        assert_eq!(loaded.len(), 2);
    }

    #[tokio::test]
    async fn concurrent_appends_to_same_name_are_serialized_and_both_land() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsEventStore::new(dir.path()));

        let mut handles = Vec::new();
        for i in 0..20u64 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.append("alpha", &[user_message(&i.to_string(), i)]).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let loaded = store.load("alpha").await.unwrap();
        assert_eq!(loaded.len(), 20);
    }

    #[tokio::test]
    async fn different_conversations_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsEventStore::new(dir.path());
        store.append("alpha", &[user_message("hi", 0)]).await.unwrap();
        assert!(store.exists("alpha").await.unwrap());
        assert!(!store.exists("beta").await.unwrap());
    }

    #[tokio::test]
    async fn corrupt_file_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let conv_dir = dir.path().join("conversations");
        tokio::fs::create_dir_all(&conv_dir).await.unwrap();
        tokio::fs::write(conv_dir.join("alpha.json"), b"not json").await.unwrap();

        let store = FsEventStore::new(dir.path());
        let result = store.load("alpha").await;
        assert!(matches!(result, Err(LoadError::Corrupt { .. })));
    }

    #[tokio::test]
    async fn list_returns_every_known_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsEventStore::new(dir.path());
        store.append("alpha", &[user_message("a", 0)]).await.unwrap();
        store.append("beta", &[user_message("b", 0)]).await.unwrap();
        let mut names = store.list().await.unwrap();
        names.sort();
        assert_eq!(names, vec!["alpha".to_string(), "beta".to_string()]);
    }

    #[test]
    fn fs_store_implements_event_store() {
        fn _assert_event_store<T: EventStore>() {}
        _assert_event_store::<FsEventStore>();
    }
}
