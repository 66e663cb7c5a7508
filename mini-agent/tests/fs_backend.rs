//! The same facade, backed by the filesystem store instead of memory —
//! proves the session actor and registry are indifferent to which
//! `EventStore` they're handed.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use mini_agent::prelude::*;
use mini_agent_core::RuntimeConfig;

fn fast_config(data_root: std::path::PathBuf) -> RuntimeConfig {
    RuntimeConfig { data_root, debounce_ms: 5, idle_timeout_ms: 30, idle_safety_cap_ms: 2_000, ..Default::default() }
}

#[tokio::test]
async fn turn_round_trips_through_the_filesystem_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FsEventStore::new(dir.path()));
    let service = Service::new(store, Arc::new(EchoTurnService), fast_config(dir.path().to_path_buf()));

    let stream = service
        .add_and_stream_until_idle(
            "alpha",
            vec![EventPayload::UserMessage { content: "hi".into(), attachments: vec![] }],
            None,
        )
        .await
        .unwrap();
    let events: Vec<_> = stream.collect().await;
    assert!(events.iter().any(|e| e.payload.tag() == "AssistantMessage"));

    service.end_session("alpha").await.unwrap();

    // Reopen against a fresh Service/registry over the same on-disk root.
    let store = Arc::new(FsEventStore::new(dir.path()));
    let reopened = Service::new(store, Arc::new(EchoTurnService), fast_config(dir.path().to_path_buf()));
    reopened.add_events("alpha", vec![]).await.unwrap();
    let reloaded = reopened.get_events("alpha").await.unwrap();

    assert!(reloaded.iter().any(|e| e.payload.tag() == "AssistantMessage"));
    assert!(reloaded.iter().all(|e| e.payload.tag() != "TextDelta"));
}

#[tokio::test]
async fn list_reflects_sessions_created_this_process() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FsEventStore::new(dir.path()));
    let service = Service::new(store, Arc::new(EchoTurnService), fast_config(dir.path().to_path_buf()));

    service.add_events("a", vec![]).await.unwrap();
    service.add_events("b", vec![]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    let mut names = service.list().await;
    names.sort();
    assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
}
