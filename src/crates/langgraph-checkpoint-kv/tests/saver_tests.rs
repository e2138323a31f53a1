//! End-to-end behavior of the key-value checkpoint saver

mod common;

use common::{checkpoint, thread};
use futures::TryStreamExt;
use langgraph_checkpoint_kv::{
    ChannelVersion, CheckpointConfig, CheckpointMetadata, CheckpointSaver, CheckpointSource,
    InMemoryRecordStore, KvCheckpointSaver,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

fn saver() -> Arc<dyn CheckpointSaver> {
    Arc::new(KvCheckpointSaver::new(Arc::new(InMemoryRecordStore::new())))
}

async fn history(saver: &Arc<dyn CheckpointSaver>, config: &CheckpointConfig) -> Vec<String> {
    saver
        .list(Some(config), None, None, None)
        .await
        .unwrap()
        .map_ok(|tuple| tuple.checkpoint.id)
        .try_collect()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_resume_chain_scenario() {
    let saver = saver();
    let config = thread("t1");

    let c1 = saver
        .put(
            &config,
            checkpoint("c1", 1),
            CheckpointMetadata::new().with_source(CheckpointSource::Input).with_step(-1),
            HashMap::new(),
        )
        .await
        .unwrap();

    let latest = saver.get_tuple(&config).await.unwrap().unwrap();
    assert_eq!(latest.checkpoint.channel_values["x"], json!(1));
    assert_eq!(latest.config.checkpoint_id.as_deref(), Some("c1"));
    assert_eq!(latest.config.thread_id.as_deref(), Some("t1"));
    assert_eq!(latest.config.checkpoint_ns.as_deref(), Some(""));

    // Resuming from c1 makes it the parent of c2.
    saver
        .put(
            &c1,
            checkpoint("c2", 2),
            CheckpointMetadata::new().with_source(CheckpointSource::Loop).with_step(0),
            HashMap::new(),
        )
        .await
        .unwrap();

    let latest = saver.get_tuple(&config).await.unwrap().unwrap();
    assert_eq!(latest.checkpoint.channel_values["x"], json!(2));
    let parent = latest.parent_config.unwrap();
    assert_eq!(parent.checkpoint_id.as_deref(), Some("c1"));
    assert_eq!(parent.thread_id.as_deref(), Some("t1"));

    assert_eq!(history(&saver, &config).await, vec!["c2", "c1"]);
}

#[tokio::test]
async fn test_last_put_is_latest() {
    let saver = saver();
    let config = thread("t1");

    for id in ["b", "a"] {
        saver
            .put(&config, checkpoint(id, 0), CheckpointMetadata::new(), HashMap::new())
            .await
            .unwrap();
    }

    // Ids are opaque: "a" sorts first but was written last.
    let latest = saver.get(&config).await.unwrap().unwrap();
    assert_eq!(latest.id, "a");
}

#[tokio::test]
async fn test_repeated_put_moves_id_to_head() {
    let saver = saver();
    let config = thread("t1");

    for (id, x) in [("c1", 1), ("c2", 2), ("c1", 3)] {
        saver
            .put(&config, checkpoint(id, x), CheckpointMetadata::new(), HashMap::new())
            .await
            .unwrap();
    }

    assert_eq!(history(&saver, &config).await, vec!["c1", "c2"]);
    let c1 = saver
        .get(&config.clone().with_checkpoint_id("c1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(c1.channel_values["x"], json!(3));
}

#[tokio::test]
async fn test_empty_scope_reads_nothing() {
    let saver = saver();
    let config = thread("never-written");

    assert!(saver.get_tuple(&config).await.unwrap().is_none());
    assert!(saver.get(&config).await.unwrap().is_none());
    assert!(history(&saver, &config).await.is_empty());
}

#[tokio::test]
async fn test_threads_are_isolated() {
    let saver = saver();

    saver
        .put(&thread("t1"), checkpoint("c1", 1), CheckpointMetadata::new(), HashMap::new())
        .await
        .unwrap();
    saver
        .put(&thread("t2"), checkpoint("c1", 2), CheckpointMetadata::new(), HashMap::new())
        .await
        .unwrap();

    let t1 = saver.get(&thread("t1")).await.unwrap().unwrap();
    let t2 = saver.get(&thread("t2")).await.unwrap().unwrap();
    assert_eq!(t1.channel_values["x"], json!(1));
    assert_eq!(t2.channel_values["x"], json!(2));
}

#[tokio::test]
async fn test_returned_config_keeps_caller_fields() {
    let saver = saver();
    let config = thread("t1").with_metadata("user", json!("u1"));

    let saved = saver
        .put(&config, checkpoint("c1", 1), CheckpointMetadata::new(), HashMap::new())
        .await
        .unwrap();

    assert_eq!(saved.checkpoint_id.as_deref(), Some("c1"));
    assert_eq!(saved.metadata.get("user"), Some(&json!("u1")));
    assert!(saved.checkpoint_ts().is_some());
}

#[tokio::test]
async fn test_channel_versions_survive_storage() {
    let saver = saver();
    let versions = HashMap::from([
        ("messages".to_string(), ChannelVersion::Int(2)),
        ("scratch".to_string(), ChannelVersion::String("a1".into())),
    ]);
    let mut snapshot = checkpoint("c1", 1).with_channel_versions(versions.clone());
    snapshot
        .versions_seen
        .insert("agent".to_string(), HashMap::from([("messages".to_string(), ChannelVersion::Int(1))]));

    let saved = saver
        .put(&thread("t1"), snapshot, CheckpointMetadata::new(), versions.clone())
        .await
        .unwrap();

    let stored = saver.get(&saved).await.unwrap().unwrap();
    assert_eq!(stored.channel_versions, versions);
    assert_eq!(stored.versions_seen["agent"]["messages"], ChannelVersion::Int(1));
}

#[tokio::test]
async fn test_pending_writes_scenario() {
    let saver = saver();
    let config = thread("t1").with_checkpoint_id("c1");

    saver
        .put_writes(&config, vec![("a".to_string(), json!(1))], "t", "")
        .await
        .unwrap();
    saver
        .put_writes(&config, vec![("a".to_string(), json!(2))], "t", "")
        .await
        .unwrap();

    // Writes may arrive before the checkpoint they belong to.
    saver
        .put(&thread("t1"), checkpoint("c1", 1), CheckpointMetadata::new(), HashMap::new())
        .await
        .unwrap();

    let tuple = saver.get_tuple(&config).await.unwrap().unwrap();
    let channel_a: Vec<_> = tuple
        .pending_writes
        .iter()
        .filter(|(_, channel, _)| channel == "a")
        .collect();
    assert_eq!(channel_a.len(), 1);
    assert_eq!(channel_a[0].2, json!(2));
}

#[tokio::test]
async fn test_concurrent_puts_on_distinct_threads() {
    let saver = saver();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let saver = saver.clone();
            tokio::spawn(async move {
                let config = thread(&format!("t{}", i));
                for step in 0..5 {
                    saver
                        .put(
                            &config,
                            checkpoint(&format!("c{}", step), step),
                            CheckpointMetadata::new().with_step(step as i32),
                            HashMap::new(),
                        )
                        .await
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    for i in 0..8 {
        let config = thread(&format!("t{}", i));
        assert_eq!(
            history(&saver, &config).await,
            vec!["c4", "c3", "c2", "c1", "c0"]
        );
    }
}
