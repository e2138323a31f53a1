//! Common test utilities: fixtures and a fault-injecting record store

#![allow(dead_code)]

use async_trait::async_trait;
use langgraph_checkpoint_kv::{
    Checkpoint, CheckpointConfig, CheckpointError, InMemoryRecordStore, Record, RecordKey,
    RecordStore, Result,
};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const SET_CHECKPOINTS: &str = "lg_cp";
pub const SET_WRITES: &str = "lg_cp_w";
pub const SET_META: &str = "lg_cp_meta";

/// Config for a thread in the empty namespace
pub fn thread(thread_id: &str) -> CheckpointConfig {
    CheckpointConfig::new()
        .with_thread_id(thread_id)
        .with_checkpoint_ns("")
}

/// Checkpoint whose single channel `x` holds `x`
pub fn checkpoint(id: &str, x: i64) -> Checkpoint {
    Checkpoint::new(id, HashMap::from([("x".to_string(), json!(x))]))
}

/// In-memory store that fails selected operations on demand and counts calls.
///
/// Failures are selected by record key suffix (e.g. `"__timeline__"`) or by
/// set name, per operation kind.
#[derive(Default)]
pub struct FailingStore {
    inner: InMemoryRecordStore,
    fail_get: Mutex<HashSet<String>>,
    fail_put: Mutex<HashSet<String>>,
    fail_touch: Mutex<bool>,
    gets: AtomicUsize,
    puts: AtomicUsize,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &InMemoryRecordStore {
        &self.inner
    }

    /// Fail every `get` whose set or key suffix matches `target`
    pub fn fail_gets(&self, target: &str) {
        self.fail_get.lock().unwrap().insert(target.to_string());
    }

    /// Fail every `put` whose set or key suffix matches `target`
    pub fn fail_puts(&self, target: &str) {
        self.fail_put.lock().unwrap().insert(target.to_string());
    }

    pub fn fail_touches(&self) {
        *self.fail_touch.lock().unwrap() = true;
    }

    pub fn heal(&self) {
        self.fail_get.lock().unwrap().clear();
        self.fail_put.lock().unwrap().clear();
        *self.fail_touch.lock().unwrap() = false;
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn reset_counts(&self) {
        self.gets.store(0, Ordering::SeqCst);
        self.puts.store(0, Ordering::SeqCst);
    }

    fn matches(targets: &Mutex<HashSet<String>>, key: &RecordKey) -> bool {
        targets
            .lock()
            .unwrap()
            .iter()
            .any(|t| key.set == *t || key.key.ends_with(t.as_str()))
    }
}

#[async_trait]
impl RecordStore for FailingStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<Record>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if Self::matches(&self.fail_get, key) {
            return Err(CheckpointError::Storage(format!("injected get failure: {}", key)));
        }
        self.inner.get(key).await
    }

    async fn put(&self, key: &RecordKey, record: Record, ttl: Option<Duration>) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if Self::matches(&self.fail_put, key) {
            return Err(CheckpointError::Storage(format!("injected put failure: {}", key)));
        }
        self.inner.put(key, record, ttl).await
    }

    async fn touch(&self, key: &RecordKey, ttl: Duration) -> Result<()> {
        if *self.fail_touch.lock().unwrap() {
            return Err(CheckpointError::Storage(format!("injected touch failure: {}", key)));
        }
        self.inner.touch(key, ttl).await
    }
}
