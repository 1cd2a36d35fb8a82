//! In-process broker emulating Vault path semantics.
//!
//! Used for local dry runs and tests. Supports scripting the asynchronous
//! readiness of a path (the first N reads return no data) and injecting
//! failures, and records every read with its timestamp.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

use super::broker::{BrokerError, Result, SecretData, SecretsBroker};

/// One recorded read.
#[derive(Debug, Clone)]
pub struct ReadRecord {
    pub path: String,
    pub at: Instant,
}

#[derive(Debug, Default)]
struct MemoryState {
    mounts: HashMap<String, String>,
    data: HashMap<String, SecretData>,
    pending_reads: HashMap<String, u32>,
    read_failures: HashMap<String, BrokerError>,
    write_failures: HashMap<String, BrokerError>,
    reads: Vec<ReadRecord>,
    writes: Vec<String>,
}

/// [`SecretsBroker`] backed by process memory.
#[derive(Debug, Default)]
pub struct InMemoryBroker {
    state: Mutex<MemoryState>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Places `data` at `path` directly, bypassing mount checks for both
    /// the write and later reads of `path`.
    pub fn seed(&self, path: impl Into<String>, data: SecretData) {
        self.state().data.insert(path.into(), data);
    }

    /// The next `reads` reads of `path` return no data, as if the broker were
    /// still provisioning it.
    pub fn delay_readiness(&self, path: impl Into<String>, reads: u32) {
        self.state().pending_reads.insert(path.into(), reads);
    }

    /// Every read of `path` fails with `error`.
    pub fn fail_reads(&self, path: impl Into<String>, error: BrokerError) {
        self.state().read_failures.insert(path.into(), error);
    }

    /// Every write to `path` fails with `error`.
    pub fn fail_writes(&self, path: impl Into<String>, error: BrokerError) {
        self.state().write_failures.insert(path.into(), error);
    }

    pub fn is_mounted(&self, path: &str) -> bool {
        self.state().mounts.contains_key(path)
    }

    /// Current data at `path`, without recording a read.
    pub fn get(&self, path: &str) -> Option<SecretData> {
        self.state().data.get(path).cloned()
    }

    /// All reads of `path`, oldest first.
    pub fn reads_of(&self, path: &str) -> Vec<ReadRecord> {
        self.state().reads.iter().filter(|r| r.path == path).cloned().collect()
    }

    /// Paths written, in order.
    pub fn writes(&self) -> Vec<String> {
        self.state().writes.clone()
    }
}

fn under_mount(state: &MemoryState, path: &str) -> bool {
    state.mounts.keys().any(|mount| path.starts_with(&format!("{}/", mount)))
}

#[async_trait]
impl SecretsBroker for InMemoryBroker {
    async fn create_mount(&self, path: &str, engine_type: &str) -> Result<()> {
        let mut state = self.state();
        if state.mounts.contains_key(path) {
            return Err(BrokerError::PathInUse { path: path.to_string() });
        }
        state.mounts.insert(path.to_string(), engine_type.to_string());
        Ok(())
    }

    async fn write(&self, path: &str, data: &SecretData) -> Result<()> {
        let mut state = self.state();
        if let Some(err) = state.write_failures.get(path) {
            return Err(err.clone());
        }
        if !under_mount(&state, path) {
            return Err(BrokerError::NoHandler { path: path.to_string() });
        }
        state.data.insert(path.to_string(), data.clone());
        state.writes.push(path.to_string());
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Option<SecretData>> {
        let mut state = self.state();
        state.reads.push(ReadRecord { path: path.to_string(), at: Instant::now() });

        if let Some(err) = state.read_failures.get(path) {
            return Err(err.clone());
        }
        if !state.data.contains_key(path) && !under_mount(&state, path) {
            return Err(BrokerError::NoHandler { path: path.to_string() });
        }

        if let Some(remaining) = state.pending_reads.get_mut(path) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(None);
            }
        }

        Ok(state.data.get(path).cloned())
    }
}
