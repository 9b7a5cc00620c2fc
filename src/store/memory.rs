// src/store/memory.rs
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use super::DuplicateStore;
use crate::error::SyncError;

/// In-process store with lazy expiry. Used by tests and dry runs; state is
/// lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Instant>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live (unexpired) keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let map = self.entries.lock().expect("memory store mutex poisoned");
        map.values().filter(|exp| **exp > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of set/delete calls so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DuplicateStore for MemoryStore {
    async fn exists(&self, key: &str) -> Result<bool, SyncError> {
        let now = Instant::now();
        let mut map = self.entries.lock().expect("memory store mutex poisoned");
        match map.get(key) {
            Some(exp) if *exp > now => Ok(true),
            Some(_) => {
                map.remove(key);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    async fn set_with_ttl(&self, key: &str, ttl: Duration) -> Result<(), SyncError> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        let mut map = self.entries.lock().expect("memory store mutex poisoned");
        map.insert(key.to_string(), Instant::now() + ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), SyncError> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        let mut map = self.entries.lock().expect("memory store mutex poisoned");
        map.remove(key);
        Ok(())
    }
}
