// src/store/mod.rs
//! Key-value backends for the duplicate ledger.

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::SyncError;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

/// Existence / set-with-expiry / delete. Each call is atomic per key.
#[async_trait]
pub trait DuplicateStore: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool, SyncError>;
    async fn set_with_ttl(&self, key: &str, ttl: Duration) -> Result<(), SyncError>;
    async fn delete(&self, key: &str) -> Result<(), SyncError>;
}
