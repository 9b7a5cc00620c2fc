// src/ledger.rs
//! Record of already-delivered item ids.
//!
//! A failed existence check reads as "not seen" (at worst a duplicate post).
//! A failed mark is returned to the caller.

use metrics::counter;
use std::sync::Arc;
use std::time::Duration;

use crate::error::SyncError;
use crate::store::DuplicateStore;

pub const DEFAULT_KEY_PREFIX: &str = "posted:article:";
pub const DEFAULT_TTL: Duration = Duration::from_secs(365 * 24 * 3600);

#[derive(Clone)]
pub struct DuplicateLedger {
    store: Arc<dyn DuplicateStore>,
    ttl: Duration,
    prefix: String,
}

impl DuplicateLedger {
    pub fn new(store: Arc<dyn DuplicateStore>) -> Self {
        Self {
            store,
            ttl: DEFAULT_TTL,
            prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn key(&self, item_id: &str) -> String {
        format!("{}{}", self.prefix, item_id)
    }

    /// Fails open: store errors are logged and reported as "not seen".
    pub async fn has_seen(&self, item_id: &str) -> bool {
        let key = self.key(item_id);
        match self.store.exists(&key).await {
            Ok(seen) => {
                tracing::debug!(item_id, redis_key = %key, seen, "ledger lookup");
                seen
            }
            Err(e) => {
                tracing::error!(item_id, redis_key = %key, error = %e, "ledger lookup failed; assuming not seen");
                counter!("sync_ledger_errors_total", "op" => "exists").increment(1);
                false
            }
        }
    }

    /// Surfaces store errors.
    pub async fn mark_seen(&self, item_id: &str) -> Result<(), SyncError> {
        let key = self.key(item_id);
        if let Err(e) = self.store.set_with_ttl(&key, self.ttl).await {
            tracing::error!(item_id, redis_key = %key, ttl_secs = self.ttl.as_secs(), error = %e, "ledger mark failed");
            counter!("sync_ledger_errors_total", "op" => "set").increment(1);
            return Err(e);
        }
        tracing::debug!(item_id, redis_key = %key, ttl_secs = self.ttl.as_secs(), "ledger marked");
        Ok(())
    }

    /// Operator correction: forget an id so the next cycle may deliver it again.
    pub async fn clear(&self, item_id: &str) -> Result<(), SyncError> {
        let key = self.key(item_id);
        if let Err(e) = self.store.delete(&key).await {
            tracing::error!(item_id, redis_key = %key, error = %e, "ledger clear failed");
            counter!("sync_ledger_errors_total", "op" => "delete").increment(1);
            return Err(e);
        }
        tracing::info!(item_id, redis_key = %key, "ledger entry cleared");
        Ok(())
    }
}
