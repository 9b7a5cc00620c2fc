// src/store/redis.rs
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;

use super::DuplicateStore;
use crate::error::SyncError;

const SENTINEL: &str = "1";

/// Redis-backed store. Expiry is delegated to Redis (`SET .. EX`).
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    /// Open a managed connection and PING it. Boot fails if Redis is not
    /// reachable within `timeout`.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, SyncError> {
        let client = Client::open(url)?;
        let connect = async {
            let mut connection = ConnectionManager::new(client).await?;
            let _pong: String = redis::cmd("PING").query_async(&mut connection).await?;
            Ok::<_, redis::RedisError>(connection)
        };
        let connection = tokio::time::timeout(timeout, connect)
            .await
            .map_err(|_| SyncError::Store(format!("redis ping timed out after {timeout:?}")))??;
        Ok(Self { connection })
    }
}

#[async_trait]
impl DuplicateStore for RedisStore {
    async fn exists(&self, key: &str) -> Result<bool, SyncError> {
        let mut conn = self.connection.clone();
        let found: bool = conn.exists(key).await?;
        Ok(found)
    }

    async fn set_with_ttl(&self, key: &str, ttl: Duration) -> Result<(), SyncError> {
        let mut conn = self.connection.clone();
        // EX 0 is rejected by Redis
        let secs = ttl.as_secs().max(1);
        let _: () = conn.set_ex(key, SENTINEL, secs).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), SyncError> {
        let mut conn = self.connection.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }
}
