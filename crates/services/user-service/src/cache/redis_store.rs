//! Redis-backed cache store.

use std::time::Duration;

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};

use super::store::CacheStore;
use super::{CacheError, CacheResult};

/// Redis store sharing one multiplexed connection across clones.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    /// Connect and verify the server answers `PING` within `timeout`.
    pub async fn connect(url: &str, timeout: Duration) -> CacheResult<Self> {
        let client = Client::open(url)?;

        let connection = tokio::time::timeout(timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| CacheError::Timeout("connect"))??;

        let store = Self { connection };
        tokio::time::timeout(timeout, store.ping())
            .await
            .map_err(|_| CacheError::Timeout("ping"))??;

        Ok(store)
    }

    pub async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.connection.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.connection.clone();
        // SETEX rejects a zero expiry
        let seconds = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, seconds).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.connection.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    /// Uses UNLINK for non-blocking deletion, falling back to DEL.
    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let mut conn = self.connection.clone();
        let keys: Vec<String> = conn.keys(pattern).await?;

        if keys.is_empty() {
            return Ok(0);
        }

        let unlinked: Result<u64, redis::RedisError> =
            redis::cmd("UNLINK").arg(&keys).query_async(&mut conn).await;

        match unlinked {
            Ok(count) => Ok(count),
            Err(e) => {
                tracing::debug!(error = %e, "UNLINK unavailable, falling back to DEL");
                let count: u64 = conn.del(&keys).await?;
                Ok(count)
            }
        }
    }
}
