//! Cache-aside client.
//!
//! The client is type-agnostic at the storage boundary: values are encoded
//! with serde_json before they reach a [`CacheStore`]. A client built against
//! an unreachable cache is disabled rather than failing, so every read misses
//! and every write is a successful no-op.

pub mod keys;
mod redis_store;
mod store;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use common::CacheConfig;

pub use keys::CacheScope;
pub use redis_store::RedisStore;
pub use store::{pattern_matches, CacheStore, MemoryStore};

/// Errors raised by cache stores.
///
/// These never reach repository callers; they are logged and treated as a
/// miss or a no-op.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    Connection(#[from] redis::RedisError),

    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cache {0} timed out")]
    Timeout(&'static str),

    #[error("cache operation failed: {0}")]
    Operation(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Shared cache client. Clones share the same store.
#[derive(Clone)]
pub struct Cache {
    store: Option<Arc<dyn CacheStore>>,
    default_ttl: Duration,
    op_timeout: Duration,
}

impl Cache {
    /// Connect to Redis, degrading to a disabled client when it is unreachable.
    pub async fn connect(config: &CacheConfig) -> Self {
        let default_ttl = Duration::from_secs(config.default_ttl_seconds);
        let op_timeout = Duration::from_millis(config.op_timeout_ms);

        if !config.enabled {
            tracing::info!("Cache disabled by configuration");
            return Self::disabled();
        }

        let connect_timeout = Duration::from_millis(config.connect_timeout_ms);
        match RedisStore::connect(&config.url, connect_timeout).await {
            Ok(store) => {
                tracing::info!(ttl_seconds = config.default_ttl_seconds, "Redis cache connected");
                Self {
                    store: Some(Arc::new(store)),
                    default_ttl,
                    op_timeout,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Redis unavailable, running with cache disabled");
                Self::disabled()
            }
        }
    }

    /// A pass-through client: reads miss, writes succeed without effect.
    pub fn disabled() -> Self {
        let defaults = CacheConfig::default();
        Self {
            store: None,
            default_ttl: Duration::from_secs(defaults.default_ttl_seconds),
            op_timeout: Duration::from_millis(defaults.op_timeout_ms),
        }
    }

    /// Build a client over an explicit store.
    pub fn with_store(store: Arc<dyn CacheStore>, default_ttl: Duration) -> Self {
        Self {
            store: Some(store),
            default_ttl,
            op_timeout: Duration::from_millis(CacheConfig::default().op_timeout_ms),
        }
    }

    /// Client over a fresh in-process store.
    pub fn in_memory(default_ttl: Duration) -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), default_ttl)
    }

    pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Get a value from cache.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        let Some(store) = &self.store else {
            return Ok(None);
        };

        match self.bounded("get", store.get(key)).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Set a value in cache with default TTL.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> CacheResult<()> {
        self.set_with_ttl(key, value, self.default_ttl).await
    }

    /// Set a value in cache with a custom TTL.
    pub async fn set_with_ttl<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> CacheResult<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };

        let json = serde_json::to_string(value)?;
        self.bounded("set", store.set(key, json, ttl)).await
    }

    pub async fn delete(&self, key: &str) -> CacheResult<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };

        self.bounded("delete", store.delete(key)).await
    }

    /// Delete all keys matching a glob pattern.
    pub async fn delete_by_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let Some(store) = &self.store else {
            return Ok(0);
        };

        self.bounded("delete_pattern", store.delete_pattern(pattern)).await
    }

    /// Clear every key in the given scopes. Failures are logged, never raised.
    pub async fn invalidate(&self, scopes: &[CacheScope]) {
        if !self.is_enabled() {
            return;
        }

        for scope in scopes {
            for pattern in scope.patterns() {
                match self.delete_by_pattern(pattern).await {
                    Ok(removed) => tracing::debug!(pattern, removed, "Cache invalidated"),
                    Err(e) => tracing::warn!(pattern, error = %e, "Cache invalidation failed"),
                }
            }
        }
    }

    /// Read-side helper: any cache failure is logged and reported as a miss.
    pub async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.get(key).await {
            Ok(Some(value)) => {
                tracing::debug!(key, "Cache hit");
                Some(value)
            }
            Ok(None) => {
                tracing::debug!(key, "Cache miss");
                None
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    /// Write-side helper: populate with the default TTL, logging failures.
    pub async fn store<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        if let Err(e) = self.set(key, value).await {
            tracing::warn!(key, error = %e, "Cache write failed");
        }
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = CacheResult<T>>,
    ) -> CacheResult<T> {
        tokio::time::timeout(self.op_timeout, fut)
            .await
            .map_err(|_| CacheError::Timeout(op))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Snapshot {
        id: u32,
        name: String,
    }

    /// Store that never answers, to exercise the operation deadline.
    struct StalledStore;

    #[async_trait]
    impl CacheStore for StalledStore {
        async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
            std::future::pending().await
        }

        async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> CacheResult<()> {
            std::future::pending().await
        }

        async fn delete(&self, _key: &str) -> CacheResult<()> {
            std::future::pending().await
        }

        async fn delete_pattern(&self, _pattern: &str) -> CacheResult<u64> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_disabled_cache_is_pass_through() {
        let cache = Cache::disabled();

        assert!(!cache.is_enabled());
        assert!(cache.set("user:1", &"value").await.is_ok());
        assert_eq!(cache.get::<String>("user:1").await.unwrap(), None);
        assert!(cache.delete("user:1").await.is_ok());
        assert_eq!(cache.delete_by_pattern("user:*").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_redis_degrades_to_disabled() {
        let config = CacheConfig {
            url: "redis://127.0.0.1:1".to_string(),
            connect_timeout_ms: 300,
            ..Default::default()
        };

        let cache = Cache::connect(&config).await;

        assert!(!cache.is_enabled());
        tokio_test::assert_ok!(cache.set("role:1", &42u32).await);
        assert_eq!(cache.get::<u32>("role:1").await.unwrap(), None);
        tokio_test::assert_ok!(cache.delete("role:1").await);
        tokio_test::assert_ok!(cache.delete_by_pattern("role:*").await);
    }

    #[tokio::test]
    async fn test_config_can_disable_cache() {
        let config = CacheConfig {
            enabled: false,
            ..Default::default()
        };

        assert!(!Cache::connect(&config).await.is_enabled());
    }

    #[tokio::test]
    async fn test_in_memory_round_trip_preserves_structure() {
        let cache = Cache::in_memory(Duration::from_secs(60));
        let value = Snapshot {
            id: 7,
            name: "editor".to_string(),
        };

        cache.set("role:7", &value).await.unwrap();

        assert_eq!(cache.get::<Snapshot>("role:7").await.unwrap(), Some(value));
    }

    #[tokio::test]
    async fn test_invalidate_clears_only_requested_scopes() {
        let cache = Cache::in_memory(Duration::from_secs(60));
        for key in ["user:1", "users:count", "role:1", "roles:all", "user:permissions:1"] {
            cache.set(key, &1u8).await.unwrap();
        }

        cache.invalidate(&[CacheScope::Roles]).await;

        assert!(cache.lookup::<u8>("user:1").await.is_some());
        assert!(cache.lookup::<u8>("users:count").await.is_some());
        assert!(cache.lookup::<u8>("role:1").await.is_none());
        assert!(cache.lookup::<u8>("roles:all").await.is_none());

        cache.invalidate(&[CacheScope::UserPermissions]).await;
        assert!(cache.lookup::<u8>("user:permissions:1").await.is_none());
        assert!(cache.lookup::<u8>("user:1").await.is_some());
    }

    #[tokio::test]
    async fn test_undecodable_entry_reads_as_miss() {
        let store = Arc::new(MemoryStore::new());
        store
            .set("user:1", "not json".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        let cache = Cache::with_store(store, Duration::from_secs(60));

        assert!(matches!(
            cache.get::<Snapshot>("user:1").await,
            Err(CacheError::Serialization(_))
        ));
        assert!(cache.lookup::<Snapshot>("user:1").await.is_none());
    }

    #[tokio::test]
    async fn test_stalled_store_times_out_as_miss() {
        let cache = Cache::with_store(Arc::new(StalledStore), Duration::from_secs(60))
            .with_op_timeout(Duration::from_millis(20));

        assert!(matches!(
            cache.get::<u8>("user:1").await,
            Err(CacheError::Timeout("get"))
        ));
        assert!(cache.lookup::<u8>("user:1").await.is_none());
        cache.store("user:1", &1u8).await;
        cache.invalidate(&[CacheScope::Users]).await;
    }
}
