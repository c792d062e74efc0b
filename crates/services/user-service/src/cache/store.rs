//! Storage backends behind the cache client.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::RwLock;

use super::{CacheError, CacheResult};

/// Minimal key-value contract the cache client needs.
///
/// Values are already serialized; stores never see typed data.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()>;

    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Delete every key matching a glob pattern, returning how many were removed.
    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64>;
}

struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Entries kept by [`MemoryStore::new`] before the least recently used is evicted.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// In-process LRU store with TTL expiry, for tests and single-node runs.
///
/// Expired entries are dropped when read and swept on every write, so keys
/// that are never read again do not outlive their TTL by more than one write.
pub struct MemoryStore {
    entries: RwLock<LruCache<String, Entry>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_capacity(NonZeroUsize::new(DEFAULT_MAX_ENTRIES).unwrap_or(NonZeroUsize::MIN))
    }

    pub fn with_capacity(max_entries: NonZeroUsize) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(max_entries)),
        }
    }

    /// Number of live entries
    pub async fn len(&self) -> usize {
        self.entries
            .read()
            .await
            .iter()
            .filter(|(_, e)| !e.is_expired())
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn purge_expired(entries: &mut LruCache<String, Entry>) {
    let expired: Vec<String> = entries
        .iter()
        .filter(|(_, e)| e.is_expired())
        .map(|(k, _)| k.clone())
        .collect();

    for key in expired {
        entries.pop(&key);
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut entries = self.entries.write().await;
        match entries
            .get(key)
            .map(|e| (!e.is_expired()).then(|| e.value.clone()))
        {
            None => Ok(None),
            Some(Some(value)) => Ok(Some(value)),
            Some(None) => {
                entries.pop(key);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()> {
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| CacheError::Operation(format!("ttl out of range: {:?}", ttl)))?;

        let mut entries = self.entries.write().await;
        purge_expired(&mut entries);
        entries.put(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.entries.write().await.pop(key);
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let mut entries = self.entries.write().await;
        purge_expired(&mut entries);

        let matched: Vec<String> = entries
            .iter()
            .filter(|(k, _)| pattern_matches(pattern, k))
            .map(|(k, _)| k.clone())
            .collect();

        for key in &matched {
            entries.pop(key);
        }
        Ok(matched.len() as u64)
    }
}

/// Glob match supporting `*` (any run of characters), as Redis `KEYS` does.
pub fn pattern_matches(pattern: &str, key: &str) -> bool {
    let segments: Vec<&str> = pattern.split('*').collect();

    if segments.len() == 1 {
        return pattern == key;
    }

    let mut remaining = key;
    let last = segments.len() - 1;

    for (i, segment) in segments.iter().enumerate() {
        if i == 0 {
            match remaining.strip_prefix(segment) {
                Some(rest) => remaining = rest,
                None => return false,
            }
        } else if i == last {
            return remaining.ends_with(segment);
        } else if !segment.is_empty() {
            match remaining.find(segment) {
                Some(pos) => remaining = &remaining[pos + segment.len()..],
                None => return false,
            }
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_matches() {
        assert!(pattern_matches("user:*", "user:123"));
        assert!(pattern_matches("user:*", "user:username:jdoe"));
        assert!(pattern_matches("user:permissions:*", "user:permissions:42:doc:read"));
        assert!(pattern_matches("*", ""));
        assert!(pattern_matches("users:limit:*:offset:*", "users:limit:10:offset:0"));
        assert!(pattern_matches("role:42", "role:42"));

        assert!(!pattern_matches("users:*", "user:123"));
        assert!(!pattern_matches("role:*", "roles:all"));
        assert!(!pattern_matches("permission:*", "permissions:all"));
        assert!(!pattern_matches("*:count", "users:count:x"));
    }

    #[tokio::test]
    async fn test_memory_store_get_set_delete() {
        let store = MemoryStore::new();
        store
            .set("role:1", "admin".to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.get("role:1").await.unwrap(), Some("admin".to_string()));

        store.delete("role:1").await.unwrap();
        assert_eq!(store.get("role:1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_store_expires_entries() {
        let store = MemoryStore::new();
        store
            .set("users:count", "3".to_string(), Duration::from_millis(10))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(store.get("users:count").await.unwrap(), None);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_memory_store_delete_pattern() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);
        for key in ["user:1", "user:username:jdoe", "users:count", "role:1"] {
            store.set(key, "x".to_string(), ttl).await.unwrap();
        }

        let removed = store.delete_pattern("user:*").await.unwrap();

        assert_eq!(removed, 2);
        assert_eq!(store.len().await, 2);
        assert!(store.get("users:count").await.unwrap().is_some());
        assert!(store.get("role:1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_memory_store_sweeps_unread_expired_keys_on_write() {
        let store = MemoryStore::new();
        for i in 0..100 {
            store
                .set(&format!("users:limit:10:offset:{i}"), "[]".to_string(), Duration::from_millis(1))
                .await
                .unwrap();
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        store
            .set("users:count", "3".to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.entries.read().await.len(), 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_memory_store_evicts_least_recently_used() {
        let store = MemoryStore::with_capacity(NonZeroUsize::new(2).unwrap());
        let ttl = Duration::from_secs(60);
        store.set("role:1", "a".to_string(), ttl).await.unwrap();
        store.set("role:2", "b".to_string(), ttl).await.unwrap();
        store.get("role:1").await.unwrap();
        store.set("role:3", "c".to_string(), ttl).await.unwrap();

        assert!(store.get("role:1").await.unwrap().is_some());
        assert!(store.get("role:2").await.unwrap().is_none());
        assert!(store.get("role:3").await.unwrap().is_some());
    }
}
