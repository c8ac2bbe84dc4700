use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur with cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Cache miss: {0}")]
    CacheMiss(String),

    #[error("Invalidation error: {0}")]
    InvalidationError(String),
}

/// Multi-tier cache for search results
///
/// L1 is an in-process moka cache. L2 is Redis, shared across instances,
/// and only present when a Redis URL is configured.
///
/// Every invalidation bumps a generation counter. Writers that computed their
/// value before an invalidation pass the generation they started from to
/// `set_if_current`, which refuses to publish stale results.
pub struct CacheManager {
    redis: Option<Arc<tokio::sync::Mutex<ConnectionManager>>>,
    l1_cache: moka::future::Cache<String, Vec<u8>>,
    ttl_secs: u64,
    generation: AtomicU64,
}

impl CacheManager {
    /// Create a cache manager backed by Redis
    pub async fn new(redis_url: &str, l1_size: u64, ttl_secs: u64) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let redis = ConnectionManager::new(client).await?;

        Ok(Self {
            redis: Some(Arc::new(tokio::sync::Mutex::new(redis))),
            l1_cache: build_l1(l1_size, ttl_secs),
            ttl_secs,
            generation: AtomicU64::new(0),
        })
    }

    /// Create an L1-only cache manager
    pub fn in_memory(l1_size: u64, ttl_secs: u64) -> Self {
        Self {
            redis: None,
            l1_cache: build_l1(l1_size, ttl_secs),
            ttl_secs,
            generation: AtomicU64::new(0),
        }
    }

    pub fn has_redis(&self) -> bool {
        self.redis.is_some()
    }

    /// Current invalidation generation; read it before computing a value to cache
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Get a value from cache (L1 first, then L2)
    pub async fn get<T>(&self, key: &str) -> Result<T, CacheError>
    where
        T: for<'de> Deserialize<'de>,
    {
        if let Some(bytes) = self.l1_cache.get(key).await {
            tracing::trace!("L1 cache hit: {}", key);
            return Ok(serde_json::from_slice(&bytes)?);
        }

        if let Some(redis) = &self.redis {
            let mut conn = redis.lock().await;
            let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut *conn).await?;
            drop(conn);

            if let Some(json) = value {
                tracing::trace!("L2 cache hit: {}", key);

                // Populate L1 cache
                self.l1_cache
                    .insert(key.to_string(), json.as_bytes().to_vec())
                    .await;

                return Ok(serde_json::from_str(&json)?);
            }
        }

        tracing::trace!("Cache miss: {}", key);
        Err(CacheError::CacheMiss(key.to_string()))
    }

    /// Set a value in every tier
    pub async fn set<T>(&self, key: &str, value: &T) -> Result<(), CacheError>
    where
        T: Serialize,
    {
        let json = serde_json::to_string(value)?;

        self.l1_cache
            .insert(key.to_string(), json.as_bytes().to_vec())
            .await;

        if let Some(redis) = &self.redis {
            let mut conn = redis.lock().await;
            let _: () = redis::cmd("SETEX")
                .arg(key)
                .arg(self.ttl_secs)
                .arg(json)
                .query_async(&mut *conn)
                .await?;
        }

        tracing::trace!("Cache set: {}", key);
        Ok(())
    }

    /// Set a value unless an invalidation ran since `generation` was read
    ///
    /// Returns whether the value was kept. An invalidation racing the write
    /// is caught by the second check and the entry is dropped again.
    pub async fn set_if_current<T>(&self, key: &str, value: &T, generation: u64) -> Result<bool, CacheError>
    where
        T: Serialize,
    {
        if self.generation() != generation {
            tracing::debug!("Skipping stale cache write: {}", key);
            return Ok(false);
        }

        self.set(key, value).await?;

        if self.generation() != generation {
            tracing::debug!("Invalidated during write, dropping: {}", key);
            self.delete(key).await?;
            return Ok(false);
        }
        Ok(true)
    }

    /// Delete a value from every tier
    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.l1_cache.invalidate(key).await;

        if let Some(redis) = &self.redis {
            let mut conn = redis.lock().await;
            let _: () = redis::cmd("DEL").arg(key).query_async(&mut *conn).await?;
        }
        Ok(())
    }

    /// Invalidate every entry whose key starts with `prefix`
    pub async fn invalidate_prefix(&self, prefix: &str) -> Result<(), CacheError> {
        // Bumped before removal so in-flight writers see it by the time entries go
        self.generation.fetch_add(1, Ordering::SeqCst);

        let owned = prefix.to_string();
        self.l1_cache
            .invalidate_entries_if(move |key, _| key.starts_with(&owned))
            .map_err(|e| CacheError::InvalidationError(e.to_string()))?;

        if let Some(redis) = &self.redis {
            let mut conn = redis.lock().await;
            let keys: Vec<String> = redis::cmd("KEYS")
                .arg(format!("{}*", prefix))
                .query_async(&mut *conn)
                .await?;

            if !keys.is_empty() {
                let _: () = redis::cmd("DEL").arg(keys).query_async(&mut *conn).await?;
            }
        }

        tracing::debug!("Invalidated cache prefix: {}", prefix);
        Ok(())
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            l1_size: self.l1_cache.entry_count(),
            l2_enabled: self.has_redis(),
            ttl_secs: self.ttl_secs,
        }
    }
}

fn build_l1(l1_size: u64, ttl_secs: u64) -> moka::future::Cache<String, Vec<u8>> {
    moka::future::CacheBuilder::new(l1_size)
        .time_to_live(Duration::from_secs(ttl_secs))
        .support_invalidation_closures()
        .build()
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub l1_size: u64,
    pub l2_enabled: bool,
    pub ttl_secs: u64,
}

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Prefix shared by every search entry
    pub const SEARCH_PREFIX: &'static str = "matches:";

    /// Build a cache key for one page of search results
    pub fn search(user_id: &str, limit: usize) -> String {
        format!("{}{}:{}", Self::SEARCH_PREFIX, user_id, limit)
    }

    /// Prefix covering all of a user's search entries
    pub fn search_prefix(user_id: &str) -> String {
        format!("{}{}:", Self::SEARCH_PREFIX, user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "Requires Redis"]
    async fn test_redis_set_get() {
        let cache = CacheManager::new("redis://127.0.0.1:6379", 1000, 60)
            .await
            .expect("Failed to create cache");

        cache.set("test_key", &"test_value").await.unwrap();
        let result: String = cache.get("test_key").await.unwrap();
        assert_eq!(result, "test_value");

        cache.delete("test_key").await.unwrap();
        assert!(cache.get::<String>("test_key").await.is_err());
    }

    #[tokio::test]
    async fn test_l1_set_get_delete() {
        let cache = CacheManager::in_memory(100, 60);
        assert!(!cache.has_redis());

        cache.set("k", &vec![1u8, 2, 3]).await.unwrap();
        let value: Vec<u8> = cache.get("k").await.unwrap();
        assert_eq!(value, vec![1, 2, 3]);

        cache.delete("k").await.unwrap();
        assert!(matches!(cache.get::<Vec<u8>>("k").await, Err(CacheError::CacheMiss(_))));
    }

    #[tokio::test]
    async fn test_prefix_invalidation_spares_other_users() {
        let cache = CacheManager::in_memory(100, 60);
        cache.set(&CacheKey::search("alice", 10), &1).await.unwrap();
        cache.set(&CacheKey::search("alice", 20), &2).await.unwrap();
        cache.set(&CacheKey::search("bob", 10), &3).await.unwrap();

        cache.invalidate_prefix(&CacheKey::search_prefix("alice")).await.unwrap();

        assert!(cache.get::<i32>(&CacheKey::search("alice", 10)).await.is_err());
        assert!(cache.get::<i32>(&CacheKey::search("alice", 20)).await.is_err());
        assert_eq!(cache.get::<i32>(&CacheKey::search("bob", 10)).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_invalidation_discards_results_computed_before_it() {
        let cache = CacheManager::in_memory(100, 60);
        let key = CacheKey::search("alice", 10);

        // a search starts, then a profile write invalidates before it finishes
        let started = cache.generation();
        cache.invalidate_prefix(CacheKey::SEARCH_PREFIX).await.unwrap();

        assert!(!cache.set_if_current(&key, &"stale", started).await.unwrap());
        assert!(matches!(cache.get::<String>(&key).await, Err(CacheError::CacheMiss(_))));

        // a search that starts after the invalidation is cached normally
        let started = cache.generation();
        assert!(cache.set_if_current(&key, &"fresh", started).await.unwrap());
        assert_eq!(cache.get::<String>(&key).await.unwrap(), "fresh");
    }

    #[tokio::test]
    async fn test_every_invalidation_advances_generation() {
        let cache = CacheManager::in_memory(100, 60);
        let before = cache.generation();

        cache.invalidate_prefix(&CacheKey::search_prefix("bob")).await.unwrap();
        cache.invalidate_prefix(CacheKey::SEARCH_PREFIX).await.unwrap();

        assert_eq!(cache.generation(), before + 2);
    }

    #[test]
    fn test_cache_key_builder() {
        assert_eq!(CacheKey::search("user123", 10), "matches:user123:10");
        assert_eq!(CacheKey::search_prefix("user123"), "matches:user123:");
        assert!(CacheKey::search("user123", 10).starts_with(CacheKey::SEARCH_PREFIX));
    }
}
