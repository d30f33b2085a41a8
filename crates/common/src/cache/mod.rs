//! Cache integration
//!
//! Provides:
//! - `CacheStore`: raw string get/set with TTL
//! - Redis-backed `Cache` and an in-process `MemoryCache`
//! - JSON helpers and a read-through `get_or_load`
//! - Key builders

use crate::config::RedisConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Key/value store holding serialized values
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get_raw(&self, key: &str) -> Result<Option<String>>;

    async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<bool>;
}

/// Redis cache client
pub struct Cache {
    connection: RwLock<MultiplexedConnection>,
    key_prefix: String,
}

impl Cache {
    /// Connect to Redis
    pub async fn new(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str()).map_err(|e| AppError::CacheError {
            message: format!("Failed to create Redis client: {}", e),
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Failed to connect to Redis: {}", e),
            })?;

        Ok(Self {
            connection: RwLock::new(connection),
            key_prefix: config.key_prefix.clone(),
        })
    }

    /// Build a prefixed key
    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }

    /// Ping Redis to check connectivity
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.write().await;
        redis::cmd("PING")
            .query_async::<String>(&mut *conn)
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Redis ping failed: {}", e),
            })?;
        Ok(())
    }
}

#[async_trait]
impl CacheStore for Cache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let full_key = self.key(key);
        let mut conn = self.connection.write().await;

        let value: Option<String> = conn.get(&full_key).await.map_err(|e| AppError::CacheError {
            message: format!("Failed to get key '{}': {}", full_key, e),
        })?;
        debug!(key = %full_key, hit = value.is_some(), "Cache get");
        Ok(value)
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let full_key = self.key(key);
        let ttl_secs = ttl.as_secs().max(1);
        let mut conn = self.connection.write().await;

        conn.set_ex::<_, _, ()>(&full_key, value, ttl_secs)
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Failed to set key '{}': {}", full_key, e),
            })?;

        debug!(key = %full_key, ttl_secs, "Cache set");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let full_key = self.key(key);
        let mut conn = self.connection.write().await;

        let deleted: i32 = conn.del(&full_key).await.map_err(|e| AppError::CacheError {
            message: format!("Failed to delete key '{}': {}", full_key, e),
        })?;

        debug!(key = %full_key, deleted = deleted > 0, "Cache delete");
        Ok(deleted > 0)
    }
}

/// In-process cache, used when Redis is unavailable and in tests
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|(_, expires)| *expires > Instant::now())
            .map(|(value, _)| value.clone()))
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }
}

/// Read and deserialize a cached value
pub async fn get_json<T: DeserializeOwned>(store: &dyn CacheStore, key: &str) -> Result<Option<T>> {
    match store.get_raw(key).await? {
        Some(json) => {
            let parsed = serde_json::from_str(&json).map_err(|e| AppError::CacheError {
                message: format!("Failed to parse cached value: {}", e),
            })?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Serialize and store a value
pub async fn set_json<T: Serialize>(store: &dyn CacheStore, key: &str, value: &T, ttl: Duration) -> Result<()> {
    let json = serde_json::to_string(value).map_err(|e| AppError::CacheError {
        message: format!("Failed to serialize value: {}", e),
    })?;
    store.set_raw(key, json, ttl).await
}

/// Get or set with a loader function. Cache failures fall through to the loader.
pub async fn get_or_load<T, F, Fut>(store: &dyn CacheStore, key: &str, ttl: Duration, loader: F) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let name = keys::family(key);
    match get_json::<T>(store, key).await {
        Ok(Some(cached)) => {
            crate::metrics::record_cache(true, name);
            return Ok(cached);
        }
        Ok(None) => crate::metrics::record_cache(false, name),
        Err(e) => warn!(key, error = %e, "Cache read failed, loading from source"),
    }

    let value = loader().await?;

    if let Err(e) = set_json(store, key, &value, ttl).await {
        warn!(error = %e, "Failed to cache value, continuing without cache");
    }

    Ok(value)
}

/// Cache key builder helpers
pub mod keys {
    use crate::content::ContentKind;

    /// One page of a kind's sitemap (1-based)
    pub fn sitemap_page(kind: ContentKind, page: u64) -> String {
        format!("sitemap:{}:{}", kind.object_type(), page)
    }

    /// Leading segment of a key, used as the metrics label
    pub fn family(key: &str) -> &str {
        key.split(':').next().unwrap_or(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_key_builders() {
        assert_eq!(keys::sitemap_page(ContentKind::Quote, 2), "sitemap:quote:2");
        assert_eq!(keys::sitemap_page(ContentKind::QuotePiece, 1), "sitemap:quote_piece:1");
        assert_eq!(keys::family("sitemap:quote:2"), "sitemap");
    }

    #[tokio::test]
    async fn test_get_or_load_caches_value() {
        let store = MemoryCache::new();
        let loads = AtomicUsize::new(0);

        for _ in 0..2 {
            let value: Vec<String> = get_or_load(&store, "sitemap:quote:1", Duration::from_secs(60), || async {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok(vec!["10110000000000001".to_string()])
            })
            .await
            .unwrap();
            assert_eq!(value.len(), 1);
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_memory_cache_expiry_and_delete() {
        tokio_test::block_on(async {
            let store = MemoryCache::new();
            tokio_test::assert_ok!(store.set_raw("a", "1".into(), Duration::ZERO).await);
            assert!(store.get_raw("a").await.unwrap().is_none());

            tokio_test::assert_ok!(store.set_raw("b", "2".into(), Duration::from_secs(60)).await);
            assert_eq!(store.get_raw("b").await.unwrap().as_deref(), Some("2"));
            assert!(store.delete("b").await.unwrap());
            assert!(!store.delete("b").await.unwrap());
        });
    }
}
