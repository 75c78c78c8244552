//! Page caching.
//!
//! Whole response bodies are cached for a fixed TTL and expire on their own;
//! writes never invalidate them. Two backends are provided: an in-process map
//! for single-instance deployments and Redis for shared caching.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use fred::clients::Client as RedisClient;
use fred::interfaces::KeysInterface;
use fred::types::Expiration;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::{AppError, AppResult};

/// Shared handle to a page cache backend.
pub type SharedPageCache = Arc<dyn PageCache>;

/// A TTL cache of rendered page bodies.
#[async_trait::async_trait]
pub trait PageCache: Send + Sync {
    /// Fetch a cached body if present and not expired.
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>>;

    /// Store a body for `ttl`.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> AppResult<()>;

    /// Drop every cached page.
    async fn clear(&self) -> AppResult<()>;
}

/// Build a cache key from a prefix and the request parts it varies on.
///
/// The parts are hashed so cookies and tokens never appear in the key.
#[must_use]
pub fn page_cache_key(prefix: &str, parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    format!("{prefix}:{}", hex::encode(hasher.finalize()))
}

#[derive(Debug, Clone)]
struct CacheEntry {
    data: Vec<u8>,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() >= self.ttl
    }
}

/// In-process page cache.
#[derive(Debug, Clone, Default)]
pub struct MemoryPageCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl MemoryPageCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl PageCache for MemoryPageCache {
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if !entry.is_expired() => {
                debug!(key = %key, "Page cache hit");
                Ok(Some(entry.data.clone()))
            }
            _ => {
                debug!(key = %key, "Page cache miss");
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> AppResult<()> {
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| !entry.is_expired());
        entries.insert(
            key.to_string(),
            CacheEntry {
                data: value,
                inserted_at: Instant::now(),
                ttl,
            },
        );
        Ok(())
    }

    async fn clear(&self) -> AppResult<()> {
        self.entries.write().await.clear();
        Ok(())
    }
}

/// Redis-backed page cache.
#[derive(Clone)]
pub struct RedisPageCache {
    redis: Arc<RedisClient>,
    prefix: String,
}

impl RedisPageCache {
    /// Create a cache storing keys under `prefix`.
    #[must_use]
    pub fn new(redis: Arc<RedisClient>, prefix: impl Into<String>) -> Self {
        Self {
            redis,
            prefix: prefix.into(),
        }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}:page:{key}", self.prefix)
    }
}

/// Keys fetched per `SCAN` round trip when clearing.
const SCAN_BATCH: u32 = 500;

/// Glob matching every page key stored under `prefix`.
fn page_key_pattern(prefix: &str) -> String {
    format!("{prefix}:page:*")
}

#[async_trait::async_trait]
impl PageCache for RedisPageCache {
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        let value: Option<String> = self
            .redis
            .get(self.full_key(key))
            .await
            .map_err(|e| AppError::Cache(e.to_string()))?;

        debug!(key = %key, hit = value.is_some(), "Redis page cache lookup");
        Ok(value.map(String::into_bytes))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> AppResult<()> {
        let body = String::from_utf8(value)
            .map_err(|_| AppError::Cache("page body is not UTF-8".to_string()))?;
        let ttl_secs = i64::try_from(ttl.as_secs().max(1)).unwrap_or(i64::MAX);

        self.redis
            .set::<(), _, _>(
                self.full_key(key),
                body,
                Some(Expiration::EX(ttl_secs)),
                None,
                false,
            )
            .await
            .map_err(|e| AppError::Cache(e.to_string()))
    }

    /// Walks the keyspace with cursor-based `SCAN`, one batch at a time.
    async fn clear(&self) -> AppResult<()> {
        let pattern = page_key_pattern(&self.prefix);
        let mut cursor = "0".to_string();
        let mut removed = 0_usize;

        loop {
            let (next, keys): (String, Vec<String>) = self
                .redis
                .scan_page(cursor, pattern.clone(), Some(SCAN_BATCH), None)
                .await
                .map_err(|e| AppError::Cache(e.to_string()))?;

            if !keys.is_empty() {
                removed += keys.len();
                self.redis
                    .del::<(), _>(keys)
                    .await
                    .map_err(|e| AppError::Cache(e.to_string()))?;
            }

            if next == "0" {
                break;
            }
            cursor = next;
        }

        debug!(removed, "Cleared Redis page cache");
        Ok(())
    }
}
