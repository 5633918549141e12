//! TTL'd key/value cache boundary
//!
//! In production this seam fronts Redis; the in-memory implementation keeps
//! development and tests self-contained.

use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Trait for TTL'd string storage
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a value; expired or absent keys return None.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value. The TTL always restarts from now, regardless of any
    /// remaining TTL on an existing entry.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
}

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// In-memory cache with lazy expiry
pub struct InMemoryCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CacheStore for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let expired = {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Ok(Some(entry.value.clone()));
                }
                Some(_) => true,
            }
        };

        if expired {
            let mut entries = self.entries.write().await;
            entries.remove(key);
        }

        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }
}
