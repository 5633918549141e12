//! Conversation history store
//!
//! A rolling per-user transcript blob used only as reasoning-loop context.
//! Distinct from the append-only ConversationLog: this view is lossy and
//! expires; the log is the entity of record.

use crate::cache::CacheStore;
use crate::Result;
use std::sync::Arc;
use std::time::Duration;

/// Full retention window, restarted on every write
pub const HISTORY_TTL: Duration = Duration::from_secs(24 * 60 * 60);

pub struct HistoryStore {
    cache: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl HistoryStore {
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self {
            cache,
            ttl: HISTORY_TTL,
        }
    }

    pub fn with_ttl(cache: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    fn key(user_id: &str) -> String {
        format!("conv:{}", user_id)
    }

    /// Load the history blob; absent keys read as an empty transcript.
    pub async fn load(&self, user_id: &str) -> Result<String> {
        Ok(self
            .cache
            .get(&Self::key(user_id))
            .await?
            .unwrap_or_default())
    }

    /// Rewrite the full blob; the TTL restarts at the full window.
    pub async fn store(&self, user_id: &str, history: &str) -> Result<()> {
        self.cache.set(&Self::key(user_id), history, self.ttl).await
    }

    /// Render the blob for the next turn: prior history plus the completed
    /// exchange.
    pub fn appended(history: &str, transcript: &str, response: &str) -> String {
        format!("{}\nUser: {}\nAgent: {}", history, transcript, response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;

    fn store_with_ttl(ttl: Duration) -> HistoryStore {
        HistoryStore::with_ttl(Arc::new(InMemoryCache::new()), ttl)
    }

    #[tokio::test]
    async fn test_load_absent_is_empty() {
        let store = store_with_ttl(Duration::from_secs(60));
        assert_eq!(store.load("user-1").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_append_format() {
        let blob = HistoryStore::appended("", "I need a loan", "Tell me your name");
        assert_eq!(blob, "\nUser: I need a loan\nAgent: Tell me your name");

        let blob = HistoryStore::appended(&blob, "My name is Raju", "Thank you Raju");
        assert_eq!(
            blob,
            "\nUser: I need a loan\nAgent: Tell me your name\nUser: My name is Raju\nAgent: Thank you Raju"
        );
    }

    #[tokio::test]
    async fn test_store_and_load_roundtrip() {
        let store = store_with_ttl(Duration::from_secs(60));
        store.store("user-1", "\nUser: hello\nAgent: hi").await.unwrap();
        assert_eq!(
            store.load("user-1").await.unwrap(),
            "\nUser: hello\nAgent: hi"
        );
        // Scoped per user
        assert_eq!(store.load("user-2").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_write_resets_ttl_to_full_window() {
        let store = store_with_ttl(Duration::from_millis(300));
        store.store("user-1", "first").await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        // Second write near the end of the first window must restart the clock.
        store.store("user-1", "second").await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(store.load("user-1").await.unwrap(), "second");

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(store.load("user-1").await.unwrap(), "");
    }
}
