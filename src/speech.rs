//! Speech synthesis with content-addressed caching
//!
//! Wraps the external Murf TTS provider. Cache failures degrade to a direct
//! provider call; provider failures are classified as rate-limit vs. fatal.

use crate::cache::CacheStore;
use crate::error::AgentError;
use crate::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_VOICE_ID: &str = "en-IN-NeerjaNeural";

const MURF_API_URL: &str = "https://api.murf.ai/v1/tts";
const MURF_MODEL_ID: &str = "falcon-v1";

/// Cached audio URLs live for one hour
pub const SPEECH_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Content-addressed cache key: identical (text, voice) always map to the
/// same key; a different voice with the same text maps to a different key.
pub fn generate_cache_key(text: &str, voice_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.update(voice_id.as_bytes());
    format!("tts:{}", hex::encode(hasher.finalize()))
}

/// Trait for the external text-to-speech provider
#[async_trait::async_trait]
pub trait TtsProvider: Send + Sync {
    /// Synthesize `text` and return a URL to the generated audio.
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct MurfPayload<'a> {
    input: &'a str,
    voice_id: &'a str,
    model_id: &'a str,
    format: &'a str,
    speed: f32,
}

#[derive(Debug, Deserialize)]
struct MurfResponse {
    audio_file: Option<String>,
    url: Option<String>,
}

/// Murf.ai HTTP client (connection-pooled)
pub struct MurfClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl MurfClient {
    pub fn new(api_key: String) -> Self {
        if api_key.is_empty() {
            warn!("MURF_API_KEY is not configured");
        }

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            base_url: MURF_API_URL.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl TtsProvider for MurfClient {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<String> {
        let payload = MurfPayload {
            input: text,
            voice_id,
            model_id: MURF_MODEL_ID,
            format: "mp3",
            speed: 1.0,
        };

        let response = self
            .client
            .post(&self.base_url)
            .header("api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AgentError::TtsError(format!("Murf request failed: {}", e)))?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("Murf rate limit hit");
            return Err(AgentError::RateLimited(
                "TTS Service Busy (Rate Limit)".to_string(),
            ));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::TtsError(format!(
                "Murf returned {}: {}",
                status, body
            )));
        }

        let body: MurfResponse = response
            .json()
            .await
            .map_err(|e| AgentError::TtsError(format!("Invalid Murf response: {}", e)))?;

        body.audio_file
            .or(body.url)
            .ok_or_else(|| AgentError::TtsError("No audio URL in Murf response".to_string()))
    }
}

/// Cache-fronted speech synthesis
pub struct SpeechSynthesizer {
    provider: Arc<dyn TtsProvider>,
    cache: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl SpeechSynthesizer {
    pub fn new(provider: Arc<dyn TtsProvider>, cache: Arc<dyn CacheStore>) -> Self {
        Self {
            provider,
            cache,
            ttl: SPEECH_CACHE_TTL,
        }
    }

    pub fn with_ttl(provider: Arc<dyn TtsProvider>, cache: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self {
            provider,
            cache,
            ttl,
        }
    }

    /// Generate (or reuse) the audio URL for a spoken reply.
    pub async fn generate_speech(&self, text: &str, voice_id: &str) -> Result<String> {
        let cache_key = generate_cache_key(text, voice_id);

        match self.cache.get(&cache_key).await {
            Ok(Some(url)) => {
                debug!(voice_id = %voice_id, "Speech cache hit");
                return Ok(url);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Speech cache read failed, calling provider directly");
            }
        }

        let audio_url = self.provider.synthesize(text, voice_id).await?;

        if let Err(e) = self.cache.set(&cache_key, &audio_url, self.ttl).await {
            warn!(error = %e, "Failed to cache TTS result");
        }

        Ok(audio_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
    }

    impl CountingProvider {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl TtsProvider for CountingProvider {
        async fn synthesize(&self, text: &str, voice_id: &str) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("https://audio.test/{}/{}/{}", voice_id, text.len(), n))
        }
    }

    struct FailingCache;

    #[async_trait::async_trait]
    impl CacheStore for FailingCache {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(AgentError::ExternalServiceError("cache down".to_string()))
        }

        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<()> {
            Err(AgentError::ExternalServiceError("cache down".to_string()))
        }
    }

    struct RateLimitedProvider;

    #[async_trait::async_trait]
    impl TtsProvider for RateLimitedProvider {
        async fn synthesize(&self, _text: &str, _voice_id: &str) -> Result<String> {
            Err(AgentError::RateLimited("TTS Service Busy".to_string()))
        }
    }

    #[test]
    fn test_cache_key_is_pure_and_deterministic() {
        let a = generate_cache_key("Namaste", DEFAULT_VOICE_ID);
        let b = generate_cache_key("Namaste", DEFAULT_VOICE_ID);
        assert_eq!(a, b);
        assert!(a.starts_with("tts:"));
    }

    #[test]
    fn test_cache_key_varies_with_voice() {
        let a = generate_cache_key("Namaste", "en-IN-NeerjaNeural");
        let b = generate_cache_key("Namaste", "en-IN-PrabhatNeural");
        assert_ne!(a, b);
    }

    #[test]
    fn test_cache_key_varies_with_text() {
        let a = generate_cache_key("Namaste", DEFAULT_VOICE_ID);
        let b = generate_cache_key("Namaste ji", DEFAULT_VOICE_ID);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_repeated_requests_hit_provider_once() {
        let provider = CountingProvider::new();
        let synth = SpeechSynthesizer::new(provider.clone(), Arc::new(InMemoryCache::new()));

        let first = synth
            .generate_speech("Your loan is approved", DEFAULT_VOICE_ID)
            .await
            .unwrap();
        let second = synth
            .generate_speech("Your loan is approved", DEFAULT_VOICE_ID)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_expiry_triggers_exactly_one_refresh() {
        let provider = CountingProvider::new();
        let synth = SpeechSynthesizer::with_ttl(
            provider.clone(),
            Arc::new(InMemoryCache::new()),
            Duration::from_millis(50),
        );

        synth
            .generate_speech("Namaste", DEFAULT_VOICE_ID)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        synth
            .generate_speech("Namaste", DEFAULT_VOICE_ID)
            .await
            .unwrap();
        synth
            .generate_speech("Namaste", DEFAULT_VOICE_ID)
            .await
            .unwrap();

        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_cache_failure_degrades_silently() {
        let provider = CountingProvider::new();
        let synth = SpeechSynthesizer::new(provider.clone(), Arc::new(FailingCache));

        let url = synth
            .generate_speech("Namaste", DEFAULT_VOICE_ID)
            .await
            .unwrap();
        assert!(url.starts_with("https://audio.test/"));
        assert_eq!(provider.calls(), 1);

        // Every call pays the provider, but none of them fail.
        synth
            .generate_speech("Namaste", DEFAULT_VOICE_ID)
            .await
            .unwrap();
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_rate_limit_surfaces_as_distinct_kind() {
        let synth = SpeechSynthesizer::new(
            Arc::new(RateLimitedProvider),
            Arc::new(InMemoryCache::new()),
        );

        let err = synth
            .generate_speech("Namaste", DEFAULT_VOICE_ID)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::RateLimited(_)));
    }
}
