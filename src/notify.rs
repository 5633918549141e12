//! Realtime notification publisher
//!
//! Pushes the completed turn to the client over the Ably REST collaborator,
//! one channel per user.

use crate::error::AgentError;
use crate::Result;
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

const ABLY_REST_URL: &str = "https://rest.ably.io";

/// Event pushed to the client after a completed turn
#[derive(Debug, Clone, Serialize)]
pub struct NotificationEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub transcription: String,
    pub text: String,
    #[serde(rename = "audioUrl")]
    pub audio_url: String,
    /// Reasoning-loop trace for debugging clients
    pub raw: serde_json::Value,
}

impl NotificationEvent {
    pub fn response(
        transcription: impl Into<String>,
        text: impl Into<String>,
        audio_url: impl Into<String>,
        raw: serde_json::Value,
    ) -> Self {
        Self {
            event_type: "response".to_string(),
            transcription: transcription.into(),
            text: text.into(),
            audio_url: audio_url.into(),
            raw,
        }
    }
}

/// Trait for the realtime-transport collaborator
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, user_id: &str, event: &NotificationEvent) -> Result<()>;
}

/// Ably REST publisher. Channel name is `user:<userId>`.
pub struct AblyNotifier {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AblyNotifier {
    pub fn new(api_key: String) -> Self {
        if api_key.is_empty() {
            warn!("ABLY_API_KEY is not configured");
        }

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            base_url: ABLY_REST_URL.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl Notifier for AblyNotifier {
    async fn publish(&self, user_id: &str, event: &NotificationEvent) -> Result<()> {
        let (key_name, key_secret) = self.api_key.split_once(':').ok_or_else(|| {
            AgentError::ExternalServiceError("Malformed Ably API key".to_string())
        })?;

        let url = format!("{}/channels/user:{}/messages", self.base_url, user_id);

        let response = self
            .client
            .post(&url)
            .basic_auth(key_name, Some(key_secret))
            .json(&json!({ "name": "update", "data": event }))
            .send()
            .await
            .map_err(|e| {
                AgentError::ExternalServiceError(format!("Ably publish failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::ExternalServiceError(format!(
                "Ably returned {}: {}",
                status, body
            )));
        }

        debug!(user_id = %user_id, "Notification published");
        Ok(())
    }
}

/// No-op publisher for development without a transport configured
pub struct NullNotifier;

#[async_trait::async_trait]
impl Notifier for NullNotifier {
    async fn publish(&self, user_id: &str, event: &NotificationEvent) -> Result<()> {
        debug!(
            user_id = %user_id,
            text = %event.text,
            "Notification transport disabled, dropping event"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let event = NotificationEvent::response(
            "I want a loan",
            "Your loan is approved.",
            "https://audio.test/1.mp3",
            json!({ "iterations": 5 }),
        );

        let wire = serde_json::to_value(&event).unwrap();
        assert_eq!(wire["type"], "response");
        assert_eq!(wire["transcription"], "I want a loan");
        assert_eq!(wire["text"], "Your loan is approved.");
        assert_eq!(wire["audioUrl"], "https://audio.test/1.mp3");
        assert_eq!(wire["raw"]["iterations"], 5);
    }
}
