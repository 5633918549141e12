//! Gemini-backed reasoning oracle

use crate::gemini::GeminiClient;
use crate::reasoner::ReasoningOracle;
use crate::Result;
use async_trait::async_trait;

pub struct GeminiOracle {
    client: GeminiClient,
}

impl GeminiOracle {
    pub fn new(api_key: String) -> Self {
        Self {
            client: GeminiClient::new(api_key),
        }
    }
}

#[async_trait]
impl ReasoningOracle for GeminiOracle {
    async fn complete(&self, instructions: &str, prompt: &str) -> Result<String> {
        // Stop before the model invents its own tool observations.
        self.client
            .generate(
                instructions,
                prompt,
                Some(vec!["\nObservation".to_string()]),
            )
            .await
    }
}
