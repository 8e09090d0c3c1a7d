//! Remote inference clients.
//!
//! The assistant reaches its model through two stateless operations: a text
//! reply for a formatted prompt, and speech synthesis for an utterance.
//! [`GeminiClient`] talks to the Google Gemini REST API; [`MockInferenceClient`]
//! serves scripted results for tests and offline runs.
//!
//! Use `create_client()` to instantiate the client named in config.

pub mod gemini;
pub mod mock;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::LlmConfig;
use crate::error::LlmError;

pub use gemini::GeminiClient;
pub use mock::MockInferenceClient;

/// A text-reply request: persona instruction plus the formatted context prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyRequest {
    pub system_instruction: String,
    pub prompt: String,
}

impl ReplyRequest {
    pub fn new(system_instruction: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            prompt: prompt.into(),
        }
    }
}

/// The external model API as seen by the controller and the speech pipeline.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Generate the assistant's next reply text.
    async fn generate_reply(&self, request: &ReplyRequest) -> Result<String, LlmError>;

    /// Synthesize speech for `utterance`.
    ///
    /// Returns the base64-encoded PCM payload, or `None` when the response
    /// carried no audio.
    async fn synthesize_speech(&self, utterance: &str) -> Result<Option<String>, LlmError>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

/// Create the inference client selected by `config.provider`.
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn InferenceClient>, LlmError> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiClient::new(config)?)),
        "mock" => Ok(Arc::new(MockInferenceClient::new())),
        other => Err(LlmError::UnknownProvider {
            provider: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_mock_client() {
        let config = LlmConfig {
            provider: "mock".to_string(),
            ..Default::default()
        };
        let client = create_client(&config).unwrap();
        assert_eq!(client.name(), "mock");
    }

    #[test]
    fn test_create_gemini_client_with_explicit_key() {
        let config = LlmConfig {
            api_key: Some("explicit-key".to_string()),
            ..Default::default()
        };
        let client = create_client(&config).unwrap();
        assert_eq!(client.name(), "gemini");
    }

    #[test]
    fn test_create_unknown_provider() {
        let config = LlmConfig {
            provider: "openai".to_string(),
            ..Default::default()
        };
        match create_client(&config) {
            Err(LlmError::UnknownProvider { provider }) => assert_eq!(provider, "openai"),
            Err(other) => panic!("Expected UnknownProvider, got {:?}", other),
            Ok(_) => panic!("Expected UnknownProvider, got a client"),
        }
    }
}
