//! Google Gemini API client.
//!
//! Both operations use the `generateContent` endpoint:
//! - Text replies send the persona as the top-level `system_instruction`
//!   and the formatted context as a single user turn.
//! - Speech synthesis asks the TTS model for an `AUDIO` response and
//!   returns the base64 inline data of the first part.
//!
//! Auth is the `?key=API_KEY` query parameter.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use super::{InferenceClient, ReplyRequest};
use crate::config::LlmConfig;
use crate::error::LlmError;

/// The default Google Gemini API base URL.
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Accepted when the configured key variable is unset.
const FALLBACK_KEY_ENV: &str = "API_KEY";

/// Google Gemini inference client.
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    speech_model: String,
    voice_name: String,
    temperature: f32,
    top_p: f32,
    top_k: u32,
}

impl GeminiClient {
    /// Create a client from configuration.
    ///
    /// The key is taken from `config.api_key`, then the variable named by
    /// `config.api_key_env`, then `API_KEY`. Returns `LlmError::AuthFailed`
    /// if none is set.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var(&config.api_key_env).ok())
            .or_else(|| std::env::var(FALLBACK_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| LlmError::AuthFailed {
                provider: format!(
                    "Gemini (env var '{}' not set)",
                    config.api_key_env
                ),
            })?;
        Self::new_with_key(config, api_key)
    }

    /// Create a client with an explicitly provided API key.
    pub fn new_with_key(config: &LlmConfig, api_key: String) -> Result<Self, LlmError> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| LlmError::Connection {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url,
            api_key,
            model: config.model.clone(),
            speech_model: config.speech_model.clone(),
            voice_name: config.voice_name.clone(),
            temperature: config.temperature,
            top_p: config.top_p,
            top_k: config.top_k,
        })
    }

    /// JSON body for a text reply.
    fn build_reply_body(&self, request: &ReplyRequest) -> Value {
        json!({
            "system_instruction": {
                "parts": [{ "text": request.system_instruction }],
            },
            "contents": [{
                "role": "user",
                "parts": [{ "text": request.prompt }],
            }],
            "generationConfig": {
                "temperature": self.temperature,
                "topP": self.top_p,
                "topK": self.top_k,
            },
        })
    }

    /// JSON body for speech synthesis.
    fn build_speech_body(&self, utterance: &str) -> Value {
        json!({
            "contents": [{
                "parts": [{ "text": utterance }],
            }],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": {
                        "prebuiltVoiceConfig": { "voiceName": self.voice_name },
                    },
                },
            },
        })
    }

    /// The parts array of the first candidate.
    fn first_candidate_parts(body: &Value) -> Result<&Vec<Value>, LlmError> {
        let candidates = body["candidates"]
            .as_array()
            .ok_or_else(|| LlmError::ResponseParse {
                message: "Missing 'candidates' array in response".to_string(),
            })?;

        let candidate = candidates.first().ok_or_else(|| LlmError::ResponseParse {
            message: "Empty 'candidates' array in response".to_string(),
        })?;

        candidate["content"]["parts"]
            .as_array()
            .ok_or_else(|| LlmError::ResponseParse {
                message: "Missing 'parts' array in candidate content".to_string(),
            })
    }

    /// Concatenate the text parts of the first candidate.
    fn parse_reply_text(body: &Value) -> Result<String, LlmError> {
        let parts = Self::first_candidate_parts(body)?;
        let texts: Vec<&str> = parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect();

        if texts.is_empty() {
            return Err(LlmError::ResponseParse {
                message: "No text parts in candidate content".to_string(),
            });
        }
        Ok(texts.concat())
    }

    /// Inline audio of the first part of the first candidate, if any.
    fn parse_inline_audio(body: &Value) -> Option<String> {
        body["candidates"][0]["content"]["parts"][0]["inlineData"]["data"]
            .as_str()
            .filter(|data| !data.is_empty())
            .map(str::to_string)
    }

    /// Map an HTTP status code to the appropriate `LlmError`.
    fn map_http_error(status: reqwest::StatusCode, body_text: &str) -> LlmError {
        match status.as_u16() {
            401 | 403 => LlmError::AuthFailed {
                provider: "Gemini".to_string(),
            },
            429 => LlmError::RateLimited {
                retry_after_secs: 30,
            },
            _ => LlmError::ApiRequest {
                message: format!("HTTP {} from Gemini API: {}", status, body_text),
            },
        }
    }

    fn endpoint_url(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        )
    }

    /// POST `body` to `model` and return the parsed JSON response.
    async fn post_generate(&self, model: &str, body: &Value) -> Result<Value, LlmError> {
        let url = self.endpoint_url(model);

        let response = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::ApiRequest {
                message: format!("Request to Gemini API failed: {}", e.without_url()),
            })?;

        let status = response.status();
        let body_text = response.text().await.map_err(|e| LlmError::ResponseParse {
            message: format!("Failed to read response body: {}", e.without_url()),
        })?;

        if !status.is_success() {
            return Err(Self::map_http_error(status, &body_text));
        }

        serde_json::from_str(&body_text).map_err(|e| LlmError::ResponseParse {
            message: format!("Invalid JSON in response: {}", e),
        })
    }
}

#[async_trait]
impl InferenceClient for GeminiClient {
    async fn generate_reply(&self, request: &ReplyRequest) -> Result<String, LlmError> {
        debug!(
            model = self.model.as_str(),
            prompt_len = request.prompt.len(),
            "Sending Gemini reply request"
        );
        let body = self.build_reply_body(request);
        let response = self.post_generate(&self.model, &body).await?;
        Self::parse_reply_text(&response)
    }

    async fn synthesize_speech(&self, utterance: &str) -> Result<Option<String>, LlmError> {
        debug!(
            model = self.speech_model.as_str(),
            voice = self.voice_name.as_str(),
            chars = utterance.chars().count(),
            "Sending Gemini speech request"
        );
        let body = self.build_speech_body(utterance);
        let response = self.post_generate(&self.speech_model, &body).await?;
        Ok(Self::parse_inline_audio(&response))
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
