//! Scripted inference client for tests and offline runs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use super::{InferenceClient, ReplyRequest};
use crate::error::LlmError;

const DEFAULT_REPLY: &str = "Acknowledged. All systems remain nominal.";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Inference client that replays queued results.
///
/// With an empty reply queue every call returns the default reply (a fixed
/// acknowledgement unless set by [`MockInferenceClient::with_reply`]); with an
/// empty speech queue every call returns `Ok(None)`.
#[derive(Default)]
pub struct MockInferenceClient {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    default_reply: Option<String>,
    speech: Mutex<VecDeque<Result<Option<String>, LlmError>>>,
    requests: Mutex<Vec<ReplyRequest>>,
    utterances: Mutex<Vec<String>>,
    reply_calls: AtomicUsize,
    speech_calls: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
}

impl MockInferenceClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer with `text` whenever the reply queue is empty.
    pub fn with_reply(text: &str) -> Self {
        Self {
            default_reply: Some(text.to_string()),
            ..Self::default()
        }
    }

    /// Hold every `generate_reply` call until a permit is added to `gate`.
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn queue_reply(&self, text: &str) {
        lock(&self.replies).push_back(Ok(text.to_string()));
    }

    pub fn queue_reply_error(&self, error: LlmError) {
        lock(&self.replies).push_back(Err(error));
    }

    /// Queue a base64 payload for the next `synthesize_speech` call.
    pub fn queue_speech(&self, payload: &str) {
        lock(&self.speech).push_back(Ok(Some(payload.to_string())));
    }

    pub fn queue_speech_result(&self, result: Result<Option<String>, LlmError>) {
        lock(&self.speech).push_back(result);
    }

    pub fn reply_calls(&self) -> usize {
        self.reply_calls.load(Ordering::SeqCst)
    }

    pub fn speech_calls(&self) -> usize {
        self.speech_calls.load(Ordering::SeqCst)
    }

    /// Every reply request received, in order.
    pub fn requests(&self) -> Vec<ReplyRequest> {
        lock(&self.requests).clone()
    }

    /// Every utterance sent for synthesis, in order.
    pub fn utterances(&self) -> Vec<String> {
        lock(&self.utterances).clone()
    }
}

#[async_trait]
impl InferenceClient for MockInferenceClient {
    async fn generate_reply(&self, request: &ReplyRequest) -> Result<String, LlmError> {
        self.reply_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.requests).push(request.clone());

        if let Some(gate) = &self.gate {
            let permit = gate.acquire().await.map_err(|_| LlmError::Connection {
                message: "mock gate closed".to_string(),
            })?;
            permit.forget();
        }

        let next = lock(&self.replies).pop_front();
        next.unwrap_or_else(|| {
            Ok(self
                .default_reply
                .clone()
                .unwrap_or_else(|| DEFAULT_REPLY.to_string()))
        })
    }

    async fn synthesize_speech(&self, utterance: &str) -> Result<Option<String>, LlmError> {
        self.speech_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.utterances).push(utterance.to_string());
        let next = lock(&self.speech).pop_front();
        next.unwrap_or(Ok(None))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
