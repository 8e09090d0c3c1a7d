//! Speech playback pipeline: synthesize, decode, play.
//!
//! Every step can abort. Failures are logged and never reach the caller.

use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use super::decode::decode_speech_payload;
use super::sink::AudioSink;
use crate::error::VoiceError;
use crate::providers::InferenceClient;

/// Receives assistant text that should be spoken aloud.
pub trait Announcer: Send + Sync {
    /// Request playback of `text`. Returns immediately.
    fn announce(&self, text: String);
}

/// How a single `speak_now` call ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SpeechOutcome {
    /// Speech output is turned off; nothing was requested.
    Disabled,
    /// Audio was decoded and handed to the sink.
    Played { samples: usize, duration_secs: f32 },
    /// The synthesis response carried no audio payload.
    NoAudio,
    /// Synthesis, decoding, or playback failed.
    Failed(String),
}

/// Synthesize-decode-play pipeline over an inference client and an audio sink.
#[derive(Clone)]
pub struct SpeechPipeline {
    client: Arc<dyn InferenceClient>,
    sink: Arc<dyn AudioSink>,
    enabled: bool,
}

impl SpeechPipeline {
    pub fn new(client: Arc<dyn InferenceClient>, sink: Arc<dyn AudioSink>) -> Self {
        Self {
            client,
            sink,
            enabled: true,
        }
    }

    /// A pipeline that never calls the synthesis API.
    pub fn disabled(client: Arc<dyn InferenceClient>, sink: Arc<dyn AudioSink>) -> Self {
        Self {
            client,
            sink,
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Run the pipeline for `text` and wait until playback has started.
    pub async fn speak_now(&self, text: &str) -> SpeechOutcome {
        if !self.enabled {
            debug!("Speech output disabled; skipping synthesis");
            return SpeechOutcome::Disabled;
        }

        let payload = match self.client.synthesize_speech(text).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                warn!(provider = self.client.name(), "Speech response carried no audio");
                return SpeechOutcome::NoAudio;
            }
            Err(e) => {
                warn!(provider = self.client.name(), error = %e, "Speech synthesis failed");
                return SpeechOutcome::Failed(e.to_string());
            }
        };

        let chunk = match decode_speech_payload(&payload) {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!(error = %e, "Failed to decode speech payload");
                return SpeechOutcome::Failed(e.to_string());
            }
        };

        let samples = chunk.samples.len();
        let duration_secs = chunk.duration_secs();
        // Opening an output device can block; keep it off the async workers.
        let sink = Arc::clone(&self.sink);
        let started = tokio::task::spawn_blocking(move || sink.play(chunk))
            .await
            .unwrap_or_else(|e| {
                Err(VoiceError::PlaybackFailed {
                    message: format!("playback task failed: {}", e),
                })
            });
        if let Err(e) = started {
            warn!(sink = self.sink.name(), error = %e, "Audio playback failed");
            return SpeechOutcome::Failed(e.to_string());
        }

        info!(
            sink = self.sink.name(),
            samples,
            duration_secs,
            "Speech playback started"
        );
        SpeechOutcome::Played {
            samples,
            duration_secs,
        }
    }
}

impl Announcer for SpeechPipeline {
    fn announce(&self, text: String) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime available; dropping speech request");
            return;
        };
        let pipeline = self.clone();
        handle.spawn(async move {
            pipeline.speak_now(&text).await;
        });
    }
}

/// Collects announced text. Useful for tests and headless runs.
#[derive(Debug, Default, Clone)]
pub struct RecordingAnnouncer {
    spoken: Arc<Mutex<Vec<String>>>,
}

impl RecordingAnnouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything announced so far, in order.
    pub fn spoken(&self) -> Vec<String> {
        self.spoken
            .lock()
            .map(|spoken| spoken.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl Announcer for RecordingAnnouncer {
    fn announce(&self, text: String) {
        self.spoken
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::providers::MockInferenceClient;
    use crate::voice::sink::MemorySink;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    /// Holds `play` until a release message arrives.
    struct HeldSink {
        release: Mutex<mpsc::Receiver<()>>,
        inner: MemorySink,
    }

    impl AudioSink for HeldSink {
        fn play(&self, chunk: crate::voice::AudioChunk) -> Result<(), VoiceError> {
            let _ = self
                .release
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .recv();
            self.inner.play(chunk)
        }

        fn name(&self) -> &str {
            "held"
        }
    }

    fn pipeline(client: Arc<MockInferenceClient>, sink: MemorySink) -> SpeechPipeline {
        SpeechPipeline::new(client, Arc::new(sink))
    }

    #[tokio::test]
    async fn test_speak_now_plays_decoded_audio() {
        let client = Arc::new(MockInferenceClient::new());
        client.queue_speech(&STANDARD.encode([0x00, 0x40, 0x00, 0xC0]));
        let sink = MemorySink::new();

        let outcome = pipeline(client.clone(), sink.clone())
            .speak_now("Welcome.")
            .await;

        assert!(matches!(outcome, SpeechOutcome::Played { samples: 2, .. }));
        assert_eq!(client.utterances(), vec!["Welcome."]);
        let chunks = sink.chunks();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].samples, vec![0.5, -0.5]);
        assert_eq!(chunks[0].sample_rate, 24_000);
    }

    #[tokio::test]
    async fn test_missing_audio_is_skipped() {
        let client = Arc::new(MockInferenceClient::new());
        let sink = MemorySink::new();
        let outcome = pipeline(client, sink.clone()).speak_now("hello").await;
        assert_eq!(outcome, SpeechOutcome::NoAudio);
        assert!(sink.chunks().is_empty());
    }

    #[tokio::test]
    async fn test_synthesis_error_is_swallowed() {
        let client = Arc::new(MockInferenceClient::new());
        client.queue_speech_result(Err(LlmError::RateLimited {
            retry_after_secs: 30,
        }));
        let sink = MemorySink::new();
        let outcome = pipeline(client, sink.clone()).speak_now("hello").await;
        assert!(matches!(outcome, SpeechOutcome::Failed(_)));
        assert!(sink.chunks().is_empty());
    }

    #[tokio::test]
    async fn test_bad_payload_is_swallowed() {
        let client = Arc::new(MockInferenceClient::new());
        client.queue_speech("%%%not base64%%%");
        let sink = MemorySink::new();
        let outcome = pipeline(client, sink.clone()).speak_now("hello").await;
        assert!(matches!(outcome, SpeechOutcome::Failed(_)));
        assert!(sink.chunks().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_pipeline_skips_synthesis() {
        let client = Arc::new(MockInferenceClient::new());
        let pipeline = SpeechPipeline::disabled(client.clone(), Arc::new(MemorySink::new()));
        assert!(!pipeline.is_enabled());
        assert_eq!(pipeline.speak_now("hello").await, SpeechOutcome::Disabled);
        assert_eq!(client.speech_calls(), 0);
    }

    #[tokio::test]
    async fn test_announce_spawns_playback() {
        let client = Arc::new(MockInferenceClient::new());
        client.queue_speech(&STANDARD.encode([0x00, 0x00]));
        let sink = MemorySink::new();
        let pipeline = pipeline(client.clone(), sink.clone());

        pipeline.announce("Welcome.".to_string());
        for _ in 0..1_000 {
            if !sink.chunks().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(sink.chunks().len(), 1);
        assert_eq!(client.speech_calls(), 1);
    }

    #[tokio::test]
    async fn test_blocking_sink_does_not_stall_runtime() {
        let client = Arc::new(MockInferenceClient::new());
        client.queue_speech(&STANDARD.encode([0x00, 0x40]));
        let (release_tx, release_rx) = mpsc::channel();
        let inner = MemorySink::new();
        let sink = HeldSink {
            release: Mutex::new(release_rx),
            inner: inner.clone(),
        };
        let pipeline = SpeechPipeline::new(client, Arc::new(sink));

        // Failsafe so a stalled runtime surfaces as an assertion, not a hang.
        let released_by_failsafe = Arc::new(AtomicBool::new(false));
        {
            let flag = released_by_failsafe.clone();
            let tx = release_tx.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_secs(2));
                flag.store(true, Ordering::SeqCst);
                let _ = tx.send(());
            });
        }

        // Single-threaded runtime: this test only resumes if `play` runs elsewhere.
        let speaking = tokio::spawn(async move { pipeline.speak_now("hi").await });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(!released_by_failsafe.load(Ordering::SeqCst));
        assert!(inner.chunks().is_empty());

        release_tx.send(()).unwrap();
        let outcome = speaking.await.unwrap();
        assert!(matches!(outcome, SpeechOutcome::Played { samples: 1, .. }));
        assert_eq!(inner.chunks().len(), 1);
    }

    #[test]
    fn test_announce_without_runtime_is_dropped() {
        let client = Arc::new(MockInferenceClient::new());
        let pipeline = SpeechPipeline::new(client.clone(), Arc::new(MemorySink::new()));
        pipeline.announce("nobody hears this".to_string());
        assert_eq!(client.speech_calls(), 0);
    }

    #[test]
    fn test_recording_announcer() {
        let announcer = RecordingAnnouncer::new();
        announcer.announce("one".into());
        announcer.announce("two".into());
        assert_eq!(announcer.spoken(), vec!["one", "two"]);
    }
}
