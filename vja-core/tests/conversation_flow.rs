//! End-to-end conversation flow over the mock telemetry feeds.
//!
//! Uses `MockInferenceClient` and a `MemorySink`, so every assistant turn
//! travels the full synthesize -> decode -> play path.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::sync::Arc;
use std::time::Duration;
use vja_core::config::TelemetryConfig;
use vja_core::controller::RecordingCallback;
use vja_core::error::LlmError;
use vja_core::telemetry::TelemetryDataset;
use vja_core::trigger::WORKSPACE_GREETING;
use vja_core::voice::{MemorySink, SpeechPipeline};
use vja_core::{FALLBACK_REPLY, GREETING, MockInferenceClient, Session, Speaker, SubmitOutcome};

struct Fixture {
    session: Session,
    client: Arc<MockInferenceClient>,
    sink: MemorySink,
    callback: Arc<RecordingCallback>,
}

fn start_session(client: MockInferenceClient) -> Fixture {
    let client = Arc::new(client);
    let sink = MemorySink::new();
    let pipeline = Arc::new(SpeechPipeline::new(client.clone(), Arc::new(sink.clone())));
    let callback = Arc::new(RecordingCallback::new());
    let session = Session::start(
        &TelemetryConfig::default(),
        TelemetryDataset::builtin(),
        client.clone(),
        pipeline,
        callback.clone(),
    )
    .unwrap();
    Fixture {
        session,
        client,
        sink,
        callback,
    }
}

/// Let spawned playback and forwarding tasks run.
async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

/// Wait for playback handed to the blocking pool to reach the sink.
async fn wait_for_chunks(sink: &MemorySink, count: usize) {
    for _ in 0..1_000 {
        if sink.chunks().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

fn one_sample() -> String {
    STANDARD.encode([0x00, 0x40])
}

#[tokio::test(start_paused = true)]
async fn every_assistant_turn_is_spoken_once() {
    let client = MockInferenceClient::new();
    client.queue_reply("The package is on the porch.");
    client.queue_reply_error(LlmError::Connection {
        message: "unreachable".into(),
    });
    for _ in 0..4 {
        client.queue_speech(&one_sample());
    }
    let fx = start_session(client);
    settle().await;

    let outcome = fx.session.submit("Any deliveries?").await;
    assert!(matches!(outcome, SubmitOutcome::Replied { .. }));

    tokio::time::sleep(Duration::from_millis(6 * 7_000 + 100)).await;
    settle().await;

    let outcome = fx.session.submit("What now?").await;
    assert!(matches!(outcome, SubmitOutcome::Fallback { .. }));
    settle().await;

    let assistant: Vec<String> = fx
        .session
        .controller()
        .turns()
        .into_iter()
        .filter(|t| t.speaker == Speaker::Assistant)
        .map(|t| t.text)
        .collect();
    assert_eq!(
        assistant,
        vec![
            GREETING,
            "The package is on the porch.",
            WORKSPACE_GREETING,
            FALLBACK_REPLY
        ]
    );
    assert_eq!(fx.client.utterances(), assistant);
    wait_for_chunks(&fx.sink, 4).await;
    assert_eq!(fx.sink.chunks().len(), 4);

    fx.session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn empty_input_leaves_history_alone() {
    let fx = start_session(MockInferenceClient::new());
    settle().await;

    assert_eq!(
        fx.session.submit("   ").await,
        SubmitOutcome::Ignored(vja_core::IgnoreReason::EmptyInput)
    );
    assert_eq!(fx.session.controller().turns().len(), 1);
    assert!(!fx.session.controller().is_pending());
    assert!(fx.callback.pending_changes().is_empty());

    fx.session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn missing_speech_payload_does_not_break_session() {
    // No queued speech: every synthesis call returns no audio.
    let fx = start_session(MockInferenceClient::with_reply("Copy that."));
    settle().await;

    let outcome = fx.session.submit("Status report.").await;
    settle().await;

    assert!(matches!(outcome, SubmitOutcome::Replied { .. }));
    assert!(fx.sink.chunks().is_empty());
    assert_eq!(fx.client.speech_calls(), 2);
    assert_eq!(fx.session.controller().turns().len(), 3);

    fx.session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn callback_sees_turns_in_order() {
    let fx = start_session(MockInferenceClient::with_reply("Understood."));
    settle().await;
    fx.session.submit("Hello").await;

    let indices: Vec<usize> = fx.callback.turns().iter().map(|(i, _)| *i).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert_eq!(fx.callback.pending_changes(), vec![true, false]);

    fx.session.shutdown().await;
}
