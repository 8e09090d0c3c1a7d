//! # VJA-Core
//!
//! Core library for the VJA-Core situational-awareness assistant.
//! Provides the mock telemetry feeds, proactive trigger detection, prompt
//! construction, the inference client interface, speech playback, and the
//! conversation controller that ties them together.

pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod providers;
pub mod session;
pub mod telemetry;
pub mod trigger;
pub mod types;
pub mod voice;

// Re-export commonly used types at the crate root.
pub use config::{AppConfig, LlmConfig, TelemetryConfig, UiConfig, VoiceConfig};
pub use controller::{
    ConversationCallback, ConversationController, FALLBACK_REPLY, GREETING, IgnoreReason,
    NoOpCallback, SubmitOutcome,
};
pub use error::{Result, VjaError};
pub use providers::{InferenceClient, MockInferenceClient, ReplyRequest, create_client};
pub use session::Session;
pub use telemetry::{TelemetryDataset, TelemetryFeed};
pub use types::{
    ConversationState, ConversationTurn, ObservationEvent, ObservationSnapshot,
    ObservationStatus, SceneSummary, Speaker, StatusSnapshot, StatusValue,
};
pub use voice::{Announcer, AudioSink, SpeechOutcome, SpeechPipeline};
