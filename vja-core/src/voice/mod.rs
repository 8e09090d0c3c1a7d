//! Speech output for assistant turns.
//!
//! Synthesized speech arrives as base64 PCM16LE at 24 kHz mono. It is
//! decoded to f32 samples and handed to an [`AudioSink`]. Playback through
//! the system output device (`CpalSink`) requires the `voice` feature.

pub mod convert;
pub mod decode;
pub mod pipeline;
pub mod sink;
pub mod types;

pub use decode::{decode_base64, decode_speech_payload, pcm16le_to_f32};
pub use pipeline::{Announcer, RecordingAnnouncer, SpeechOutcome, SpeechPipeline};
pub use sink::{AudioSink, MemorySink, NullSink, WavFileSink, output_sink, write_wav};
pub use types::{AudioChunk, SPEECH_CHANNELS, SPEECH_SAMPLE_RATE};

#[cfg(feature = "voice")]
pub use sink::CpalSink;
