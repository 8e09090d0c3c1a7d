//! Speech payload decoding.
//!
//! Synthesized speech arrives as base64 text wrapping raw 16-bit signed
//! little-endian PCM. Samples are normalized by dividing by 32768.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::types::{AudioChunk, SPEECH_CHANNELS, SPEECH_SAMPLE_RATE};
use crate::error::VoiceError;

/// Decode standard-alphabet base64 text into bytes.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>, VoiceError> {
    STANDARD
        .decode(payload.trim())
        .map_err(|e| VoiceError::Decode {
            message: e.to_string(),
        })
}

/// Reinterpret bytes as i16 LE samples and normalize to f32.
///
/// A trailing odd byte is dropped.
pub fn pcm16le_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect()
}

/// Decode a synthesized speech payload into a 24 kHz mono chunk.
pub fn decode_speech_payload(payload: &str) -> Result<AudioChunk, VoiceError> {
    let bytes = decode_base64(payload)?;
    let samples = pcm16le_to_f32(&bytes);
    Ok(AudioChunk::new(samples, SPEECH_SAMPLE_RATE, SPEECH_CHANNELS).stamped())
}
