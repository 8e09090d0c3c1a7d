//! Error types for the VJA-Core library.
//!
//! Uses `thiserror` for public API error types with structured error variants
//! covering inference, speech, configuration, and telemetry domains.

use std::path::PathBuf;

/// Top-level error type for the VJA-Core library.
#[derive(Debug, thiserror::Error)]
pub enum VjaError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Voice error: {0}")]
    Voice(#[from] VoiceError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the remote inference API.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },

    #[error("Unknown provider: {provider}")]
    UnknownProvider { provider: String },
}

/// Errors from speech decoding and audio playback.
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    #[error("Speech payload decode failed: {message}")]
    Decode { message: String },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("No audio output device available")]
    NoOutputDevice,

    #[error("Audio playback failed: {message}")]
    PlaybackFailed { message: String },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// Errors from telemetry datasets and feeds.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Telemetry sequence '{feed}' is empty")]
    EmptySequence { feed: String },

    #[error("Status snapshot is missing the required '{key}' key")]
    MissingStatusKey { key: String },

    #[error("Failed to load dataset {path}: {message}")]
    DatasetLoad { path: PathBuf, message: String },
}

/// A type alias for results using the top-level `VjaError`.
pub type Result<T> = std::result::Result<T, VjaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_llm() {
        let err = VjaError::Llm(LlmError::ApiRequest {
            message: "connection refused".into(),
        });
        assert_eq!(
            err.to_string(),
            "LLM error: API request failed: connection refused"
        );
    }

    #[test]
    fn test_error_display_voice() {
        let err = VjaError::Voice(VoiceError::Decode {
            message: "invalid padding".into(),
        });
        assert_eq!(
            err.to_string(),
            "Voice error: Speech payload decode failed: invalid padding"
        );
    }

    #[test]
    fn test_error_display_config() {
        let err = VjaError::Config(ConfigError::FileNotFound {
            path: PathBuf::from("/etc/vja.toml"),
        });
        assert_eq!(
            err.to_string(),
            "Configuration error: Configuration file not found: /etc/vja.toml"
        );
    }

    #[test]
    fn test_error_display_telemetry() {
        let err = VjaError::Telemetry(TelemetryError::MissingStatusKey {
            key: "security".into(),
        });
        assert_eq!(
            err.to_string(),
            "Telemetry error: Status snapshot is missing the required 'security' key"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: VjaError = io_err.into();
        assert!(matches!(err, VjaError::Io(_)));
    }

    #[test]
    fn test_error_from_telemetry() {
        let err: VjaError = TelemetryError::EmptySequence {
            feed: "statuses".into(),
        }
        .into();
        assert!(matches!(err, VjaError::Telemetry(_)));
    }

    #[test]
    fn test_llm_error_variants() {
        let err = LlmError::RateLimited {
            retry_after_secs: 30,
        };
        assert_eq!(err.to_string(), "Rate limited by provider, retry after 30s");

        let err = LlmError::AuthFailed {
            provider: "Gemini".into(),
        };
        assert_eq!(err.to_string(), "Authentication failed for provider Gemini");
    }
}
