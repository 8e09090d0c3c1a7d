//! Configuration system for VJA-Core.
//!
//! Uses `figment` for layered configuration: defaults -> config files -> environment.
//! Configuration is loaded from `~/.config/vja/config.toml` and/or `.vja/config.toml`
//! in the workspace directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, VjaError};

/// Top-level configuration for VJA-Core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub telemetry: TelemetryConfig,
    pub voice: VoiceConfig,
    pub ui: UiConfig,
}

/// Remote inference configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name: "gemini" or "mock".
    pub provider: String,
    /// Model used for text replies.
    pub model: String,
    /// Model used for speech synthesis.
    pub speech_model: String,
    /// Prebuilt voice used for speech synthesis.
    pub voice_name: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Explicit API key. Takes precedence over `api_key_env`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Optional base URL override for the API endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Sampling temperature for text replies.
    pub temperature: f32,
    /// Nucleus sampling threshold for text replies.
    pub top_p: f32,
    /// Top-k sampling limit for text replies.
    pub top_k: u32,
    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-2.5-pro".to_string(),
            speech_model: "gemini-2.5-flash-preview-tts".to_string(),
            voice_name: "Kore".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            api_key: None,
            base_url: None,
            temperature: 0.6,
            top_p: 0.9,
            top_k: 40,
            timeout_secs: 120,
        }
    }
}

impl LlmConfig {
    /// Validate this LLM config and return any warnings.
    ///
    /// Returns an empty Vec if the config is valid. Returns human-readable
    /// warning messages for problematic values.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.temperature < 0.0 || self.temperature > 2.0 {
            warnings.push(format!(
                "temperature ({}) is outside the typical range 0.0–2.0",
                self.temperature
            ));
        }
        if self.top_p <= 0.0 || self.top_p > 1.0 {
            warnings.push(format!("top_p ({}) should be in (0.0, 1.0]", self.top_p));
        }
        if self.top_k == 0 {
            warnings.push("top_k is 0; the API will reject the request".to_string());
        }
        if self.timeout_secs == 0 {
            warnings.push("timeout_secs is 0; every request will time out".to_string());
        }
        warnings
    }
}

/// Mock telemetry feed configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Seconds between observation snapshot changes.
    pub observation_interval_secs: u64,
    /// Seconds between system status snapshot changes.
    pub status_interval_secs: u64,
    /// Optional JSON dataset replacing the built-in snapshots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_path: Option<PathBuf>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            observation_interval_secs: 7,
            status_interval_secs: 10,
            dataset_path: None,
        }
    }
}

/// Speech playback configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Whether assistant turns are spoken aloud.
    pub enabled: bool,
    /// Audio output device name (None = system default).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_device: Option<String>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output_device: None,
        }
    }
}

/// Terminal presentation preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// Print the status panel whenever a telemetry snapshot changes.
    pub show_telemetry_updates: bool,
    /// Use ANSI colors.
    pub color: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            show_telemetry_updates: false,
            color: true,
        }
    }
}

fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "vja", "vja")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load configuration with layered sources.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `VJA_`)
/// 2. Explicit config file (`--config`)
/// 3. Workspace-local config (`.vja/config.toml`)
/// 4. User config (`~/.config/vja/config.toml`)
/// 5. Built-in defaults
///
/// Each layer only replaces the keys it sets. CLI flags are applied by the
/// caller on the returned value.
pub fn load_config(
    workspace: Option<&Path>,
    config_file: Option<&Path>,
) -> Result<AppConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    // User-level config
    if let Some(user_config) = user_config_path()
        && user_config.exists()
    {
        figment = figment.merge(Toml::file(&user_config));
    }

    // Workspace-level config
    if let Some(ws) = workspace {
        let ws_config = ws.join(".vja").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // An explicitly named file must exist; figment would skip it silently.
    if let Some(path) = config_file {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        figment = figment.merge(Toml::file(path));
    }

    // Environment variables (VJA_LLM__MODEL, VJA_TELEMETRY__OBSERVATION_INTERVAL_SECS, etc.)
    figment = figment.merge(Env::prefixed("VJA_").split("__"));

    figment.extract().map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })
}

/// Check whether any VJA configuration file exists (user-level or workspace-level).
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if user_config_path().is_some_and(|p| p.exists()) {
        return true;
    }

    workspace.is_some_and(|ws| ws.join(".vja").join("config.toml").exists())
}

/// Write the default configuration to `<workspace>/.vja/config.toml`.
///
/// Returns the path and whether a new file was created; an existing file is left untouched.
pub fn init_workspace_config(workspace: &Path) -> Result<(PathBuf, bool), VjaError> {
    let config_dir = workspace.join(".vja");
    std::fs::create_dir_all(&config_dir)?;

    let config_path = config_dir.join("config.toml");
    if config_path.exists() {
        return Ok((config_path, false));
    }

    let toml_str =
        toml::to_string_pretty(&AppConfig::default()).map_err(|e| ConfigError::Invalid {
            message: e.to_string(),
        })?;
    std::fs::write(&config_path, toml_str)?;
    Ok((config_path, true))
}
