//! VJA CLI: terminal front end for the VJA-Core assistant.
//!
//! Starts the interactive REPL by default; subcommands cover configuration,
//! one-off speech, and dumping the mock telemetry.

mod commands;
mod render;
mod repl;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};
use vja_core::AppConfig;

/// VJA-Core: a voice assistant watching your home and desk
#[derive(Parser, Debug)]
#[command(name = "vja", version, about, long_about = None)]
struct Cli {
    /// Reasoning model to use
    #[arg(short, long)]
    model: Option<String>,

    /// Workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Disable speech playback
    #[arg(long)]
    no_audio: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Speak a single utterance through the speech pipeline
    Say {
        /// Text to speak
        text: String,
        /// Write the audio to a WAV file instead of the speakers
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the mock telemetry datasets
    Telemetry {
        /// Print raw JSON instead of the formatted panels
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Write a default .vja/config.toml into the workspace
    Init,
    /// Show the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // The REPL shares the terminal with logs, so stderr stays quiet by default.
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    // JSON file layer for structured logging
    let log_dir = directories::ProjectDirs::from("dev", "vja", "vja")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "vja.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    // `config init` must work even when the existing config does not parse.
    if let Some(Commands::Config {
        action: ConfigAction::Init,
    }) = &cli.command
    {
        return commands::init_config(&workspace);
    }

    let mut config = vja_core::config::load_config(Some(&workspace), cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    apply_overrides(&mut config, &cli);

    for warning in config.llm.validate() {
        tracing::warn!("{}", warning);
    }

    match cli.command {
        Some(command) => commands::handle_command(command, &workspace, config).await,
        None => repl::run_interactive(config, workspace).await,
    }
}

fn apply_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(model) = &cli.model {
        config.llm.model = model.clone();
    }
    if cli.no_audio {
        config.voice.enabled = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply_model_and_audio() {
        let cli = Cli::parse_from(["vja", "--model", "gemini-2.5-flash", "--no-audio"]);
        let mut config = AppConfig::default();
        apply_overrides(&mut config, &cli);
        assert_eq!(config.llm.model, "gemini-2.5-flash");
        assert!(!config.voice.enabled);
    }

    #[test]
    fn test_overrides_leave_defaults_alone() {
        let cli = Cli::parse_from(["vja"]);
        let mut config = AppConfig::default();
        apply_overrides(&mut config, &cli);
        assert_eq!(config.llm.model, AppConfig::default().llm.model);
        assert_eq!(config.voice.enabled, AppConfig::default().voice.enabled);
    }

    #[test]
    fn test_parse_say_with_output() {
        let cli = Cli::parse_from(["vja", "say", "Hello there", "-o", "out.wav"]);
        match cli.command {
            Some(Commands::Say { text, output }) => {
                assert_eq!(text, "Hello there");
                assert_eq!(output, Some(PathBuf::from("out.wav")));
            }
            other => panic!("Expected Say, got {:?}", other),
        }
    }

    #[test]
    fn test_verbosity_counts() {
        let cli = Cli::parse_from(["vja", "-vv"]);
        assert_eq!(cli.verbose, 2);
        assert!(!cli.quiet);
    }
}
