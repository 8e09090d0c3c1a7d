//! Subcommand handlers for the VJA CLI.

use crate::render::{self, Style};
use crate::{Commands, ConfigAction};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use vja_core::telemetry::TelemetryDataset;
use vja_core::voice::{AudioSink, WavFileSink, output_sink};
use vja_core::{AppConfig, SpeechOutcome, SpeechPipeline};

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    config: AppConfig,
) -> anyhow::Result<()> {
    match command {
        Commands::Config { action } => handle_config(action, workspace, &config),
        Commands::Say { text, output } => handle_say(&text, output, &config).await,
        Commands::Telemetry { json } => handle_telemetry(json, &config),
    }
}

pub fn init_config(workspace: &Path) -> anyhow::Result<()> {
    let (path, created) = vja_core::config::init_workspace_config(workspace)?;
    if created {
        println!("Created default configuration at: {}", path.display());
    } else {
        println!("Configuration file already exists at: {}", path.display());
    }
    Ok(())
}

fn handle_config(action: ConfigAction, workspace: &Path, config: &AppConfig) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => init_config(workspace),
        ConfigAction::Show => {
            let mut shown = config.clone();
            if shown.llm.api_key.is_some() {
                shown.llm.api_key = Some("<redacted>".to_string());
            }
            println!("{}", toml::to_string_pretty(&shown)?);
            Ok(())
        }
    }
}

async fn handle_say(text: &str, output: Option<PathBuf>, config: &AppConfig) -> anyhow::Result<()> {
    let client = vja_core::create_client(&config.llm)
        .map_err(|e| anyhow::anyhow!("Failed to create inference client: {}", e))?;

    let sink: Arc<dyn AudioSink> = match &output {
        Some(path) => Arc::new(WavFileSink::new(path.clone())),
        None => output_sink(&config.voice),
    };
    let pipeline = if output.is_some() || config.voice.enabled {
        SpeechPipeline::new(client, sink.clone())
    } else {
        SpeechPipeline::disabled(client, sink.clone())
    };

    match pipeline.speak_now(text).await {
        SpeechOutcome::Played {
            samples,
            duration_secs,
        } => {
            match &output {
                Some(path) => println!(
                    "Wrote {:.1}s of speech ({} samples) to {}",
                    duration_secs,
                    samples,
                    path.display()
                ),
                None => println!("Speaking {:.1}s of audio via {}", duration_secs, sink.name()),
            }
            // Live playback runs on its own thread; keep the process alive until it ends.
            if output.is_none() && sink.name() == "cpal" {
                tokio::time::sleep(Duration::from_secs_f32(duration_secs + 0.3)).await;
            }
            Ok(())
        }
        SpeechOutcome::Disabled => {
            println!("Speech output is disabled (voice.enabled = false or --no-audio).");
            Ok(())
        }
        SpeechOutcome::NoAudio => anyhow::bail!("The speech model returned no audio"),
        SpeechOutcome::Failed(reason) => anyhow::bail!("Speech failed: {}", reason),
    }
}

fn handle_telemetry(json: bool, config: &AppConfig) -> anyhow::Result<()> {
    let dataset = TelemetryDataset::from_config(&config.telemetry)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&dataset)?);
        return Ok(());
    }

    let style = Style::new(config.ui.color);
    println!(
        "{} observation snapshots every {}s, {} status snapshots every {}s\n",
        dataset.observations.len(),
        config.telemetry.observation_interval_secs,
        dataset.statuses.len(),
        config.telemetry.status_interval_secs
    );
    // Pair snapshots by index; the shorter feed repeats cyclically.
    let rows = dataset.observations.len().max(dataset.statuses.len());
    for i in 0..rows {
        let observation = &dataset.observations[i % dataset.observations.len()];
        let status = &dataset.statuses[i % dataset.statuses.len()];
        println!("{}", style.yellow(&format!("#{}", i)));
        println!("{}", render::status_panel(observation, status, style));
    }
    Ok(())
}
