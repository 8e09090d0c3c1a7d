//! Interactive REPL over a live VJA-Core session.

use crate::render::{self, Style};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{info, warn};
use vja_core::controller::ConversationCallback;
use vja_core::telemetry::TelemetryDataset;
use vja_core::voice::output_sink;
use vja_core::{
    AppConfig, ConversationController, ConversationTurn, IgnoreReason, InferenceClient,
    MockInferenceClient, ObservationSnapshot, Session, SpeechPipeline, StatusSnapshot,
    SubmitOutcome,
};

const PROMPT: &str = "> ";

/// Prints conversation turns to stdout as they are appended.
///
/// User turns are not echoed; the user has just typed them.
pub(crate) struct CliCallback {
    style: Style,
    /// Whether the input prompt is currently showing and idle.
    prompt_visible: AtomicBool,
    pending: AtomicBool,
}

impl CliCallback {
    pub(crate) fn new(style: Style) -> Self {
        Self {
            style,
            prompt_visible: AtomicBool::new(false),
            pending: AtomicBool::new(false),
        }
    }

    fn show_prompt(&self) {
        self.prompt_visible.store(true, Ordering::SeqCst);
        print!("{}", PROMPT);
        let _ = io::stdout().flush();
    }

    fn hide_prompt(&self) {
        self.prompt_visible.store(false, Ordering::SeqCst);
    }

    /// Print `line` without leaving the prompt stranded mid-output.
    fn print_async(&self, line: &str) {
        let at_prompt =
            self.prompt_visible.load(Ordering::SeqCst) && !self.pending.load(Ordering::SeqCst);
        if at_prompt {
            println!("\r{}", line);
            print!("{}", PROMPT);
            let _ = io::stdout().flush();
        } else {
            println!("{}", line);
        }
    }
}

impl ConversationCallback for CliCallback {
    fn on_turn(&self, _index: usize, turn: &ConversationTurn) {
        if turn.is_assistant() {
            self.print_async(&render::assistant_line(&turn.text, self.style));
        }
    }

    fn on_pending_change(&self, pending: bool) {
        self.pending.store(pending, Ordering::SeqCst);
        if pending {
            println!("{}", self.style.dim("  [analyzing telemetry...]"));
        } else {
            self.show_prompt();
        }
    }
}

fn build_client(config: &AppConfig) -> Arc<dyn InferenceClient> {
    match vja_core::create_client(&config.llm) {
        Ok(client) => {
            info!(provider = client.name(), model = %config.llm.model, "Inference client ready");
            client
        }
        Err(e) => {
            warn!("Failed to create inference client: {}. Using mock responses.", e);
            println!(
                "{} {}. Falling back to mock responses.\n",
                Style::new(config.ui.color).yellow("Warning:"),
                e
            );
            Arc::new(MockInferenceClient::new())
        }
    }
}

fn print_banner(config: &AppConfig, style: Style) {
    println!("{}", style.bold("VJA-Core"));
    println!(
        "  Model: {} | Voice: {} | Feeds: {}s / {}s",
        config.llm.model,
        if config.voice.enabled { "on" } else { "off" },
        config.telemetry.observation_interval_secs,
        config.telemetry.status_interval_secs
    );
    println!("  Type /help for commands.\n");
}

/// Print a one-line summary every time either feed advances.
fn spawn_update_printer(
    session: &Session,
    callback: Arc<CliCallback>,
    style: Style,
) -> JoinHandle<()> {
    let mut observation_rx = session.subscribe_observation();
    let mut status_rx = session.subscribe_status();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = observation_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = observation_rx.borrow_and_update().clone();
                    callback.print_async(&render::observation_update(&snapshot, style));
                }
                changed = status_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = status_rx.borrow_and_update().clone();
                    callback.print_async(&render::status_update(&snapshot, style));
                }
            }
        }
    })
}

fn report_outcome(outcome: SubmitOutcome, style: Style) {
    match outcome {
        SubmitOutcome::Ignored(IgnoreReason::Busy) => {
            println!(
                "{}",
                style.yellow("Still working on the previous request; try again in a moment.")
            );
        }
        SubmitOutcome::Fallback { error } => {
            println!("{}", style.dim(&format!("  (inference failed: {})", error)));
        }
        SubmitOutcome::Ignored(IgnoreReason::EmptyInput) | SubmitOutcome::Replied { .. } => {}
    }
}

/// Submit `text` on a background task tracked in `submits`.
///
/// Every submit is tracked, including ones the controller rejects as busy, so
/// aborting the set always reaches the request that is actually in flight.
fn spawn_submit(
    submits: &mut JoinSet<()>,
    controller: Arc<ConversationController>,
    observation: Arc<ObservationSnapshot>,
    status: Arc<StatusSnapshot>,
    text: String,
    style: Style,
) {
    while submits.try_join_next().is_some() {}
    submits.spawn(async move {
        let outcome = controller.submit(&text, &observation, &status).await;
        report_outcome(outcome, style);
    });
}

/// Run the interactive REPL until `/quit`, EOF, or Ctrl+C.
pub async fn run_interactive(config: AppConfig, workspace: PathBuf) -> anyhow::Result<()> {
    let style = Style::new(config.ui.color);
    info!(workspace = %workspace.display(), "Starting interactive session");

    let dataset = TelemetryDataset::from_config(&config.telemetry)?;
    let client = build_client(&config);
    let sink = output_sink(&config.voice);
    let pipeline = if config.voice.enabled {
        SpeechPipeline::new(client.clone(), sink)
    } else {
        SpeechPipeline::disabled(client.clone(), sink)
    };

    print_banner(&config, style);

    let callback = Arc::new(CliCallback::new(style));
    let session = Session::start(
        &config.telemetry,
        dataset,
        client,
        Arc::new(pipeline),
        callback.clone(),
    )?;

    let updates = config
        .ui
        .show_telemetry_updates
        .then(|| spawn_update_printer(&session, callback.clone(), style));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut submits = JoinSet::new();
    callback.show_prompt();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };
        callback.hide_prompt();

        let Some(line) = line else {
            // EOF
            println!();
            break;
        };
        let input = line.trim();

        match input {
            "" => {
                callback.show_prompt();
                continue;
            }
            "/quit" | "/exit" | "/q" => break,
            "/help" | "/?" => {
                println!("{}\n", render::HELP);
            }
            "/status" => {
                println!(
                    "{}",
                    render::status_panel(&session.observation(), &session.status(), style)
                );
            }
            "/history" => {
                print!("{}", render::history(&session.controller().turns(), style));
            }
            _ if input.starts_with('/') => {
                println!("Unknown command: {}. Type /help for commands.", input);
            }
            _ => {
                // Submit in the background so Ctrl+C and further input stay live.
                spawn_submit(
                    &mut submits,
                    session.controller().clone(),
                    session.observation(),
                    session.status(),
                    input.to_string(),
                    style,
                );
                continue;
            }
        }
        callback.show_prompt();
    }

    if let Some(handle) = updates {
        handle.abort();
    }
    submits.abort_all();
    session.shutdown().await;
    println!("Goodbye!");
    Ok(())
}
