//! Plain-text rendering of telemetry and conversation for the terminal.

use std::fmt::Write;
use vja_core::{ConversationTurn, ObservationEvent, ObservationSnapshot, Speaker, StatusSnapshot};

/// ANSI styling that can be switched off.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Style {
    color: bool,
}

impl Style {
    pub(crate) fn new(color: bool) -> Self {
        Self { color }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("\x1b[{}m{}\x1b[0m", code, text)
        } else {
            text.to_string()
        }
    }

    pub(crate) fn green(&self, text: &str) -> String {
        self.paint("32", text)
    }

    pub(crate) fn cyan(&self, text: &str) -> String {
        self.paint("36", text)
    }

    pub(crate) fn yellow(&self, text: &str) -> String {
        self.paint("33", text)
    }

    pub(crate) fn red(&self, text: &str) -> String {
        self.paint("31", text)
    }

    pub(crate) fn dim(&self, text: &str) -> String {
        self.paint("90", text)
    }

    pub(crate) fn bold(&self, text: &str) -> String {
        self.paint("1", text)
    }
}

pub(crate) fn assistant_line(text: &str, style: Style) -> String {
    format!("{} {}", style.green("VJA-Core:"), text)
}

fn speaker_label(speaker: Speaker, style: Style) -> String {
    match speaker {
        Speaker::User => style.cyan("You:"),
        Speaker::Assistant => style.green("VJA-Core:"),
    }
}

fn event_line(event: &ObservationEvent) -> String {
    let mut line = format!(
        "{} {} #{} @ {}",
        event.event_kind, event.object_class, event.object_id, event.location_zone
    );
    if let Some(duration) = &event.duration {
        let _ = write!(line, " ({})", duration);
    }
    line
}

fn threat(level: &str, style: Style) -> String {
    if level.eq_ignore_ascii_case("none") {
        style.green(level)
    } else {
        style.red(level)
    }
}

/// The two-panel status view shown by `/status`.
pub(crate) fn status_panel(
    observation: &ObservationSnapshot,
    status: &StatusSnapshot,
    style: Style,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", style.bold("VISTA"));
    let _ = writeln!(out, "  Time:    {}", observation.timestamp);
    let _ = writeln!(out, "  Status:  {}", observation.status);
    let _ = writeln!(
        out,
        "  Objects: {}",
        observation.scene_summary.objects_detected
    );
    let _ = writeln!(
        out,
        "  Threat:  {}",
        threat(&observation.scene_summary.threat_level, style)
    );
    let events = observation.events();
    if events.is_empty() {
        let _ = writeln!(out, "  Events:  {}", style.dim("none"));
    } else {
        let _ = writeln!(out, "  Events:");
        for event in events {
            let _ = writeln!(out, "    - {}", event_line(event));
        }
    }

    let _ = writeln!(out, "{}", style.bold("System Core"));
    for (key, value) in status.iter() {
        let _ = writeln!(out, "  {}: {}", key, value);
    }
    out
}

/// One-line summary printed when the observation feed advances.
pub(crate) fn observation_update(observation: &ObservationSnapshot, style: Style) -> String {
    let events = observation.events();
    let detail = if events.is_empty() {
        "no new events".to_string()
    } else {
        events.iter().map(event_line).collect::<Vec<_>>().join("; ")
    };
    style.dim(&format!(
        "[vista] {} | {} | {}",
        observation.status, observation.scene_summary.objects_detected, detail
    ))
}

/// One-line summary printed when the status feed advances.
pub(crate) fn status_update(status: &StatusSnapshot, style: Style) -> String {
    style.dim(&format!("[core] security: {}", status.security()))
}

pub(crate) fn history(turns: &[ConversationTurn], style: Style) -> String {
    let mut out = String::new();
    for (index, turn) in turns.iter().enumerate() {
        let _ = writeln!(
            out,
            "{} {} {}",
            style.dim(&format!("{:>3}", index)),
            speaker_label(turn.speaker, style),
            turn.text
        );
    }
    out
}

pub(crate) const HELP: &str = "\
Commands:
  /status   Show the current VISTA and System Core telemetry
  /history  Show the conversation so far
  /help     Show this help
  /quit     Exit (also /exit, Ctrl+C)

Anything else is sent to VJA-Core.";
