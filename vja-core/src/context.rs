//! Prompt construction for the text-reply call.
//!
//! `format_context` is a pure function of the telemetry snapshots, the
//! conversation history, and the current query.

use std::fmt::Write;

use crate::types::{ConversationTurn, ObservationSnapshot, StatusSnapshot};

/// Static persona and policy text sent as the system instruction.
pub const SYSTEM_INSTRUCTION: &str = include_str!("../prompts/system_instruction.md");

/// Rendered in place of an empty history section.
pub const NO_HISTORY_PLACEHOLDER: &str = "No previous conversation.";

/// Serialize the current interaction into a single prompt string.
///
/// `history` is expected to end with the just-submitted user turn; that turn
/// is left out of the rendered history because `user_query` carries it.
pub fn format_context(
    observation: &ObservationSnapshot,
    status: &StatusSnapshot,
    history: &[ConversationTurn],
    user_query: &str,
) -> String {
    let vista = serde_json::to_string_pretty(observation).unwrap_or_else(|_| "{}".to_string());
    let system = flatten_status(status);
    let previous = render_history(history);

    let mut prompt = String::new();
    let _ = write!(
        prompt,
        "\n--- CURRENT INTERACTION CONTEXT ---\n\
         [VISTA_DATA]:\n\
         {vista}\n\
         \n\
         [SYSTEM_STATUS]: {system}\n\
         [USER_QUERY]: {user_query}\n\
         \n\
         --- PREVIOUS CONVERSATION ---\n\
         {previous}\n\
         \n\
         --- YOUR TASK ---\n\
         Based on all your rules and the current interaction context, generate the next response for VJA-Core.\n"
    );
    prompt
}

/// `key: value` pairs joined by `, ` in insertion order.
pub fn flatten_status(status: &StatusSnapshot) -> String {
    status
        .iter()
        .map(|(key, value)| format!("{key}: {value}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Every turn except the newest, one `Label: text` line each.
fn render_history(history: &[ConversationTurn]) -> String {
    let earlier = match history.split_last() {
        Some((_, earlier)) => earlier,
        None => &[],
    };

    if earlier.is_empty() {
        return NO_HISTORY_PLACEHOLDER.to_string();
    }

    earlier
        .iter()
        .map(|turn| format!("{}: {}", turn.speaker.prompt_label(), turn.text))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ObservationEvent, ObservationStatus, SceneSummary};
    use pretty_assertions::assert_eq;

    fn observation() -> ObservationSnapshot {
        ObservationSnapshot {
            timestamp: "2025-11-01T20:57:10Z".into(),
            status: ObservationStatus::Event,
            scene_summary: SceneSummary {
                objects_detected: 1,
                threat_level: "Low".into(),
            },
            new_events: Some(vec![ObservationEvent::new(
                "object_entered",
                "person",
                "1",
                "driveway",
            )]),
        }
    }

    fn status() -> StatusSnapshot {
        StatusSnapshot::new([
            ("security", "Armed (Home)"),
            ("network", "Secure"),
            ("power", "Grid (99%)"),
        ])
        .unwrap()
    }

    #[test]
    fn test_full_prompt_layout() {
        let history = vec![
            ConversationTurn::assistant("VJA-Core online."),
            ConversationTurn::user("Who is outside?"),
        ];
        let prompt = format_context(&observation(), &status(), &history, "Who is outside?");

        let expected = r#"
--- CURRENT INTERACTION CONTEXT ---
[VISTA_DATA]:
{
  "timestamp": "2025-11-01T20:57:10Z",
  "status": "Event",
  "scene_summary": {
    "objects_detected": 1,
    "threat_level": "Low"
  },
  "new_events": [
    {
      "event": "object_entered",
      "class": "person",
      "object_id": "1",
      "location_zone": "driveway"
    }
  ]
}

[SYSTEM_STATUS]: security: Armed (Home), network: Secure, power: Grid (99%)
[USER_QUERY]: Who is outside?

--- PREVIOUS CONVERSATION ---
VJA-Core: VJA-Core online.

--- YOUR TASK ---
Based on all your rules and the current interaction context, generate the next response for VJA-Core.
"#;
        assert_eq!(prompt, expected);
    }

    #[test]
    fn test_placeholder_when_only_current_query() {
        let history = vec![ConversationTurn::user("status?")];
        let prompt = format_context(&observation(), &status(), &history, "status?");
        assert!(prompt.contains("--- PREVIOUS CONVERSATION ---\nNo previous conversation.\n"));
    }

    #[test]
    fn test_placeholder_when_history_empty() {
        let prompt = format_context(&observation(), &status(), &[], "status?");
        assert!(prompt.contains(NO_HISTORY_PLACEHOLDER));
    }

    #[test]
    fn test_history_order_and_labels() {
        let history = vec![
            ConversationTurn::assistant("greeting"),
            ConversationTurn::user("first"),
            ConversationTurn::assistant("reply"),
            ConversationTurn::user("second"),
        ];
        let rendered = render_history(&history);
        assert_eq!(rendered, "VJA-Core: greeting\nUser: first\nVJA-Core: reply");
        assert!(!rendered.contains("second"));
    }

    #[test]
    fn test_deterministic() {
        let history = vec![ConversationTurn::user("q")];
        let a = format_context(&observation(), &status(), &history, "q");
        let b = format_context(&observation(), &status(), &history, "q");
        assert_eq!(a, b);
    }

    #[test]
    fn test_flatten_status_numbers() {
        let status = StatusSnapshot::new(vec![
            ("security".to_string(), crate::types::StatusValue::from("Disarmed")),
            ("battery".to_string(), crate::types::StatusValue::Number(98.0)),
        ])
        .unwrap();
        assert_eq!(flatten_status(&status), "security: Disarmed, battery: 98");
    }

    #[test]
    fn test_system_instruction_mentions_modules() {
        assert!(SYSTEM_INSTRUCTION.contains("VISTA"));
        assert!(SYSTEM_INSTRUCTION.contains("[USER_QUERY]"));
    }
}
