//! Proactive trigger detection over consecutive observation snapshots.
//!
//! The detector is a pure rising-edge check: it fires when the current
//! snapshot contains a workspace-arrival event and the immediately preceding
//! snapshot did not. It keeps no memory of earlier fires, so a condition that
//! disappears for one snapshot and then returns fires again.

use crate::types::{ConversationTurn, ObservationEvent, ObservationSnapshot};

/// Text of the unsolicited greeting emitted on a workspace arrival.
pub const WORKSPACE_GREETING: &str = "Welcome. I've activated your workspace.";

const STATIONARY: &str = "object_stationary";
const PERSON: &str = "person";
const DESK_CHAIR: &str = "desk_chair";

/// A person has settled into the desk chair.
pub fn is_workspace_arrival(event: &ObservationEvent) -> bool {
    event.event_kind == STATIONARY
        && event.object_class == PERSON
        && event.location_zone == DESK_CHAIR
}

fn contains_arrival(snapshot: &ObservationSnapshot) -> bool {
    snapshot.events().iter().any(is_workspace_arrival)
}

/// Decide whether the transition `previous -> current` warrants a proactive turn.
pub fn detect(
    previous: Option<&ObservationSnapshot>,
    current: &ObservationSnapshot,
) -> Option<ConversationTurn> {
    let was_triggered = previous.is_some_and(contains_arrival);
    let is_triggered = contains_arrival(current);

    (is_triggered && !was_triggered).then(|| ConversationTurn::assistant(WORKSPACE_GREETING))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ObservationStatus, SceneSummary, Speaker};

    fn snapshot(events: Option<Vec<ObservationEvent>>) -> ObservationSnapshot {
        ObservationSnapshot {
            timestamp: "2025-11-01T21:05:15Z".into(),
            status: ObservationStatus::Event,
            scene_summary: SceneSummary {
                objects_detected: 1,
                threat_level: "None".into(),
            },
            new_events: events,
        }
    }

    fn arrival() -> ObservationEvent {
        ObservationEvent::new(STATIONARY, PERSON, "pid_001", DESK_CHAIR).with_duration("3s")
    }

    #[test]
    fn test_predicate_requires_all_three_fields() {
        assert!(is_workspace_arrival(&arrival()));
        assert!(!is_workspace_arrival(&ObservationEvent::new(
            "object_entered",
            PERSON,
            "1",
            DESK_CHAIR
        )));
        assert!(!is_workspace_arrival(&ObservationEvent::new(
            STATIONARY, "package", "3", DESK_CHAIR
        )));
        assert!(!is_workspace_arrival(&ObservationEvent::new(
            STATIONARY, PERSON, "1", "porch"
        )));
    }

    #[test]
    fn test_fires_on_rising_edge() {
        let previous = snapshot(Some(vec![ObservationEvent::new(
            "object_left",
            PERSON,
            "1",
            "driveway",
        )]));
        let current = snapshot(Some(vec![arrival()]));

        let turn = detect(Some(&previous), &current).unwrap();
        assert_eq!(turn.speaker, Speaker::Assistant);
        assert_eq!(turn.text, WORKSPACE_GREETING);
    }

    #[test]
    fn test_fires_when_previous_has_no_events_field() {
        let previous = snapshot(None);
        let current = snapshot(Some(vec![arrival()]));
        assert!(detect(Some(&previous), &current).is_some());
    }

    #[test]
    fn test_fires_without_previous_snapshot() {
        let current = snapshot(Some(vec![arrival()]));
        assert!(detect(None, &current).is_some());
    }

    #[test]
    fn test_sustained_condition_does_not_refire() {
        let previous = snapshot(Some(vec![arrival()]));
        let current = snapshot(Some(vec![arrival()]));
        assert!(detect(Some(&previous), &current).is_none());
    }

    #[test]
    fn test_falling_edge_does_not_fire() {
        let previous = snapshot(Some(vec![arrival()]));
        let current = snapshot(None);
        assert!(detect(Some(&previous), &current).is_none());
    }

    #[test]
    fn test_flicker_fires_again() {
        let present = snapshot(Some(vec![arrival()]));
        let absent = snapshot(Some(Vec::new()));

        assert!(detect(None, &present).is_some());
        assert!(detect(Some(&present), &absent).is_none());
        assert!(detect(Some(&absent), &present).is_some());
    }

    #[test]
    fn test_match_among_other_events() {
        let current = snapshot(Some(vec![
            ObservationEvent::new("object_entered", "package", "3", "porch"),
            arrival(),
        ]));
        assert!(detect(Some(&snapshot(None)), &current).is_some());
    }
}
