//! Built-in mock telemetry and JSON dataset loading.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::TelemetryConfig;
use crate::error::TelemetryError;
use crate::types::{
    ObservationEvent, ObservationSnapshot, ObservationStatus, SceneSummary, StatusSnapshot,
};

/// The two fixed snapshot sequences the telemetry feed cycles through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryDataset {
    pub observations: Vec<ObservationSnapshot>,
    pub statuses: Vec<StatusSnapshot>,
}

impl TelemetryDataset {
    /// Reject datasets that cannot be cycled.
    pub fn validate(&self) -> Result<(), TelemetryError> {
        if self.observations.is_empty() {
            return Err(TelemetryError::EmptySequence {
                feed: "observations".into(),
            });
        }
        if self.statuses.is_empty() {
            return Err(TelemetryError::EmptySequence {
                feed: "statuses".into(),
            });
        }
        Ok(())
    }

    /// Load a dataset from a JSON file of the form
    /// `{ "observations": [...], "statuses": [...] }`.
    pub fn load(path: &Path) -> Result<Self, TelemetryError> {
        let content = std::fs::read_to_string(path).map_err(|e| TelemetryError::DatasetLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let dataset: TelemetryDataset =
            serde_json::from_str(&content).map_err(|e| TelemetryError::DatasetLoad {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        dataset.validate()?;
        Ok(dataset)
    }

    /// The dataset named by `config.dataset_path`, or the built-in one.
    pub fn from_config(config: &TelemetryConfig) -> Result<Self, TelemetryError> {
        match &config.dataset_path {
            Some(path) => Self::load(path),
            None => Ok(Self::builtin()),
        }
    }

    /// The built-in evening scenario: a delivery, then the user sitting down at the desk.
    pub fn builtin() -> Self {
        Self {
            observations: builtin_observations(),
            statuses: builtin_statuses(),
        }
    }
}

fn snapshot(
    timestamp: &str,
    status: ObservationStatus,
    objects_detected: u32,
    threat_level: &str,
    events: Option<Vec<ObservationEvent>>,
) -> ObservationSnapshot {
    ObservationSnapshot {
        timestamp: timestamp.to_string(),
        status,
        scene_summary: SceneSummary {
            objects_detected,
            threat_level: threat_level.to_string(),
        },
        new_events: events,
    }
}

fn builtin_observations() -> Vec<ObservationSnapshot> {
    use ObservationStatus::{Event, Scanning};

    vec![
        snapshot("2025-11-01T20:57:03Z", Scanning, 0, "None", None),
        snapshot(
            "2025-11-01T20:57:10Z",
            Event,
            1,
            "Low",
            Some(vec![ObservationEvent::new(
                "object_entered",
                "person",
                "1",
                "driveway",
            )]),
        ),
        snapshot(
            "2025-11-01T20:57:18Z",
            Event,
            2,
            "Low",
            Some(vec![ObservationEvent::new(
                "object_entered",
                "delivery_drone",
                "2",
                "porch_airspace",
            )]),
        ),
        snapshot(
            "2025-11-01T20:57:25Z",
            Event,
            2,
            "None",
            Some(vec![
                ObservationEvent::new("object_left", "delivery_drone", "2", "porch_airspace"),
                ObservationEvent::new("object_entered", "package", "3", "porch"),
            ]),
        ),
        snapshot(
            "2025-11-01T20:58:05Z",
            Event,
            1,
            "None",
            Some(vec![
                ObservationEvent::new("object_left", "person", "1", "driveway"),
                ObservationEvent::new("object_stationary", "package", "3", "porch")
                    .with_duration("40s"),
            ]),
        ),
        snapshot("2025-11-01T20:59:00Z", Scanning, 1, "None", None),
        snapshot(
            "2025-11-01T21:05:15Z",
            Event,
            1,
            "None",
            Some(vec![
                ObservationEvent::new("object_stationary", "person", "pid_001", "desk_chair")
                    .with_duration("3s"),
            ]),
        ),
    ]
}

fn status(entries: &[(&str, &str)]) -> Option<StatusSnapshot> {
    StatusSnapshot::new(entries.iter().copied()).ok()
}

fn builtin_statuses() -> Vec<StatusSnapshot> {
    [
        status(&[
            ("security", "Armed (Home)"),
            ("network", "Secure"),
            ("power", "Grid (99%)"),
        ]),
        status(&[
            ("security", "Disarmed"),
            ("network", "Secure"),
            ("power", "Grid (98%)"),
        ]),
        status(&[
            ("security", "Armed (Away)"),
            ("network_status", "External Connection Detected"),
            ("power", "Grid (99%)"),
        ]),
        status(&[
            ("security", "Disarmed"),
            ("media_playback", "Paused"),
            ("lighting", "Ambient (40%)"),
        ]),
        status(&[
            ("security", "Disarmed"),
            ("COMP_MAIN", "Asleep"),
            ("LIGHT_DESK", "Off"),
        ]),
        status(&[
            ("security", "Disarmed"),
            ("COMP_MAIN", "Online"),
            ("LIGHT_DESK", "On (60%)"),
        ]),
        status(&[
            ("security", "Armed (Home)"),
            ("internal_temp", "21°C"),
            ("calendar_event", "Project Deadline (15:00)"),
        ]),
    ]
    .into_iter()
    .flatten()
    .collect()
}
