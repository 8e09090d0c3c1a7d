//! Core type definitions for VJA-Core.
//!
//! Defines the telemetry snapshots produced by the mock feeds and the
//! conversation data owned by the controller.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::TelemetryError;

/// Vision stream state reported with each observation snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObservationStatus {
    Scanning,
    Event,
    Nominal,
}

impl fmt::Display for ObservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObservationStatus::Scanning => write!(f, "Scanning"),
            ObservationStatus::Event => write!(f, "Event"),
            ObservationStatus::Nominal => write!(f, "Nominal"),
        }
    }
}

/// Aggregate scene figures for one observation snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneSummary {
    pub objects_detected: u32,
    pub threat_level: String,
}

/// A single event reported by the vision stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationEvent {
    /// What happened, e.g. `object_entered`, `object_stationary`.
    #[serde(rename = "event")]
    pub event_kind: String,
    /// Object class, e.g. `person`, `package`.
    #[serde(rename = "class")]
    pub object_class: String,
    pub object_id: String,
    pub location_zone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

impl ObservationEvent {
    pub fn new(
        event_kind: impl Into<String>,
        object_class: impl Into<String>,
        object_id: impl Into<String>,
        location_zone: impl Into<String>,
    ) -> Self {
        Self {
            event_kind: event_kind.into(),
            object_class: object_class.into(),
            object_id: object_id.into(),
            location_zone: location_zone.into(),
            duration: None,
        }
    }

    /// Attach a dwell duration (e.g. `"40s"`).
    pub fn with_duration(mut self, duration: impl Into<String>) -> Self {
        self.duration = Some(duration.into());
        self
    }
}

/// A point-in-time record from the vision stream. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationSnapshot {
    pub timestamp: String,
    pub status: ObservationStatus,
    pub scene_summary: SceneSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_events: Option<Vec<ObservationEvent>>,
}

impl ObservationSnapshot {
    /// Events carried by this snapshot; empty when the field is absent.
    pub fn events(&self) -> &[ObservationEvent] {
        self.new_events.as_deref().unwrap_or(&[])
    }
}

/// A status value: either free text or a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for StatusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusValue::Number(n) => write!(f, "{}", n),
            StatusValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for StatusValue {
    fn from(value: &str) -> Self {
        StatusValue::Text(value.to_string())
    }
}

impl From<String> for StatusValue {
    fn from(value: String) -> Self {
        StatusValue::Text(value)
    }
}

impl From<f64> for StatusValue {
    fn from(value: f64) -> Self {
        StatusValue::Number(value)
    }
}

/// An insertion-ordered mapping of system status keys to values.
///
/// Always contains a `security` entry; construction fails otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    entries: Vec<(String, StatusValue)>,
}

impl StatusSnapshot {
    /// The key every status snapshot must carry.
    pub const SECURITY_KEY: &'static str = "security";

    /// Build a snapshot from ordered entries. A repeated key keeps its first
    /// position and takes the last value.
    pub fn new<K, V, I>(entries: I) -> Result<Self, TelemetryError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<StatusValue>,
    {
        let mut ordered: Vec<(String, StatusValue)> = Vec::new();
        for (key, value) in entries {
            let key = key.into();
            let value = value.into();
            match ordered.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => ordered.push((key, value)),
            }
        }

        if !ordered.iter().any(|(k, _)| k == Self::SECURITY_KEY) {
            return Err(TelemetryError::MissingStatusKey {
                key: Self::SECURITY_KEY.to_string(),
            });
        }

        Ok(Self { entries: ordered })
    }

    /// Look up a value by key.
    pub fn get(&self, key: &str) -> Option<&StatusValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// The security state, always present.
    pub fn security(&self) -> &StatusValue {
        // Presence is checked in `new` and in deserialization.
        self.get(Self::SECURITY_KEY)
            .unwrap_or(&self.entries[0].1)
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &StatusValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for StatusSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for StatusSnapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = StatusSnapshot;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "a map of status keys to string or number values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries: Vec<(String, StatusValue)> = Vec::new();
                while let Some((key, value)) = access.next_entry::<String, StatusValue>()? {
                    entries.push((key, value));
                }
                StatusSnapshot::new(entries).map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

/// Who authored a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

impl Speaker {
    /// Label used when rendering history into a prompt.
    pub fn prompt_label(&self) -> &'static str {
        match self {
            Speaker::User => "User",
            Speaker::Assistant => "VJA-Core",
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::User => write!(f, "user"),
            Speaker::Assistant => write!(f, "assistant"),
        }
    }
}

/// One message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub speaker: Speaker,
    pub text: String,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            text: text.into(),
        }
    }

    pub fn is_assistant(&self) -> bool {
        self.speaker == Speaker::Assistant
    }
}

/// Append-only conversation history plus the in-flight flag.
///
/// A turn's index in `turns` is its stable identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub turns: Vec<ConversationTurn>,
    pub pending: bool,
}

impl ConversationState {
    /// Create state seeded with a single assistant greeting.
    pub fn seeded(greeting: impl Into<String>) -> Self {
        Self {
            turns: vec![ConversationTurn::assistant(greeting)],
            pending: false,
        }
    }

    /// Append a turn and return its index.
    pub fn push(&mut self, turn: ConversationTurn) -> usize {
        self.turns.push(turn);
        self.turns.len() - 1
    }

    /// The newest turn and its index.
    pub fn latest(&self) -> Option<(usize, &ConversationTurn)> {
        self.turns.last().map(|t| (self.turns.len() - 1, t))
    }
}
