use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use uuid::Uuid;

use crate::catalog::{InstrumentCategory, instrument_names};

pub const DEFAULT_NAME: &str = "Untitled Sequence";
pub const DEFAULT_BPM: u32 = 120;
pub const DEFAULT_STEPS: usize = 16;
/// Largest step count a new sequence may be created with.
pub const MAX_STEPS: usize = 1024;

// Timestamps travel as fractional Unix seconds
mod unix_seconds {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(time.timestamp_micros() as f64 / 1_000_000.0)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        DateTime::from_timestamp_micros((secs * 1_000_000.0).round() as i64)
            .ok_or_else(|| D::Error::custom(format!("timestamp {} out of range", secs)))
    }
}

/// Identifier of a stored sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceId(Uuid);

impl SequenceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SequenceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for SequenceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Opaque per-browser token used to group sequences for listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random session token.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A client-supplied field value.
///
/// Values that fit `T` are kept typed; anything else is stored verbatim as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(untagged)]
pub enum Lenient<T> {
    Typed(T),
    Raw(Value),
}

impl<T> Lenient<T> {
    pub fn typed(&self) -> Option<&T> {
        match self {
            Lenient::Typed(value) => Some(value),
            Lenient::Raw(_) => None,
        }
    }
}

impl<T> From<T> for Lenient<T> {
    fn from(value: T) -> Self {
        Lenient::Typed(value)
    }
}

impl From<&str> for Lenient<String> {
    fn from(value: &str) -> Self {
        Lenient::Typed(value.to_string())
    }
}

/// Instrument name -> one trigger flag per step.
pub type TrackGrid = BTreeMap<String, Vec<bool>>;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[serde(deny_unknown_fields)]
pub struct Tracks {
    pub drums: TrackGrid,
    pub synths: TrackGrid,
}

impl Tracks {
    /// All-off grids for every instrument currently in the catalog.
    pub fn silent(steps: usize) -> Self {
        let grid = |category| -> TrackGrid {
            instrument_names(category)
                .map(|name| (name.to_string(), vec![false; steps]))
                .collect()
        };
        Self {
            drums: grid(InstrumentCategory::Drums),
            synths: grid(InstrumentCategory::Synths),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[serde(deny_unknown_fields)]
pub struct Volume {
    pub master: f64,
    pub drums: f64,
    pub synths: f64,
}

impl Default for Volume {
    fn default() -> Self {
        Self {
            master: 0.7,
            drums: 0.75,
            synths: 0.65,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[serde(deny_unknown_fields)]
pub struct Effects {
    pub reverb: f64,
    pub delay: f64,
    pub filter: f64,
}

impl Default for Effects {
    fn default() -> Self {
        Self {
            reverb: 0.2,
            delay: 0.1,
            filter: 0.0,
        }
    }
}

/// A stored step pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct Sequence {
    #[ts(type = "string")]
    pub id: SequenceId,
    #[ts(type = "string")]
    pub session_id: SessionId,
    pub name: Lenient<String>,
    pub bpm: Lenient<u32>,
    pub steps: usize,
    #[serde(with = "unix_seconds")]
    #[ts(type = "number")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "unix_seconds")]
    #[ts(type = "number")]
    pub updated_at: DateTime<Utc>,
    pub tracks: Lenient<Tracks>,
    pub volume: Lenient<Volume>,
    pub effects: Lenient<Effects>,
}

impl Sequence {
    pub fn new(
        session_id: SessionId,
        name: impl Into<Lenient<String>>,
        bpm: impl Into<Lenient<u32>>,
        steps: usize,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: SequenceId::new(),
            session_id,
            name: name.into(),
            bpm: bpm.into(),
            steps,
            created_at: now,
            updated_at: now,
            tracks: Tracks::silent(steps).into(),
            volume: Volume::default().into(),
            effects: Effects::default().into(),
        }
    }
}

// A key that is present always counts, even when its value is `null`
fn present<'de, D, T>(deserializer: D) -> Result<Option<Lenient<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Lenient::deserialize(deserializer).map(Some)
}

/// Partial update accepted by [`crate::store::SequenceStore::update_sequence`].
///
/// Only these five fields can change after creation. Each one present replaces
/// the stored value as a whole, whatever its shape; unknown keys in the
/// incoming JSON are dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
pub struct SequencePatch {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub name: Option<Lenient<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub bpm: Option<Lenient<u32>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub tracks: Option<Lenient<Tracks>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub volume: Option<Lenient<Volume>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub effects: Option<Lenient<Effects>>,
}

impl SequencePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.bpm.is_none()
            && self.tracks.is_none()
            && self.volume.is_none()
            && self.effects.is_none()
    }

    /// Overwrite the whitelisted fields of `sequence`. Does not touch `updated_at`.
    pub fn apply(self, sequence: &mut Sequence) {
        if let Some(name) = self.name {
            sequence.name = name;
        }
        if let Some(bpm) = self.bpm {
            sequence.bpm = bpm;
        }
        if let Some(tracks) = self.tracks {
            sequence.tracks = tracks;
        }
        if let Some(volume) = self.volume {
            sequence.volume = volume;
        }
        if let Some(effects) = self.effects {
            sequence.effects = effects;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_sequence() -> Sequence {
        Sequence::new(SessionId::new("session-a"), "Beat", 100_u32, 8)
    }

    fn patch_from(value: Value) -> SequencePatch {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_new_sequence_defaults() {
        let seq = test_sequence();
        assert_eq!(seq.name, Lenient::from("Beat"));
        assert_eq!(seq.bpm, Lenient::Typed(100));
        assert_eq!(seq.steps, 8);
        assert_eq!(seq.created_at, seq.updated_at);
        assert_eq!(
            seq.volume,
            Lenient::Typed(Volume { master: 0.7, drums: 0.75, synths: 0.65 })
        );
        assert_eq!(
            seq.effects,
            Lenient::Typed(Effects { reverb: 0.2, delay: 0.1, filter: 0.0 })
        );
    }

    #[test]
    fn test_silent_tracks_match_catalog() {
        let tracks = Tracks::silent(12);
        for (category, group) in [
            (InstrumentCategory::Drums, &tracks.drums),
            (InstrumentCategory::Synths, &tracks.synths),
        ] {
            let names: Vec<_> = instrument_names(category).collect();
            assert_eq!(group.len(), names.len());
            for name in names {
                let steps = group.get(name).unwrap();
                assert_eq!(steps.len(), 12);
                assert!(steps.iter().all(|step| !step));
            }
        }
    }

    #[test]
    fn test_silent_tracks_do_not_alias() {
        let mut tracks = Tracks::silent(4);
        tracks.drums.get_mut("kick").unwrap()[0] = true;
        assert!(!tracks.drums["snare"][0]);
        assert!(!Tracks::silent(4).drums["kick"][0]);
    }

    #[test]
    fn test_sequence_id_parse() {
        let id = SequenceId::new();
        let parsed: SequenceId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<SequenceId>().is_err());
    }

    #[test]
    fn test_serialize_sequence_shape() {
        let seq = test_sequence();
        let value = serde_json::to_value(&seq).unwrap();
        assert_eq!(value["id"], json!(seq.id.to_string()));
        assert_eq!(value["session_id"], "session-a");
        assert_eq!(value["name"], "Beat");
        assert_eq!(value["bpm"], 100);
        assert_eq!(value["tracks"]["drums"]["kick"], json!(vec![false; 8]));
        assert_eq!(value["volume"]["master"], 0.7);
        assert!(value["created_at"].is_f64());
    }

    #[test]
    fn test_deserialize_sequence_from_json() {
        let seq = test_sequence();
        let json = serde_json::to_string(&seq).unwrap();
        let back: Sequence = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, seq.id);
        assert_eq!(back.tracks, seq.tracks);
        assert_eq!(back.created_at.timestamp_micros(), seq.created_at.timestamp_micros());
    }

    #[test]
    fn test_patch_ignores_unknown_fields() {
        let patch = patch_from(json!({
            "bpm": 140,
            "steps": 32,
            "id": "something-else",
            "session_id": "other"
        }));
        assert_eq!(
            patch,
            SequencePatch {
                bpm: Some(Lenient::Typed(140)),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_patch_replaces_tracks_wholesale() {
        let mut seq = test_sequence();
        patch_from(json!({
            "tracks": {"drums": {"kick": [true, false]}, "synths": {}}
        }))
        .apply(&mut seq);

        let tracks = seq.tracks.typed().unwrap();
        assert_eq!(tracks.drums.len(), 1);
        assert_eq!(tracks.drums["kick"], vec![true, false]);
        assert!(tracks.synths.is_empty());
        // steps is fixed at creation
        assert_eq!(seq.steps, 8);
    }

    #[test]
    fn test_patch_keeps_mismatched_values_verbatim() {
        let mut seq = test_sequence();
        let patch = patch_from(json!({
            "bpm": "fast",
            "volume": {"master": 0.5},
            "tracks": {"drums": {"kick": [1, 0]}},
            "effects": {"reverb": 0.1, "delay": 0.1, "filter": 0.0, "chorus": 0.4}
        }));
        assert!(!patch.is_empty());
        patch.apply(&mut seq);

        assert_eq!(seq.bpm, Lenient::Raw(json!("fast")));
        assert_eq!(seq.volume, Lenient::Raw(json!({"master": 0.5})));
        assert!(seq.tracks.typed().is_none());

        let value = serde_json::to_value(&seq).unwrap();
        assert_eq!(value["bpm"], "fast");
        assert_eq!(value["volume"], json!({"master": 0.5}));
        assert_eq!(value["tracks"], json!({"drums": {"kick": [1, 0]}}));
        assert_eq!(value["effects"]["chorus"], 0.4);
    }

    #[test]
    fn test_patch_null_is_a_replacement() {
        let mut seq = test_sequence();
        let patch = patch_from(json!({"name": null}));
        assert_eq!(patch.name, Some(Lenient::Raw(Value::Null)));
        patch.apply(&mut seq);
        assert_eq!(serde_json::to_value(&seq).unwrap()["name"], Value::Null);
    }

    #[test]
    fn test_empty_patch_changes_nothing() {
        let mut seq = test_sequence();
        let before = seq.clone();
        let patch = SequencePatch::default();
        assert!(patch.is_empty());
        patch.apply(&mut seq);
        assert_eq!(seq, before);
    }
}
