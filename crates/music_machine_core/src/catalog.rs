use std::str::FromStr;

use serde::ser::{Serialize, SerializeMap, Serializer};

/// The two instrument groups a sequence has tracks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentCategory {
    Drums,
    Synths,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown instrument category '{0}'")]
pub struct UnknownCategory(pub String);

impl FromStr for InstrumentCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "drums" => Ok(InstrumentCategory::Drums),
            "synths" => Ok(InstrumentCategory::Synths),
            other => Err(UnknownCategory(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundType {
    Drum,
    Synth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

/// Timbre parameters handed to the client-side audio layer.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum Voice {
    Drum {
        frequency: u32,
        decay: f64,
    },
    Synth {
        waveform: Waveform,
        frequency: u32,
        attack: f64,
        decay: f64,
        sustain: f64,
        release: f64,
    },
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SoundDefinition {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub sound_type: SoundType,
    #[serde(flatten)]
    pub voice: Voice,
    pub color: &'static str,
}

impl SoundDefinition {
    const fn drum(name: &'static str, frequency: u32, decay: f64, color: &'static str) -> Self {
        Self {
            name,
            sound_type: SoundType::Drum,
            voice: Voice::Drum { frequency, decay },
            color,
        }
    }

    const fn synth(
        name: &'static str,
        waveform: Waveform,
        frequency: u32,
        adsr: [f64; 4],
        color: &'static str,
    ) -> Self {
        Self {
            name,
            sound_type: SoundType::Synth,
            voice: Voice::Synth {
                waveform,
                frequency,
                attack: adsr[0],
                decay: adsr[1],
                sustain: adsr[2],
                release: adsr[3],
            },
            color,
        }
    }
}

static DRUM_SOUNDS: [(&str, SoundDefinition); 6] = [
    ("kick", SoundDefinition::drum("Kick Drum", 60, 0.5, "#ff6b6b")),
    ("snare", SoundDefinition::drum("Snare Drum", 200, 0.3, "#4ecdc4")),
    ("hihat", SoundDefinition::drum("Hi-Hat Closed", 8000, 0.1, "#45b7d1")),
    ("openhat", SoundDefinition::drum("Hi-Hat Open", 6000, 0.2, "#96ceb4")),
    ("crash", SoundDefinition::drum("Crash Cymbal", 5000, 1.0, "#feca57")),
    ("clap", SoundDefinition::drum("Hand Clap", 1000, 0.2, "#ff9ff3")),
];

static SYNTH_SOUNDS: [(&str, SoundDefinition); 4] = [
    (
        "bass",
        SoundDefinition::synth("Bass Synth", Waveform::Sawtooth, 80, [0.01, 0.3, 0.7, 0.5], "#e17055"),
    ),
    (
        "lead",
        SoundDefinition::synth("Lead Synth", Waveform::Square, 440, [0.05, 0.2, 0.5, 0.3], "#a29bfe"),
    ),
    (
        "pad",
        SoundDefinition::synth("Pad Synth", Waveform::Sine, 220, [0.5, 0.3, 0.8, 1.0], "#6c5ce7"),
    ),
    (
        "pluck",
        SoundDefinition::synth("Pluck Synth", Waveform::Triangle, 440, [0.01, 0.1, 0.5, 0.3], "#ff6b81"),
    ),
];

/// Read-only view over one category of the catalog.
///
/// Serializes as a JSON object keyed by instrument name, in catalog order.
#[derive(Debug, Clone, Copy)]
pub struct SoundTable(&'static [(&'static str, SoundDefinition)]);

impl SoundTable {
    pub fn get(&self, name: &str) -> Option<&'static SoundDefinition> {
        let entries = self.0;
        entries.iter().find(|(key, _)| *key == name).map(|(_, def)| def)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + use<> {
        let entries = self.0;
        entries.iter().map(|(key, _)| *key)
    }
}

impl Serialize for SoundTable {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, def) in self.0 {
            map.serialize_entry(key, def)?;
        }
        map.end()
    }
}

/// Every sound definition for a category.
pub fn get_available_sounds(category: InstrumentCategory) -> SoundTable {
    match category {
        InstrumentCategory::Drums => SoundTable(&DRUM_SOUNDS),
        InstrumentCategory::Synths => SoundTable(&SYNTH_SOUNDS),
    }
}

/// A single sound definition, or `None` if the category has no such instrument.
pub fn get_sound_config(category: InstrumentCategory, name: &str) -> Option<&'static SoundDefinition> {
    get_available_sounds(category).get(name)
}

pub fn instrument_names(category: InstrumentCategory) -> impl Iterator<Item = &'static str> {
    get_available_sounds(category).names()
}

/// Both categories together, as served by the instruments endpoint.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct Instruments {
    pub drums: SoundTable,
    pub synths: SoundTable,
}

pub fn instruments() -> Instruments {
    Instruments {
        drums: get_available_sounds(InstrumentCategory::Drums),
        synths: get_available_sounds(InstrumentCategory::Synths),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_drum_names() {
        let names: Vec<_> = instrument_names(InstrumentCategory::Drums).collect();
        assert_eq!(names, vec!["kick", "snare", "hihat", "openhat", "crash", "clap"]);
    }

    #[test]
    fn test_synth_names() {
        let names: Vec<_> = instrument_names(InstrumentCategory::Synths).collect();
        assert_eq!(names, vec!["bass", "lead", "pad", "pluck"]);
    }

    #[test]
    fn test_get_sound_config() {
        let kick = get_sound_config(InstrumentCategory::Drums, "kick").unwrap();
        assert_eq!(kick.name, "Kick Drum");
        assert_eq!(kick.sound_type, SoundType::Drum);
        assert_eq!(
            kick.voice,
            Voice::Drum {
                frequency: 60,
                decay: 0.5
            }
        );

        let pad = get_sound_config(InstrumentCategory::Synths, "pad").unwrap();
        match pad.voice {
            Voice::Synth { waveform, release, .. } => {
                assert_eq!(waveform, Waveform::Sine);
                assert_eq!(release, 1.0);
            }
            _ => panic!("Expected synth voice"),
        }
    }

    #[test]
    fn test_unknown_sound_is_none() {
        assert!(get_sound_config(InstrumentCategory::Drums, "cowbell").is_none());
        // Names are not shared across categories
        assert!(get_sound_config(InstrumentCategory::Synths, "kick").is_none());
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!("drums".parse::<InstrumentCategory>(), Ok(InstrumentCategory::Drums));
        assert_eq!("synths".parse::<InstrumentCategory>(), Ok(InstrumentCategory::Synths));
        let err = "keys".parse::<InstrumentCategory>().unwrap_err();
        assert_eq!(err.to_string(), "unknown instrument category 'keys'");
    }

    #[test]
    fn test_serialize_drum_definition() {
        let value = serde_json::to_value(get_sound_config(InstrumentCategory::Drums, "snare")).unwrap();
        assert_eq!(
            value,
            json!({
                "name": "Snare Drum",
                "type": "drum",
                "frequency": 200,
                "decay": 0.3,
                "color": "#4ecdc4"
            })
        );
    }

    #[test]
    fn test_serialize_synth_definition() {
        let value = serde_json::to_value(get_sound_config(InstrumentCategory::Synths, "bass")).unwrap();
        assert_eq!(
            value,
            json!({
                "name": "Bass Synth",
                "type": "synth",
                "waveform": "sawtooth",
                "frequency": 80,
                "attack": 0.01,
                "decay": 0.3,
                "sustain": 0.7,
                "release": 0.5,
                "color": "#e17055"
            })
        );
    }

    #[test]
    fn test_serialize_instruments() {
        let value = serde_json::to_value(instruments()).unwrap();
        assert_eq!(value["drums"].as_object().unwrap().len(), 6);
        assert_eq!(value["synths"].as_object().unwrap().len(), 4);
        assert_eq!(value["synths"]["pluck"]["waveform"], "triangle");
        // Pitches are whole hertz
        assert!(value["drums"]["kick"]["frequency"].is_u64());
        assert!(value["synths"]["lead"]["frequency"].is_u64());
    }
}
