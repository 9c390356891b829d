pub mod catalog;
pub mod sequence;
pub mod store;

pub use catalog::{InstrumentCategory, SoundDefinition, get_available_sounds, get_sound_config};
pub use sequence::{
    Effects, Lenient, MAX_STEPS, Sequence, SequenceId, SequencePatch, SessionId, Tracks, Volume,
};
pub use store::{SequenceStore, StoreError};
