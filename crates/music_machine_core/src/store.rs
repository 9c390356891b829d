use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use thiserror::Error;

use crate::sequence::{Lenient, Sequence, SequenceId, SequencePatch, SessionId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("sequence {0} not found")]
    NotFound(SequenceId),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Default)]
struct StoreInner {
    sequences: HashMap<SequenceId, Sequence>,
    // Insertion order per session
    session_sequences: HashMap<SessionId, Vec<SequenceId>>,
}

/// In-memory owner of every sequence and the session -> sequence index.
///
/// One lock guards both maps for the whole of each operation, so the index and
/// the records can never be observed out of step.
#[derive(Default)]
pub struct SequenceStore {
    inner: Mutex<StoreInner>,
}

impl SequenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_sequence(
        &self,
        session_id: &SessionId,
        name: impl Into<Lenient<String>>,
        bpm: impl Into<Lenient<u32>>,
        steps: usize,
    ) -> SequenceId {
        let sequence = Sequence::new(session_id.clone(), name, bpm, steps);
        let id = sequence.id;

        let mut inner = self.inner.lock();
        inner.sequences.insert(id, sequence);
        inner
            .session_sequences
            .entry(session_id.clone())
            .or_default()
            .push(id);

        id
    }

    pub fn get_sequence(&self, id: &SequenceId) -> Option<Sequence> {
        self.inner.lock().sequences.get(id).cloned()
    }

    /// Every sequence the session owns, oldest first. Unknown sessions yield an empty list.
    pub fn get_session_sequences(&self, session_id: &SessionId) -> Vec<Sequence> {
        let inner = self.inner.lock();
        inner
            .session_sequences
            .get(session_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.sequences.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Apply `patch` and bump `updated_at`, even when the patch is empty.
    pub fn update_sequence(&self, id: &SequenceId, patch: SequencePatch) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        let sequence = inner
            .sequences
            .get_mut(id)
            .ok_or(StoreError::NotFound(*id))?;

        sequence.updated_at = Utc::now();
        patch.apply(sequence);
        Ok(())
    }

    pub fn delete_sequence(&self, id: &SequenceId) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        let sequence = inner
            .sequences
            .remove(id)
            .ok_or(StoreError::NotFound(*id))?;

        if let Some(ids) = inner.session_sequences.get_mut(&sequence.session_id) {
            ids.retain(|owned| owned != id);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
