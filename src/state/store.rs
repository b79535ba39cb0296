//! Append-and-rewrite record store.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use super::{write_atomic, Record, StateError};
use crate::documents::DocumentId;

/// File name of the record store inside the input directory.
pub const STATE_FILE: &str = "state.json";

/// Records loaded at the start of a run.
#[derive(Debug, Default)]
pub struct LoadedState {
    pub records: Vec<Record>,
    /// Identities of `records`; derived on load, never stored.
    pub identities: HashSet<DocumentId>,
}

/// Durable JSON array of records.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store colocated with the documents in `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(STATE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all records. A missing file is an empty store.
    pub fn load(&self) -> Result<LoadedState, StateError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No state at {}, starting empty", self.path.display());
                return Ok(LoadedState::default());
            }
            Err(e) => return Err(StateError::io(&self.path, e)),
        };

        let maps: Vec<Map<String, Value>> = serde_json::from_str(&contents).map_err(|e| {
            StateError::corrupt(&self.path, format!("expected array of objects: {}", e))
        })?;

        let mut state = LoadedState::default();
        for (index, map) in maps.into_iter().enumerate() {
            let record = Record::from_map(map).map_err(|reason| {
                StateError::corrupt(&self.path, format!("entry {}: {}", index, reason))
            })?;
            state.identities.insert(record.id());
            state.records.push(record);
        }

        debug!(
            "Loaded {} records from {}",
            state.records.len(),
            self.path.display()
        );
        Ok(state)
    }

    /// Append `record` and rewrite the whole store.
    ///
    /// On error the in-memory sequence keeps the record but the file still
    /// holds the previous contents.
    pub fn append_and_persist(
        &self,
        records: &mut Vec<Record>,
        record: Record,
    ) -> Result<(), StateError> {
        records.push(record);
        self.persist(records)
    }

    /// Rewrite the store with exactly `records`.
    pub fn persist(&self, records: &[Record]) -> Result<(), StateError> {
        let json = serde_json::to_vec(records)
            .map_err(|e| StateError::corrupt(&self.path, e.to_string()))?;
        write_atomic(&self.path, &json).map_err(|e| StateError::io(&self.path, e))
    }
}
