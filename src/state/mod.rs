//! Durable run state kept alongside the input documents.
//!
//! Two files live in the input directory:
//! - `state.json`: every record extracted so far, rewritten after each success
//! - `failed.json`: identities that failed and have not succeeded since

mod failures;
mod store;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::documents::DocumentId;

pub use failures::{FailureLedger, FAILURES_FILE};
pub use store::{LoadedState, StateStore, STATE_FILE};

/// Errors reading or writing durable state.
#[derive(Debug, Error)]
pub enum StateError {
    /// The file exists but does not have the expected shape. Never treated as
    /// empty, which would re-process and duplicate every record.
    #[error("Corrupt state file {}: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StateError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StateError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn corrupt(path: &Path, reason: impl Into<String>) -> Self {
        StateError::Corrupt {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Structured output for one document.
///
/// Always carries a string `filename` key holding the document identity;
/// every other value is passed through verbatim from the generation reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Reserved key holding the document identity.
    pub const FILENAME: &'static str = "filename";

    /// Build a record for `id`, overriding any `filename` already in `fields`.
    pub fn new(id: &DocumentId, mut fields: Map<String, Value>) -> Self {
        fields.insert(
            Self::FILENAME.to_string(),
            Value::String(id.as_str().to_string()),
        );
        Self(fields)
    }

    /// Wrap a map read back from disk, checking the `filename` key.
    pub fn from_map(map: Map<String, Value>) -> Result<Self, String> {
        match map.get(Self::FILENAME) {
            Some(Value::String(_)) => Ok(Self(map)),
            Some(other) => Err(format!("\"filename\" is not a string: {}", other)),
            None => Err("record has no \"filename\" key".to_string()),
        }
    }

    /// Document identity of this record.
    pub fn id(&self) -> DocumentId {
        DocumentId::new(self.filename())
    }

    pub fn filename(&self) -> &str {
        self.0
            .get(Self::FILENAME)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Replace `path` with `contents` via a sibling temp file and a rename, so a
/// reader never sees a partially written file.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    fs::rename(&temp_path, path)
}
