//! Ledger of documents that failed and have not succeeded since.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{write_atomic, StateError};
use crate::documents::DocumentId;

/// File name of the failure ledger inside the input directory.
pub const FAILURES_FILE: &str = "failed.json";

/// Durable JSON array of failed document identities.
///
/// The ledger is informational: a listed document is still retried on the
/// next run because it has no record yet.
#[derive(Debug, Clone)]
pub struct FailureLedger {
    path: PathBuf,
}

impl FailureLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Ledger colocated with the documents in `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(FAILURES_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the prior failure set. A missing file is an empty set.
    pub fn load(&self) -> Result<BTreeSet<DocumentId>, StateError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let ids: Vec<DocumentId> = serde_json::from_str(&contents).map_err(|e| {
                    StateError::corrupt(&self.path, format!("expected array of strings: {}", e))
                })?;
                Ok(ids.into_iter().collect())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeSet::new()),
            Err(e) => Err(StateError::io(&self.path, e)),
        }
    }

    /// Drop prior failures that have since been processed, then add this
    /// run's failures.
    pub fn reconcile(
        prior_failed: BTreeSet<DocumentId>,
        processed: &HashSet<DocumentId>,
        newly_failed: &[DocumentId],
    ) -> BTreeSet<DocumentId> {
        let mut failed: BTreeSet<DocumentId> = prior_failed
            .into_iter()
            .filter(|id| !processed.contains(id))
            .collect();
        failed.extend(newly_failed.iter().cloned());
        failed
    }

    /// Rewrite the ledger, even when empty so stale entries are cleared.
    pub fn persist(&self, failed: &BTreeSet<DocumentId>) -> Result<(), StateError> {
        let json = serde_json::to_vec(failed)
            .map_err(|e| StateError::corrupt(&self.path, e.to_string()))?;
        write_atomic(&self.path, &json).map_err(|e| StateError::io(&self.path, e))
    }

    /// Reconcile a previously loaded set with this run and persist it,
    /// returning the new set.
    pub fn update(
        &self,
        prior: BTreeSet<DocumentId>,
        processed: &HashSet<DocumentId>,
        newly_failed: &[DocumentId],
    ) -> Result<BTreeSet<DocumentId>, StateError> {
        let prior_count = prior.len();
        let failed = Self::reconcile(prior, processed, newly_failed);
        self.persist(&failed)?;

        debug!(
            "Failure ledger: {} prior, {} new this run, {} outstanding",
            prior_count,
            newly_failed.len(),
            failed.len()
        );
        if !failed.is_empty() {
            warn!("There were errors, the list is in {}", self.path.display());
        }
        Ok(failed)
    }
}
