//! Resumable batch pipeline.
//!
//! One run walks the enumerated documents in order:
//! skip what already has a record, extract the rest one at a time, persist
//! state after every success, collect failures, then reconcile the failure
//! ledger and write the export.
//!
//! All run-wide accumulators live in a [`RunContext`] owned by the caller
//! and threaded through each step. Both durable files are read when the
//! context is loaded, so a corrupt one stops the run before any generation.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::documents::DocumentId;
use crate::export::{CsvExporter, ExportError};
use crate::extractor::{ExtractFailure, RecordExtractor};
use crate::state::{FailureLedger, Record, StateError, StateStore};

/// Errors that abort a run. Per-document failures never end up here.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("State error: {0}")]
    State(#[from] StateError),
    #[error("Export error: {0}")]
    Export(#[from] ExportError),
}

/// Mutable state of one run.
#[derive(Debug)]
pub struct RunContext {
    store: StateStore,
    ledger: FailureLedger,
    records: Vec<Record>,
    processed: HashSet<DocumentId>,
    prior_failed: BTreeSet<DocumentId>,
    failed: Vec<DocumentId>,
    extracted: usize,
    skipped: usize,
}

impl RunContext {
    /// Load prior records from `store` and prior failures from `ledger`.
    pub fn load(store: StateStore, ledger: FailureLedger) -> Result<Self, StateError> {
        let loaded = store.load()?;
        let prior_failed = ledger.load()?;
        Ok(Self {
            store,
            ledger,
            records: loaded.records,
            processed: loaded.identities,
            prior_failed,
            failed: Vec::new(),
            extracted: 0,
            skipped: 0,
        })
    }

    /// Context for the state and ledger files kept inside `dir`.
    pub fn load_dir(dir: &Path) -> Result<Self, StateError> {
        Self::load(StateStore::in_dir(dir), FailureLedger::in_dir(dir))
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn ledger(&self) -> &FailureLedger {
        &self.ledger
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn processed(&self) -> &HashSet<DocumentId> {
        &self.processed
    }

    /// Documents that failed during this run, in processing order.
    pub fn failed(&self) -> &[DocumentId] {
        &self.failed
    }

    pub fn is_processed(&self, id: &DocumentId) -> bool {
        self.processed.contains(id)
    }

    /// Persist a new record before anything else happens.
    fn record_success(&mut self, record: Record) -> Result<(), StateError> {
        let id = record.id();
        self.store.append_and_persist(&mut self.records, record)?;
        self.processed.insert(id);
        self.extracted += 1;
        Ok(())
    }

    fn record_failure(&mut self, id: DocumentId) {
        self.failed.push(id);
    }
}

/// What happened to one document.
#[derive(Debug)]
pub enum DocumentOutcome {
    /// Already had a record; nothing was done.
    Skipped,
    /// A record was extracted and persisted.
    Extracted,
    /// Extraction failed; the document stays eligible for the next run.
    Failed(ExtractFailure),
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Records extracted during this run.
    pub extracted: usize,
    /// Documents skipped because they already had a record.
    pub skipped: usize,
    /// Documents that failed during this run.
    pub failed: Vec<DocumentId>,
    /// Records in the store after the run.
    pub total_records: usize,
    /// Failures still outstanding after reconciliation.
    pub outstanding_failures: BTreeSet<DocumentId>,
    pub ledger_path: PathBuf,
    pub export_path: PathBuf,
}

/// Drives extraction over a document list.
pub struct BatchRunner<'a> {
    extractor: RecordExtractor<'a>,
    exporter: CsvExporter,
}

impl<'a> BatchRunner<'a> {
    pub fn new(extractor: RecordExtractor<'a>, exporter: CsvExporter) -> Self {
        Self {
            extractor,
            exporter,
        }
    }

    /// Handle a single document.
    ///
    /// Only a failure to persist state is an error; extraction failures are
    /// recorded in `ctx` and reported as [`DocumentOutcome::Failed`].
    pub async fn process_document(
        &self,
        ctx: &mut RunContext,
        id: DocumentId,
    ) -> Result<DocumentOutcome, PipelineError> {
        if ctx.is_processed(&id) {
            info!("{} already processed, skipping", id);
            ctx.skipped += 1;
            return Ok(DocumentOutcome::Skipped);
        }

        match self.extractor.extract_record(&id).await {
            Ok(record) => {
                ctx.record_success(record)?;
                Ok(DocumentOutcome::Extracted)
            }
            Err(failure) => {
                ctx.record_failure(id);
                Ok(DocumentOutcome::Failed(failure))
            }
        }
    }

    /// Handle every document in order, strictly one at a time.
    pub async fn process<I>(&self, ctx: &mut RunContext, documents: I) -> Result<(), PipelineError>
    where
        I: IntoIterator<Item = DocumentId>,
    {
        info!("Extracting fields {}", self.extractor.fields());
        for id in documents {
            self.process_document(ctx, id).await?;
        }
        Ok(())
    }

    /// Reconcile the failure ledger and write the export.
    pub fn finish(&self, ctx: RunContext) -> Result<RunSummary, PipelineError> {
        let outstanding = ctx.ledger.update(ctx.prior_failed, &ctx.processed, &ctx.failed)?;
        self.exporter.export(&ctx.records, self.extractor.fields())?;

        Ok(RunSummary {
            extracted: ctx.extracted,
            skipped: ctx.skipped,
            total_records: ctx.records.len(),
            failed: ctx.failed,
            outstanding_failures: outstanding,
            ledger_path: ctx.ledger.path().to_path_buf(),
            export_path: self.exporter.path().to_path_buf(),
        })
    }

    /// Process all documents, then finish the run.
    pub async fn run<I>(
        &self,
        mut ctx: RunContext,
        documents: I,
    ) -> Result<RunSummary, PipelineError>
    where
        I: IntoIterator<Item = DocumentId>,
    {
        self.process(&mut ctx, documents).await?;
        self.finish(ctx)
    }
}
