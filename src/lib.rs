//! docextract - resumable field extraction from document directories.
//!
//! Walks a directory of documents, turns each one into text, asks a
//! text-generation service for a JSON record of operator-declared fields,
//! and accumulates validated records into durable state and a CSV export.
//! Runs are resumable: documents with a persisted record are never
//! re-processed, and state is rewritten after every success.

pub mod cli;
pub mod config;
pub mod documents;
pub mod export;
pub mod extraction;
pub mod extractor;
pub mod llm;
pub mod pipeline;
pub mod state;

pub use documents::{DocumentId, DocumentScan};
pub use extractor::{ExpectedFields, ExtractFailure, RecordExtractor};
pub use pipeline::{BatchRunner, RunContext, RunSummary};
pub use state::{FailureLedger, Record, StateError, StateStore};
