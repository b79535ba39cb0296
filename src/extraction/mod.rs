//! Document-to-text conversion.
//!
//! The batch pipeline only needs `path -> text`; [`DocumentText`] is that seam.
//! [`TextExtractor`] is the production implementation, backed by:
//! - pdftotext (Poppler) for PDF text layers
//! - Tesseract OCR for scanned PDFs and image files
//! - direct reads for plain text formats

mod extractor;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

pub use extractor::{ExtractionMethod, ExtractionResult, TextExtractor};

/// Errors that can occur during text extraction.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("External tool not found: {0}")]
    ToolNotFound(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Anything that can turn a document on disk into text.
#[async_trait]
pub trait DocumentText: Send + Sync {
    async fn extract_text(&self, path: &Path) -> Result<String, ExtractionError>;
}
