//! CSV export of accumulated records.

use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::extractor::ExpectedFields;
use crate::state::{write_atomic, Record};

/// Default export file name, relative to the working directory.
pub const DEFAULT_EXPORT_FILE: &str = "all.csv";

#[derive(Debug, Error)]
pub enum ExportError {
    /// A record lacks a declared column. Extraction validates every field,
    /// so this means state was produced with a different field list or
    /// edited by hand.
    #[error("record {filename} has no value for field \"{field}\"")]
    MissingField { filename: String, field: String },

    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Writes records as CSV with `filename` followed by the expected fields.
#[derive(Debug, Clone)]
pub struct CsvExporter {
    path: PathBuf,
}

impl CsvExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Render and write the export, replacing any previous file.
    ///
    /// Nothing is written if any record violates the column contract.
    pub fn export(&self, records: &[Record], fields: &ExpectedFields) -> Result<(), ExportError> {
        let csv = render_csv(records, fields)?;
        write_atomic(&self.path, csv.as_bytes()).map_err(|source| ExportError::Io {
            path: self.path.clone(),
            source,
        })?;

        info!(
            "Exported {} records to {}",
            records.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Render records as CSV text.
///
/// The header is only emitted when there is at least one record, so an
/// empty record list renders as an empty string.
pub fn render_csv(records: &[Record], fields: &ExpectedFields) -> Result<String, ExportError> {
    let mut output = String::new();
    if records.is_empty() {
        return Ok(output);
    }

    let columns: Vec<&str> = std::iter::once(Record::FILENAME)
        .chain(fields.iter())
        .collect();
    push_row(&mut output, columns.iter().map(|c| escape_csv(c)));

    for record in records {
        let mut row = Vec::with_capacity(columns.len());
        for column in &columns {
            let value = record.get(column).ok_or_else(|| ExportError::MissingField {
                filename: record.filename().to_string(),
                field: column.to_string(),
            })?;
            row.push(escape_csv(&cell_text(value)));
        }
        push_row(&mut output, row.into_iter());
    }

    Ok(output)
}

fn push_row(output: &mut String, cells: impl Iterator<Item = String>) {
    let cells: Vec<String> = cells.collect();
    output.push_str(&cells.join(","));
    output.push_str("\r\n");
}

/// Text of a JSON value as it appears in a cell.
fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Escape a string for CSV output.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::DocumentId;
    use serde_json::json;
    use tempfile::tempdir;

    fn record(id: &str, fields: Value) -> Record {
        Record::new(&DocumentId::from(id), fields.as_object().unwrap().clone())
    }

    fn fields(list: &str) -> ExpectedFields {
        ExpectedFields::parse(list).unwrap()
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_csv("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_columns_follow_declared_order() {
        let records = vec![
            record("d/1.pdf", json!({"b": "x", "a": 1})),
            record("d/2.pdf", json!({"a": null, "b": ["p", "q"]})),
        ];

        let csv = render_csv(&records, &fields("b,a")).unwrap();

        assert_eq!(
            csv,
            "filename,b,a\r\nd/1.pdf,x,1\r\nd/2.pdf,\"[\"\"p\"\",\"\"q\"\"]\",\r\n"
        );
    }

    #[test]
    fn test_empty_records_write_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("all.csv");
        std::fs::write(&path, "stale").unwrap();

        CsvExporter::new(&path).export(&[], &fields("a,b")).unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"");
    }

    #[test]
    fn test_missing_field_fails_without_writing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("all.csv");
        let records = vec![record("d/1.pdf", json!({"a": 1}))];

        let err = CsvExporter::new(&path)
            .export(&records, &fields("a,b"))
            .unwrap_err();

        match err {
            ExportError::MissingField { filename, field } => {
                assert_eq!(filename, "d/1.pdf");
                assert_eq!(field, "b");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!path.exists());
    }
}
