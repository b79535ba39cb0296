//! End-to-end pipeline runs against a scripted generator.
//!
//! Text extraction and generation are replaced with in-process fakes so the
//! resume, persistence and export behavior can be checked on a temp dir.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};

use docextract::export::CsvExporter;
use docextract::extraction::{DocumentText, ExtractionError};
use docextract::llm::{GenerationRequest, LlmError, TextGenerator};
use docextract::{
    BatchRunner, DocumentId, DocumentScan, ExpectedFields, ExtractFailure, FailureLedger,
    RecordExtractor, RunContext, RunSummary, StateStore,
};

/// Uses the file contents as document text.
struct ReadFile;

#[async_trait]
impl DocumentText for ReadFile {
    async fn extract_text(&self, path: &Path) -> Result<String, ExtractionError> {
        Ok(tokio::fs::read_to_string(path).await?)
    }
}

/// Replies with the document text, i.e. the prompt minus the base prompt.
///
/// Each test document holds the exact reply the generator should produce,
/// so `doc2.pdf` containing `not json` yields a malformed reply.
struct EchoReply {
    calls: AtomicUsize,
    panic_after: Option<usize>,
    prompts: Mutex<Vec<String>>,
}

const PROMPT: &str = "Return the fields as JSON.\n";

impl EchoReply {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            panic_after: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn panicking_after(calls: usize) -> Self {
        Self {
            panic_after: Some(calls),
            ..Self::new()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for EchoReply {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_after == Some(n) {
            panic!("simulated crash");
        }
        self.prompts.lock().unwrap().push(request.prompt.clone());
        Ok(request
            .prompt
            .strip_prefix(PROMPT)
            .unwrap_or(&request.prompt)
            .to_string())
    }
}

struct Workspace {
    _tmp: TempDir,
    docs: PathBuf,
    export: PathBuf,
}

impl Workspace {
    fn new(docs: &[(&str, &str)]) -> Self {
        let tmp = tempdir().unwrap();
        let dir = tmp.path().join("docs");
        std::fs::create_dir(&dir).unwrap();
        for (name, reply) in docs {
            std::fs::write(dir.join(name), reply).unwrap();
        }
        let export = tmp.path().join("all.csv");
        Self {
            _tmp: tmp,
            docs: dir,
            export,
        }
    }

    fn doc(&self, name: &str) -> DocumentId {
        DocumentId::from_path(&self.docs.join(name))
    }

    fn documents(&self) -> Vec<DocumentId> {
        DocumentScan::new(&self.docs, "pdf")
            .documents()
            .unwrap()
            .collect()
    }

    fn state_json(&self) -> Value {
        let raw = std::fs::read_to_string(StateStore::in_dir(&self.docs).path()).unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    fn failed_json(&self) -> Vec<String> {
        let raw = std::fs::read_to_string(FailureLedger::in_dir(&self.docs).path()).unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    async fn run(&self, generator: &EchoReply, fields: &str) -> RunSummary {
        let extractor = RecordExtractor::new(
            &ReadFile,
            generator,
            PROMPT.to_string(),
            ExpectedFields::parse(fields).unwrap(),
            "test-model".to_string(),
        );
        let runner = BatchRunner::new(extractor, CsvExporter::new(&self.export));
        let ctx = RunContext::load_dir(&self.docs).unwrap();
        runner.run(ctx, self.documents()).await.unwrap()
    }
}

#[tokio::test]
async fn test_three_documents_one_malformed() {
    let ws = Workspace::new(&[
        ("doc1.pdf", r#"{"a": "x1", "b": "y1"}"#),
        ("doc2.pdf", "not json"),
        ("doc3.pdf", "```json\n{\"a\": \"x3\", \"b\": \"y3\"}\n```"),
        ("notes.txt", r#"{"a": "ignored", "b": "ignored"}"#),
    ]);
    let gen = EchoReply::new();

    let summary = ws.run(&gen, "a,b").await;

    assert_eq!(gen.calls(), 3);
    assert_eq!(summary.extracted, 2);
    assert_eq!(summary.failed, vec![ws.doc("doc2.pdf")]);
    assert_eq!(
        summary.outstanding_failures,
        BTreeSet::from([ws.doc("doc2.pdf")])
    );

    let doc1 = ws.doc("doc1.pdf").to_string();
    let doc3 = ws.doc("doc3.pdf").to_string();
    assert_eq!(
        ws.state_json(),
        json!([
            {"filename": doc1, "a": "x1", "b": "y1"},
            {"filename": doc3, "a": "x3", "b": "y3"},
        ])
    );
    assert_eq!(ws.failed_json(), vec![ws.doc("doc2.pdf").to_string()]);

    let csv = std::fs::read_to_string(&ws.export).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "filename,a,b");
    assert_eq!(lines[1], format!("{},x1,y1", doc1));
    assert_eq!(lines[2], format!("{},x3,y3", doc3));

    // Prompt is the base prompt immediately followed by the text
    let prompts = gen.prompts.lock().unwrap();
    assert_eq!(prompts[0], format!("{}{}", PROMPT, r#"{"a": "x1", "b": "y1"}"#));
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let ws = Workspace::new(&[
        ("doc1.pdf", r#"{"a": 1}"#),
        ("doc2.pdf", r#"{"a": 2}"#),
    ]);

    let first = EchoReply::new();
    ws.run(&first, "a").await;
    let state_after_first = ws.state_json();
    let csv_after_first = std::fs::read(&ws.export).unwrap();

    let second = EchoReply::new();
    let summary = ws.run(&second, "a").await;

    assert_eq!(second.calls(), 0);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.extracted, 0);
    assert_eq!(ws.state_json(), state_after_first);
    assert_eq!(std::fs::read(&ws.export).unwrap(), csv_after_first);
    assert!(ws.failed_json().is_empty());
}

#[tokio::test]
async fn test_crash_keeps_every_completed_record() {
    let ws = Workspace::new(&[
        ("doc1.pdf", r#"{"a": 1}"#),
        ("doc2.pdf", r#"{"a": 2}"#),
        ("doc3.pdf", r#"{"a": 3}"#),
    ]);

    // Dies during the third generation call
    let crashing = EchoReply::panicking_after(2);
    let outcome = std::panic::AssertUnwindSafe(ws.run(&crashing, "a"))
        .catch_unwind()
        .await;
    assert!(outcome.is_err());

    let state = ws.state_json();
    assert_eq!(state.as_array().unwrap().len(), 2);
    assert!(!ws.export.exists());

    // Restart resumes with only the unfinished document
    let resumed = EchoReply::new();
    let summary = ws.run(&resumed, "a").await;
    assert_eq!(resumed.calls(), 1);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.total_records, 3);
}

#[tokio::test]
async fn test_failure_ledger_reconciles_across_runs() {
    let ws = Workspace::new(&[
        ("A.pdf", "garbage"),
        ("B.pdf", "garbage"),
    ]);
    ws.run(&EchoReply::new(), "a").await;
    assert_eq!(
        ws.failed_json(),
        vec![ws.doc("A.pdf").to_string(), ws.doc("B.pdf").to_string()]
    );

    // A now succeeds, B still fails, C is new and fails
    std::fs::write(ws.docs.join("A.pdf"), r#"{"a": "ok"}"#).unwrap();
    std::fs::write(ws.docs.join("C.pdf"), "garbage").unwrap();
    let summary = ws.run(&EchoReply::new(), "a").await;

    let expected = BTreeSet::from([ws.doc("B.pdf"), ws.doc("C.pdf")]);
    assert_eq!(summary.outstanding_failures, expected);
    assert_eq!(
        ws.failed_json(),
        vec![ws.doc("B.pdf").to_string(), ws.doc("C.pdf").to_string()]
    );
}

#[tokio::test]
async fn test_missing_field_keeps_raw_reply() {
    let ws = Workspace::new(&[("doc1.pdf", r#"{"a": 1}"#)]);
    let gen = EchoReply::new();
    let extractor = RecordExtractor::new(
        &ReadFile,
        &gen,
        PROMPT.to_string(),
        ExpectedFields::parse("a,b,c").unwrap(),
        "test-model".to_string(),
    );

    let err = extractor
        .extract_record(&ws.doc("doc1.pdf"))
        .await
        .unwrap_err();
    match &err {
        ExtractFailure::MissingFields { missing, .. } => {
            assert_eq!(missing, &vec!["b".to_string(), "c".to_string()]);
        }
        other => panic!("unexpected failure: {other:?}"),
    }
    assert_eq!(err.raw_reply(), Some(r#"{"a": 1}"#));
}

#[tokio::test]
async fn test_all_failures_export_empty_file() {
    let ws = Workspace::new(&[("doc1.pdf", "[1, 2, 3]")]);
    let summary = ws.run(&EchoReply::new(), "a").await;

    assert_eq!(summary.total_records, 0);
    assert_eq!(std::fs::metadata(&ws.export).unwrap().len(), 0);
    assert!(!StateStore::in_dir(&ws.docs).path().exists());
}

#[tokio::test]
async fn test_reply_missing_a_field_is_never_persisted() {
    let ws = Workspace::new(&[
        ("doc1.pdf", r#"{"a": "only a"}"#),
        ("doc2.pdf", r#"{"a": "x2", "b": "y2"}"#),
    ]);

    let summary = ws.run(&EchoReply::new(), "a,b").await;

    assert_eq!(summary.failed, vec![ws.doc("doc1.pdf")]);
    assert_eq!(summary.total_records, 1);

    let doc1 = ws.doc("doc1.pdf").to_string();
    let state = ws.state_json();
    let filenames: Vec<&str> = state
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["filename"].as_str().unwrap())
        .collect();
    assert_eq!(filenames, vec![ws.doc("doc2.pdf").to_string()]);
    assert!(!filenames.contains(&doc1.as_str()));
    assert_eq!(ws.failed_json(), vec![doc1]);
}
