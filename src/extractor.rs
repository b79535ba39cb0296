//! Turns one document into a validated [`Record`].
//!
//! Text comes from a [`DocumentText`] source, the prompt is the base
//! instruction prompt followed by that text, and the reply must be a JSON
//! object carrying every expected field. Anything else is an
//! [`ExtractFailure`]; nothing partial is ever returned.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::documents::DocumentId;
use crate::extraction::{DocumentText, ExtractionError};
use crate::llm::{GenerationRequest, LlmError, TextGenerator};
use crate::state::Record;

/// Ordered list of fields every record must carry.
///
/// Also defines the export column order after `filename`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedFields(Vec<String>);

/// Problems with an operator-supplied field list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldListError {
    #[error("field list is empty")]
    Empty,
    #[error("\"filename\" is reserved and cannot be requested as a field")]
    Reserved,
}

impl ExpectedFields {
    /// Parse a comma-separated list, trimming entries and dropping empty
    /// and repeated ones while keeping declaration order.
    pub fn parse(list: &str) -> Result<Self, FieldListError> {
        let mut fields: Vec<String> = Vec::new();
        for field in list.split(',').map(str::trim).filter(|f| !f.is_empty()) {
            if field == Record::FILENAME {
                return Err(FieldListError::Reserved);
            }
            if !fields.iter().any(|f| f == field) {
                fields.push(field.to_string());
            }
        }

        if fields.is_empty() {
            return Err(FieldListError::Empty);
        }
        Ok(Self(fields))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for ExpectedFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join(", "))
    }
}

/// Why a document produced no record. Always per-document and non-fatal.
#[derive(Debug, Error)]
pub enum ExtractFailure {
    #[error("text extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("generation failed: {0}")]
    Generation(#[from] LlmError),

    #[error("reply is not a JSON object: {reason}")]
    Parse { reason: String, raw: String },

    #[error("reply is missing fields: {}", .missing.join(", "))]
    MissingFields { missing: Vec<String>, raw: String },
}

impl ExtractFailure {
    /// Raw generation reply, when one was received.
    pub fn raw_reply(&self) -> Option<&str> {
        match self {
            ExtractFailure::Parse { raw, .. } | ExtractFailure::MissingFields { raw, .. } => {
                Some(raw)
            }
            _ => None,
        }
    }
}

/// Remove code-fence markers that generation services wrap JSON in.
pub fn strip_code_fences(reply: &str) -> String {
    reply.replace("```json", "").replace("```", "")
}

/// Parse a raw reply into a JSON object.
pub fn parse_reply(raw: &str) -> Result<Map<String, Value>, ExtractFailure> {
    let cleaned = strip_code_fences(raw);
    match serde_json::from_str::<Value>(&cleaned) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ExtractFailure::Parse {
            reason: format!("expected an object, got {}", json_kind(&other)),
            raw: raw.to_string(),
        }),
        Err(e) => Err(ExtractFailure::Parse {
            reason: e.to_string(),
            raw: raw.to_string(),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Check a parsed reply against the expected fields and build the record.
///
/// Keys outside the expected set are dropped; values are kept verbatim.
pub fn validate_reply(
    id: &DocumentId,
    mut reply: Map<String, Value>,
    fields: &ExpectedFields,
    raw: &str,
) -> Result<Record, ExtractFailure> {
    let missing: Vec<String> = fields
        .iter()
        .filter(|f| !reply.contains_key(*f))
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(ExtractFailure::MissingFields {
            missing,
            raw: raw.to_string(),
        });
    }

    let mut selected = Map::new();
    for field in fields.iter() {
        if let Some(value) = reply.remove(field) {
            selected.insert(field.to_string(), value);
        }
    }
    Ok(Record::new(id, selected))
}

/// Per-document extraction: text, prompt, generation, parse, validate.
pub struct RecordExtractor<'a> {
    text: &'a dyn DocumentText,
    generator: &'a dyn TextGenerator,
    base_prompt: String,
    fields: ExpectedFields,
    model: String,
}

impl<'a> RecordExtractor<'a> {
    pub fn new(
        text: &'a dyn DocumentText,
        generator: &'a dyn TextGenerator,
        base_prompt: String,
        fields: ExpectedFields,
        model: String,
    ) -> Self {
        Self {
            text,
            generator,
            base_prompt,
            fields,
            model,
        }
    }

    pub fn fields(&self) -> &ExpectedFields {
        &self.fields
    }

    /// Produce a record for `id`, or report why it could not be produced.
    ///
    /// Makes a single attempt; the caller decides what a failure means.
    pub async fn extract_record(&self, id: &DocumentId) -> Result<Record, ExtractFailure> {
        info!("Processing {}", id);

        let result = self.try_extract(id).await;
        if let Err(ref failure) = result {
            match failure {
                ExtractFailure::MissingFields { missing, raw } => {
                    for field in missing {
                        warn!("Missing key {} in reply for {}", field, id);
                    }
                    warn!("LLM reply: {}", raw);
                }
                ExtractFailure::Parse { reason, raw } => {
                    warn!("Failed to load LLM output for {} as JSON: {}", id, reason);
                    warn!("LLM reply: {}", raw);
                }
                other => warn!("Failed to process {}: {}", id, other),
            }
        }
        result
    }

    async fn try_extract(&self, id: &DocumentId) -> Result<Record, ExtractFailure> {
        let text = self.text.extract_text(id.as_path()).await?;

        let mut prompt = String::with_capacity(self.base_prompt.len() + text.len());
        prompt.push_str(&self.base_prompt);
        prompt.push_str(&text);

        let request = GenerationRequest::deterministic(prompt, self.model.as_str());
        let raw = self.generator.generate(&request).await?;

        let reply = parse_reply(&raw)?;
        validate_reply(id, reply, &self.fields, &raw)
    }
}
