//! Versioned JSON Documents
//!
//! A worker writes exactly one run document to stdout; the parent writes one
//! results document:
//!
//! ```text
//! {"run_result": {"version": 1, "loops": 1000, "warmups": [...], "samples": [...]}}
//! {"results": {"version": 1, "name": "...", "metadata": {...}, "runs": [<run body>, ...]}}
//! ```
//!
//! `loops`, `inner_loops`, `name` and a run's `metadata` are omitted when unset.

use crate::messages::{Benchmark, ModelError, RunResult};
use crate::metadata::Metadata;
use crate::{FORMAT_VERSION, RESULTS_KEY, RUN_RESULT_KEY};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Write;
use thiserror::Error;

/// Errors that can occur while reading or writing a document
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The top-level wrapper key is absent
    #[error("document doesn't contain {0:?}")]
    MissingField(&'static str),

    /// The body's `version` is not [`FORMAT_VERSION`]
    #[error("version {0} not supported")]
    UnsupportedVersion(String),

    /// Valid JSON that violates the document layout or the model invariants
    #[error("malformed document: {0}")]
    Malformed(String),

    /// Text that is not JSON at all
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Writing the document failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ModelError> for DocumentError {
    fn from(e: ModelError) -> Self {
        DocumentError::Malformed(e.to_string())
    }
}

fn is_empty_metadata(metadata: &&Metadata) -> bool {
    metadata.is_empty()
}

#[derive(Serialize)]
struct RunBodyOut<'a> {
    version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    loops: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inner_loops: Option<u64>,
    warmups: &'a [f64],
    samples: &'a [f64],
    #[serde(skip_serializing_if = "is_empty_metadata")]
    metadata: &'a Metadata,
}

impl<'a> From<&'a RunResult> for RunBodyOut<'a> {
    fn from(run: &'a RunResult) -> Self {
        Self {
            version: FORMAT_VERSION,
            loops: run.loops(),
            inner_loops: run.inner_loops(),
            warmups: run.warmups(),
            samples: run.samples(),
            metadata: run.metadata(),
        }
    }
}

#[derive(Serialize)]
struct ResultsBodyOut<'a> {
    version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    metadata: &'a Metadata,
    runs: Vec<RunBodyOut<'a>>,
}

#[derive(Serialize)]
struct RunDocumentOut<'a> {
    run_result: RunBodyOut<'a>,
}

#[derive(Serialize)]
struct ResultsDocumentOut<'a> {
    results: ResultsBodyOut<'a>,
}

#[derive(Deserialize)]
struct RunBodyIn {
    #[serde(default)]
    loops: Option<u64>,
    #[serde(default)]
    inner_loops: Option<u64>,
    warmups: Vec<f64>,
    samples: Vec<f64>,
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Deserialize)]
struct ResultsBodyIn {
    #[serde(default)]
    name: Option<String>,
    metadata: Metadata,
    runs: Vec<Value>,
}

/// Take the body stored under `key` out of a parsed document
fn unwrap_body(document: Value, key: &'static str) -> Result<Value, DocumentError> {
    match document {
        Value::Object(mut map) => map.remove(key).ok_or(DocumentError::MissingField(key)),
        other => Err(DocumentError::Malformed(format!(
            "expected a JSON object, got {}",
            json_type(&other)
        ))),
    }
}

fn check_version(body: &Value) -> Result<(), DocumentError> {
    match body.get("version") {
        Some(version) if version.as_u64() == Some(FORMAT_VERSION) => Ok(()),
        Some(version) => Err(DocumentError::UnsupportedVersion(version.to_string())),
        None => Err(DocumentError::UnsupportedVersion("null".to_string())),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Layout errors in an already parsed document
fn malformed(e: serde_json::Error) -> DocumentError {
    DocumentError::Malformed(e.to_string())
}

fn decode_run_body(body: Value) -> Result<RunResult, DocumentError> {
    check_version(&body)?;
    let body: RunBodyIn = serde_json::from_value(body).map_err(malformed)?;
    let run = RunResult::from_parts(body.loops, body.warmups, body.samples)?
        .with_inner_loops(body.inner_loops)?
        .with_metadata(body.metadata);
    Ok(run)
}

impl RunResult {
    /// Serialize as a `run_result` document
    pub fn to_json(&self) -> Result<String, DocumentError> {
        let document = RunDocumentOut {
            run_result: RunBodyOut::from(self),
        };
        Ok(serde_json::to_string(&document)?)
    }

    /// Parse a `run_result` document
    pub fn from_json(text: &str) -> Result<Self, DocumentError> {
        let document: Value = serde_json::from_str(text)?;
        decode_run_body(unwrap_body(document, RUN_RESULT_KEY)?)
    }

    /// Write a `run_result` document followed by a newline, then flush
    pub fn write_json<W: Write>(&self, mut writer: W) -> Result<(), DocumentError> {
        writer.write_all(self.to_json()?.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

impl Benchmark {
    /// Serialize as a `results` document
    pub fn to_json(&self) -> Result<String, DocumentError> {
        let body = ResultsBodyOut {
            version: FORMAT_VERSION,
            name: self.name(),
            metadata: self.metadata(),
            runs: self.runs().iter().map(RunBodyOut::from).collect(),
        };
        Ok(serde_json::to_string(&ResultsDocumentOut { results: body })?)
    }

    /// Parse a `results` document
    pub fn from_json(text: &str) -> Result<Self, DocumentError> {
        let document: Value = serde_json::from_str(text)?;
        let body = unwrap_body(document, RESULTS_KEY)?;
        check_version(&body)?;
        let body: ResultsBodyIn = serde_json::from_value(body).map_err(malformed)?;

        let runs = body
            .runs
            .into_iter()
            .map(decode_run_body)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Benchmark::from_parts(body.name, body.metadata, runs))
    }

    /// Write a `results` document followed by a newline, then flush
    pub fn write_json<W: Write>(&self, mut writer: W) -> Result<(), DocumentError> {
        writer.write_all(self.to_json()?.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}
