//! The handler's response shapes.
//!
//! A job produces exactly one of two JSON objects:
//!
//! ```text
//! { "markdown": "...", "pages": 1, "output_files": ["input/auto/input.md"] }
//! { "error": "...", "stderr": "...", "output_files": [] }
//! ```
//!
//! [`ConversionResult`] is an untagged enum over the two, so it is
//! structurally impossible to emit both `markdown` and `error`.

use crate::error::WorkerError;
use serde::{Deserialize, Serialize};

/// Success payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionSuccess {
    /// Contents of the canonical Markdown file.
    pub markdown: String,

    /// Number of Markdown files the engine produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<usize>,

    /// Every file under the output directory, relative, `/`-separated, sorted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_files: Option<Vec<String>>,
}

/// Error payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionFailure {
    /// Human-readable message.
    pub error: String,

    /// Tail of the engine's diagnostic output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,

    /// Files present in the output directory at failure time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_files: Option<Vec<String>>,
}

/// Result of one job: exactly one of the two payload shapes.
///
/// `Failure` is listed first so that deserialising an object carrying an
/// `error` key always yields `Failure`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConversionResult {
    Failure(ConversionFailure),
    Success(ConversionSuccess),
}

impl ConversionResult {
    /// An error payload with only a message.
    pub fn error(message: impl Into<String>) -> Self {
        ConversionResult::Failure(ConversionFailure {
            error: message.into(),
            stderr: None,
            output_files: None,
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ConversionResult::Success(_))
    }

    pub fn markdown(&self) -> Option<&str> {
        match self {
            ConversionResult::Success(s) => Some(&s.markdown),
            ConversionResult::Failure(_) => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ConversionResult::Failure(f) => Some(&f.error),
            ConversionResult::Success(_) => None,
        }
    }

    /// Serialise to a JSON value. Both shapes are plain structs of strings
    /// and numbers, so this cannot fail.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({ "error": format!("Failed to serialise result: {e}") })
        })
    }
}

impl From<WorkerError> for ConversionResult {
    fn from(err: WorkerError) -> Self {
        let error = err.to_string();
        match err.diagnostics() {
            Some(d) => ConversionResult::Failure(ConversionFailure {
                error,
                stderr: d.stderr.clone(),
                output_files: Some(d.output_files.clone()),
            }),
            None => ConversionResult::error(error),
        }
    }
}

/// Keep at most the last `max_chars` characters of `text`.
///
/// Counts Unicode scalar values, never splits a character.
pub fn tail_chars(text: &str, max_chars: usize) -> &str {
    let total = text.chars().count();
    if total <= max_chars {
        return text;
    }
    let skip = total - max_chars;
    text.char_indices()
        .nth(skip)
        .map(|(idx, _)| &text[idx..])
        .unwrap_or("")
}
