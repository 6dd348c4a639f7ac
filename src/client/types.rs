//! Wire types of the hosting platform's job API.

use crate::config::{Backend, ParseMethod};
use crate::error::ClientError;
use crate::output::ConversionResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Job lifecycle as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Submitted,
    InQueue,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    TimedOut,
    /// Anything this client does not know about. Treated as still running.
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Submitted => "SUBMITTED",
            JobStatus::InQueue => "IN_QUEUE",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
            JobStatus::TimedOut => "TIMED_OUT",
            JobStatus::Unknown => "UNKNOWN",
        }
    }

    /// No further status changes will happen.
    pub fn is_terminal(&self) -> bool {
        self.is_failure() || *self == JobStatus::Completed
    }

    /// Terminal and unsuccessful.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            JobStatus::Failed | JobStatus::Cancelled | JobStatus::TimedOut
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the client submits as `input`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobPayload {
    pub pdf_base64: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<Backend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_method: Option<ParseMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
}

impl JobPayload {
    pub fn new(pdf_base64: impl Into<String>) -> Self {
        Self {
            pdf_base64: pdf_base64.into(),
            backend: None,
            parse_method: None,
            lang: None,
        }
    }
}

/// Request body: `{"input": {...}}`.
#[derive(Debug, Serialize)]
pub(crate) struct JobRequest<'a> {
    pub input: &'a JobPayload,
}

/// Response envelope shared by `/run`, `/runsync` and `/status`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEnvelope {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<JobStatus>,
    /// The handler's result, once the job completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// Platform-level error (the worker crashed, timed out, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<u64>,
    /// Any other top-level keys. Holds the handler's result when the
    /// platform returns it unwrapped.
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl JobEnvelope {
    /// Unwrap the handler's [`ConversionResult`] from `output`.
    ///
    /// With no `output`, the body itself is read as the result; failing
    /// that, a platform `error` becomes an error payload.
    pub fn result(&self) -> Result<ConversionResult, ClientError> {
        if let Some(output) = &self.output {
            return serde_json::from_value(output.clone())
                .map_err(|_| ClientError::UnexpectedOutput(truncate(&output.to_string(), 200)));
        }

        let mut body = self.rest.clone();
        if let Some(error) = &self.error {
            body.insert("error".to_string(), error.clone());
        }
        if let Ok(result) = serde_json::from_value(Value::Object(body)) {
            return Ok(result);
        }

        match &self.error {
            Some(error) => Ok(ConversionResult::error(value_text(error))),
            None => Err(ClientError::MissingOutput {
                job_id: self.id.clone().unwrap_or_default(),
            }),
        }
    }

    /// Best available explanation of a failed job.
    pub fn describe(&self) -> String {
        if let Some(error) = &self.error {
            return value_text(error);
        }
        if let Some(output) = &self.output {
            return truncate(&output.to_string(), 500);
        }
        "no details reported".to_string()
    }
}

fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push('…');
    out
}
