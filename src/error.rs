//! Error types for the mineru-worker library.
//!
//! Two error types for two sides of the wire:
//!
//! * [`WorkerError`] — everything that can go wrong while handling one job.
//!   It never escapes [`crate::handler::Handler::handle`]; instead it is
//!   converted into the error-shaped [`crate::output::ConversionResult`],
//!   carrying whatever [`Diagnostics`] the failing stage collected.
//!
//! * [`ClientError`] — failures of the submission client (transport,
//!   non-2xx responses, terminal job failures). These abort the client.

use crate::client::JobStatus;
use std::path::PathBuf;
use thiserror::Error;

/// Diagnostic bundle attached to engine and output failures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    /// Tail of the engine's captured diagnostic text, already bounded.
    pub stderr: Option<String>,
    /// Files present under the output directory when the failure was seen.
    pub output_files: Vec<String>,
}

/// All errors produced while handling a single job.
#[derive(Debug, Error)]
pub enum WorkerError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// `input.pdf_base64` is missing, null, empty, or the container is not an object.
    #[error("Missing required field: pdf_base64")]
    MissingPdf,

    /// The request (or configuration) named a backend the engine does not have.
    #[error("Unsupported backend: {0}")]
    UnsupportedBackend(String),

    /// The request (or configuration) named an unknown parse method.
    #[error("Unsupported parse method: {0}")]
    UnsupportedParseMethod(String),

    // ── Input errors ──────────────────────────────────────────────────────
    /// `pdf_base64` is not valid base64.
    #[error("Invalid base64 in pdf_base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    /// The payload decoded fine but is not a PDF.
    #[error("Decoded payload is not a PDF (first bytes: {magic:?})")]
    NotAPdf { magic: Vec<u8> },

    /// Scratch directory could not be created or written.
    #[error("Failed to prepare workspace under '{path}': {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// The engine command could not be started at all.
    #[error("Failed to start conversion engine '{program}': {source}")]
    EngineSpawn {
        program: String,
        #[source]
        source: std::io::Error,
        diagnostics: Diagnostics,
    },

    /// The engine ran and exited non-zero.
    #[error("{engine} exited with code {code}")]
    EngineExit {
        engine: String,
        code: i32,
        diagnostics: Diagnostics,
    },

    /// The engine was killed by a signal before it could exit.
    #[error("{engine} was terminated by a signal")]
    EngineKilled {
        engine: String,
        diagnostics: Diagnostics,
    },

    /// The in-process engine raised a fault.
    #[error("{engine} failed: {message}")]
    EngineFault {
        engine: String,
        message: String,
        diagnostics: Diagnostics,
    },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The engine succeeded but wrote no Markdown file.
    #[error("No markdown output produced")]
    NoMarkdown { diagnostics: Diagnostics },

    /// The canonical Markdown file exists but could not be read as UTF-8.
    #[error("Failed to read markdown output '{path}': {source}")]
    ReadOutput {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Configuration validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal fault.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorkerError {
    /// Diagnostics carried by this error, if the failing stage collected any.
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            WorkerError::EngineSpawn { diagnostics, .. }
            | WorkerError::EngineExit { diagnostics, .. }
            | WorkerError::EngineKilled { diagnostics, .. }
            | WorkerError::EngineFault { diagnostics, .. }
            | WorkerError::NoMarkdown { diagnostics } => Some(diagnostics),
            _ => None,
        }
    }

    /// True for errors detected before any workspace is acquired.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            WorkerError::MissingPdf
                | WorkerError::UnsupportedBackend(_)
                | WorkerError::UnsupportedParseMethod(_)
        )
    }
}

/// All errors returned by the submission client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Client configuration is incomplete or invalid.
    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),

    /// Network-level failure (connect, timeout, body decode).
    #[error("HTTP request to '{url}' failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The platform answered with a non-2xx status.
    #[error("'{url}' returned HTTP {status}: {body}")]
    Status { url: String, status: u16, body: String },

    /// `/run` answered without a job id.
    #[error("Submission response did not contain a job id")]
    MissingJobId,

    /// The job reached FAILED, CANCELLED or TIMED_OUT.
    #[error("Job {job_id} {status}: {detail}")]
    JobFailed {
        job_id: String,
        status: JobStatus,
        detail: String,
    },

    /// A completed job carried no worker output.
    #[error("Job {job_id} completed without output")]
    MissingOutput { job_id: String },

    /// The worker output did not match either result shape.
    #[error("Unrecognised worker output: {0}")]
    UnexpectedOutput(String),

    /// Reading the PDF or saving the Markdown failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_pdf_message_is_stable() {
        assert_eq!(
            WorkerError::MissingPdf.to_string(),
            "Missing required field: pdf_base64"
        );
        assert!(WorkerError::MissingPdf.is_validation());
    }

    #[test]
    fn engine_exit_display_names_code() {
        let e = WorkerError::EngineExit {
            engine: "mineru".into(),
            code: 2,
            diagnostics: Diagnostics::default(),
        };
        assert_eq!(e.to_string(), "mineru exited with code 2");
        assert!(e.diagnostics().is_some());
        assert!(!e.is_validation());
    }

    #[test]
    fn decode_error_has_no_diagnostics() {
        let e = WorkerError::NotAPdf {
            magic: b"GIF8".to_vec(),
        };
        assert!(e.diagnostics().is_none());
        assert!(e.to_string().contains("not a PDF"));
    }

    #[test]
    fn job_failed_display() {
        let e = ClientError::JobFailed {
            job_id: "abc".into(),
            status: JobStatus::Failed,
            detail: "worker crashed".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("abc"), "got: {msg}");
        assert!(msg.contains("FAILED"), "got: {msg}");
        assert!(msg.contains("worker crashed"), "got: {msg}");
    }
}
