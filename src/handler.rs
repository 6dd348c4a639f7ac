//! The request handler: one job in, one [`ConversionResult`] out.
//!
//! ```text
//! job JSON
//!  │
//!  ├─ 1. Validate    input.pdf_base64 / backend / parse_method   (no workspace yet)
//!  ├─ 2. Workspace   {root}/mineru-job-XXXX/{input.pdf, output/}
//!  ├─ 3. Decode      base64 → input.pdf
//!  ├─ 4. Engine      Converter::convert (CLI or in-process)
//!  ├─ 5. Discover    sorted *.md under output/
//!  ├─ 6. Assemble    markdown + pages + output_files
//!  └─ 7. Cleanup     workspace removed on every path
//! ```
//!
//! [`Handler::handle`] never returns an error and never panics outward:
//! every failure, including a panic in one of the stages, becomes an
//! error-shaped result. Handlers share nothing between invocations except
//! the read-only configuration and converter, so one failed job cannot
//! affect the next.

use crate::config::WorkerConfig;
use crate::error::{Diagnostics, WorkerError};
use crate::output::{tail_chars, ConversionResult, ConversionSuccess};
use crate::pipeline::discover;
use crate::pipeline::engine::{create_converter, Converter, EngineError, EngineRequest};
use crate::pipeline::input::{self, JobInput};
use crate::pipeline::workspace::Workspace;
use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Drives one conversion per call to [`handle`](Self::handle).
///
/// Cheap to clone; clones share configuration and converter.
#[derive(Clone)]
pub struct Handler {
    config: Arc<WorkerConfig>,
    converter: Arc<dyn Converter>,
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("config", &self.config)
            .field("converter", &self.converter.name())
            .finish()
    }
}

impl Handler {
    /// Build a handler with the converter selected by `config.engine`.
    pub fn new(config: WorkerConfig) -> Self {
        let converter = create_converter(&config);
        Self::with_converter(config, converter)
    }

    /// Build a handler around an explicit converter.
    pub fn with_converter(config: WorkerConfig, converter: Arc<dyn Converter>) -> Self {
        Self {
            config: Arc::new(config),
            converter,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Handle one job envelope (`{"input": {...}}`).
    pub async fn handle(&self, job: &Value) -> ConversionResult {
        let start = Instant::now();

        match AssertUnwindSafe(self.process(job)).catch_unwind().await {
            Ok(Ok(success)) => {
                info!(
                    "Job converted: {} chars of markdown, {} file(s), {}ms",
                    success.markdown.chars().count(),
                    success.pages.unwrap_or(0),
                    start.elapsed().as_millis()
                );
                ConversionResult::Success(success)
            }
            Ok(Err(err)) => {
                if err.is_validation() {
                    info!("Job rejected: {}", err);
                } else {
                    warn!("Job failed after {}ms: {}", start.elapsed().as_millis(), err);
                }
                err.into()
            }
            Err(panic) => {
                error!("Job handler panicked: {}", panic_message(panic.as_ref()));
                WorkerError::Internal("unexpected fault while handling job".into()).into()
            }
        }
    }

    async fn process(&self, job: &Value) -> Result<ConversionSuccess, WorkerError> {
        let input = input::parse_job(job, &self.config)?;

        let workspace = Workspace::create(&self.config.workspace_root)?;
        let result = self.run_in(&workspace, &input).await;
        workspace.close();
        result
    }

    async fn run_in(
        &self,
        workspace: &Workspace,
        input: &JobInput,
    ) -> Result<ConversionSuccess, WorkerError> {
        let pdf = input::decode_pdf(&input.pdf_base64)?;
        workspace.write_input(&pdf).await?;
        info!(
            "Materialised {} byte PDF in {}",
            pdf.len(),
            workspace.path().display()
        );

        let output_dir = workspace.output_dir();
        let request = EngineRequest {
            pdf_path: workspace.input_path(),
            output_dir,
            backend: input.backend,
            parse_method: input.parse_method,
            lang: input.lang.as_deref(),
        };

        let report = match self.converter.convert(request).await {
            Ok(report) => report,
            Err(e) => return Err(self.engine_failure(e, output_dir)),
        };

        let files = discover::list_output_files(output_dir);
        let markdown_files = discover::markdown_files(&files);
        let Some(canonical) = markdown_files.first().copied() else {
            return Err(WorkerError::NoMarkdown {
                diagnostics: self.diagnostics(Some(&report.log), files),
            });
        };
        if markdown_files.len() > 1 {
            info!(
                "{} markdown files produced, using {}",
                markdown_files.len(),
                canonical
            );
        }

        let markdown = tokio::fs::read_to_string(output_dir.join(canonical))
            .await
            .map_err(|source| WorkerError::ReadOutput {
                path: canonical.to_string(),
                source,
            })?;

        let pages = markdown_files.len();
        Ok(ConversionSuccess {
            markdown,
            pages: Some(pages),
            output_files: self.config.list_output_files.then_some(files),
        })
    }

    fn engine_failure(&self, err: EngineError, output_dir: &Path) -> WorkerError {
        let files = discover::list_output_files(output_dir);
        let engine = self.converter.name().to_string();
        match err {
            EngineError::Spawn { program, source } => WorkerError::EngineSpawn {
                program,
                source,
                diagnostics: self.diagnostics(None, files),
            },
            EngineError::Exit {
                code: Some(code),
                log,
            } => WorkerError::EngineExit {
                engine,
                code,
                diagnostics: self.diagnostics(Some(&log), files),
            },
            EngineError::Exit { code: None, log } => WorkerError::EngineKilled {
                engine,
                diagnostics: self.diagnostics(Some(&log), files),
            },
            EngineError::Fault { message, log } => WorkerError::EngineFault {
                engine,
                message,
                diagnostics: self.diagnostics(Some(&log), files),
            },
        }
    }

    fn diagnostics(&self, log: Option<&str>, output_files: Vec<String>) -> Diagnostics {
        Diagnostics {
            stderr: log.map(|l| tail_chars(l, self.config.stderr_tail_chars).to_string()),
            output_files,
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
