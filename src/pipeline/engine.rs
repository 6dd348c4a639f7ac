//! The converter seam and the out-of-process adapter.
//!
//! A [`Converter`] turns `(pdf, output_dir, options)` into files under
//! `output_dir` plus captured diagnostic text. Two adapters exist:
//!
//! * [`CliConverter`] runs the engine as an external command (primary);
//! * [`crate::pipeline::native::InProcessConverter`] converts in-process.
//!
//! Which one a worker uses is decided once, from configuration, by
//! [`create_converter`]. The handler never cares which it got.
//!
//! The engine call is the only long-running step of a job. There is no
//! timeout and no progress reporting: once started, the engine runs to
//! completion or failure.

use crate::config::{Backend, EngineKind, ParseMethod, WorkerConfig};
use crate::pipeline::native::InProcessConverter;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info};

/// Everything a converter needs for one document.
#[derive(Debug, Clone, Copy)]
pub struct EngineRequest<'a> {
    pub pdf_path: &'a Path,
    pub output_dir: &'a Path,
    pub backend: Backend,
    pub parse_method: ParseMethod,
    pub lang: Option<&'a str>,
}

/// What a successful engine run leaves behind besides its files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineReport {
    /// Captured diagnostic text (unbounded; the handler trims it).
    pub log: String,
}

/// Why an engine run failed.
#[derive(Debug)]
pub enum EngineError {
    /// The process could not be started.
    Spawn {
        program: String,
        source: std::io::Error,
    },
    /// The process exited; `code` is `None` when a signal killed it.
    Exit { code: Option<i32>, log: String },
    /// The in-process engine raised a fault.
    Fault { message: String, log: String },
}

/// PDF-to-Markdown conversion capability.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Short name used in error messages (`"mineru exited with code 2"`).
    fn name(&self) -> &str;

    /// Convert `request.pdf_path`, writing results under `request.output_dir`.
    async fn convert(&self, request: EngineRequest<'_>) -> Result<EngineReport, EngineError>;
}

/// Create the converter selected by configuration.
///
/// This is the single point where config turns into an adapter instance.
pub fn create_converter(config: &WorkerConfig) -> Arc<dyn Converter> {
    match config.engine {
        EngineKind::Cli => Arc::new(CliConverter::new(config.engine_command.clone())),
        EngineKind::InProcess => Arc::new(InProcessConverter::new()),
    }
}

/// Runs the engine as a child process:
///
/// ```text
/// <command...> -p <pdf> -o <output_dir> -b <backend> -m <method> [-l <lang>]
/// ```
#[derive(Debug, Clone)]
pub struct CliConverter {
    program: String,
    leading_args: Vec<String>,
    name: String,
}

impl CliConverter {
    /// `command[0]` is the program, the rest are passed before the engine flags.
    pub fn new(command: Vec<String>) -> Self {
        let mut parts = command.into_iter();
        let program = parts
            .next()
            .unwrap_or_else(|| crate::config::DEFAULT_ENGINE_COMMAND.to_string());
        let leading_args: Vec<String> = parts.collect();
        let name = engine_name(&program, &leading_args);
        Self {
            program,
            leading_args,
            name,
        }
    }

    /// Full argument vector (excluding the program) for `request`.
    pub fn args(&self, request: &EngineRequest<'_>) -> Vec<String> {
        let mut args = self.leading_args.clone();
        args.extend([
            "-p".to_string(),
            request.pdf_path.display().to_string(),
            "-o".to_string(),
            request.output_dir.display().to_string(),
            "-b".to_string(),
            request.backend.as_str().to_string(),
            "-m".to_string(),
            request.parse_method.as_str().to_string(),
        ]);
        if let Some(lang) = request.lang {
            args.extend(["-l".to_string(), lang.to_string()]);
        }
        args
    }
}

#[async_trait]
impl Converter for CliConverter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn convert(&self, request: EngineRequest<'_>) -> Result<EngineReport, EngineError> {
        let args = self.args(&request);
        info!(
            "Running {} (backend={}, method={})",
            self.name, request.backend, request.parse_method
        );
        debug!("Engine command: {} {:?}", self.program, args);

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| EngineError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let log = pick_log(&output.stdout, &output.stderr);
        if output.status.success() {
            debug!("{} finished successfully", self.name);
            Ok(EngineReport { log })
        } else {
            Err(EngineError::Exit {
                code: output.status.code(),
                log,
            })
        }
    }
}

/// Name used in error messages: the module behind `<interpreter> -m <module>`
/// (first dotted segment), otherwise the program's basename.
fn engine_name(program: &str, leading_args: &[String]) -> String {
    let module = leading_args
        .windows(2)
        .find(|w| w[0] == "-m")
        .and_then(|w| w[1].split('.').next())
        .filter(|m| !m.is_empty());
    if let Some(module) = module {
        return module.to_string();
    }
    Path::new(program)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.to_string())
}

/// The engine logs to stderr; fall back to stdout when stderr is silent.
fn pick_log(stdout: &[u8], stderr: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    if !stderr.trim().is_empty() {
        return stderr.into_owned();
    }
    String::from_utf8_lossy(stdout).into_owned()
}
