//! Configuration types for the request handler.
//!
//! Everything the handler needs to know about its environment lives in
//! [`WorkerConfig`]. It is read once at process start (see
//! [`WorkerConfig::from_env`]) and then passed by reference into every
//! invocation, so no request ever re-reads the environment.
//!
//! The engine's operating modes ([`Backend`], [`ParseMethod`]) are closed
//! enums: a request naming an unknown mode is rejected during validation
//! instead of being forwarded verbatim to the engine's command line.

use crate::error::WorkerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default cap, in characters, on diagnostic text returned to the caller.
pub const DEFAULT_STDERR_TAIL_CHARS: usize = 2000;

/// Default engine command line (program only).
pub const DEFAULT_ENGINE_COMMAND: &str = "mineru";

/// Configuration for the request handler.
///
/// Built via [`WorkerConfig::builder()`], [`WorkerConfig::from_env()`] or
/// [`WorkerConfig::default()`].
///
/// # Example
/// ```rust
/// use mineru_worker::{Backend, WorkerConfig};
///
/// let config = WorkerConfig::builder()
///     .workspace_root("/tmp")
///     .default_backend(Backend::Pipeline)
///     .stderr_tail_chars(4000)
///     .build()
///     .unwrap();
/// assert_eq!(config.default_backend, Backend::Pipeline);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Directory under which per-request workspaces are created.
    /// Default: the platform temp directory.
    pub workspace_root: PathBuf,

    /// Backend used when a request does not name one. Default: `hybrid-auto-engine`.
    pub default_backend: Backend,

    /// Parse method used when a request does not name one. Default: `auto`.
    pub default_parse_method: ParseMethod,

    /// Optional OCR language hint forwarded to the engine (`-l`).
    pub lang: Option<String>,

    /// Which converter adapter to run. Default: [`EngineKind::Cli`].
    pub engine: EngineKind,

    /// Program and leading arguments for the out-of-process engine.
    /// Default: `["mineru"]`.
    pub engine_command: Vec<String>,

    /// Maximum number of characters of engine diagnostics returned in an
    /// error payload. The tail is kept. Default: 2000.
    pub stderr_tail_chars: usize,

    /// Whether success payloads enumerate every file the engine wrote.
    /// Error payloads always do. Default: true.
    pub list_output_files: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workspace_root: std::env::temp_dir(),
            default_backend: Backend::default(),
            default_parse_method: ParseMethod::default(),
            lang: None,
            engine: EngineKind::default(),
            engine_command: vec![DEFAULT_ENGINE_COMMAND.to_string()],
            stderr_tail_chars: DEFAULT_STDERR_TAIL_CHARS,
            list_output_files: true,
        }
    }
}

impl WorkerConfig {
    /// Create a new builder for `WorkerConfig`.
    pub fn builder() -> WorkerConfigBuilder {
        WorkerConfigBuilder {
            config: Self::default(),
        }
    }

    /// Read the configuration from process environment variables.
    ///
    /// | Variable | Meaning |
    /// |----------|---------|
    /// | `MINERU_WORKSPACE_ROOT` | workspace root directory |
    /// | `MINERU_BACKEND` | default backend |
    /// | `MINERU_PARSE_METHOD` | default parse method |
    /// | `MINERU_LANG` | OCR language hint |
    /// | `MINERU_ENGINE` | `cli` or `in-process` |
    /// | `MINERU_COMMAND` | engine command line, whitespace separated |
    /// | `MINERU_STDERR_TAIL` | diagnostic cap in characters |
    /// | `MINERU_LIST_OUTPUT_FILES` | `true`/`false` |
    ///
    /// Unset or empty variables fall back to the defaults.
    pub fn from_env() -> Result<Self, WorkerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, WorkerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut builder = Self::builder();

        if let Some(root) = get("MINERU_WORKSPACE_ROOT") {
            builder = builder.workspace_root(root);
        }
        if let Some(backend) = get("MINERU_BACKEND") {
            builder = builder.default_backend(backend.parse()?);
        }
        if let Some(method) = get("MINERU_PARSE_METHOD") {
            builder = builder.default_parse_method(method.parse()?);
        }
        if let Some(lang) = get("MINERU_LANG") {
            builder = builder.lang(lang);
        }
        if let Some(engine) = get("MINERU_ENGINE") {
            builder = builder.engine(engine.parse()?);
        }
        if let Some(command) = get("MINERU_COMMAND") {
            builder = builder.engine_command(command.split_whitespace().map(str::to_string));
        }
        if let Some(tail) = get("MINERU_STDERR_TAIL") {
            let n = tail.parse::<usize>().map_err(|_| {
                WorkerError::InvalidConfig(format!(
                    "MINERU_STDERR_TAIL must be a positive integer, got '{tail}'"
                ))
            })?;
            builder = builder.stderr_tail_chars(n);
        }
        if let Some(flag) = get("MINERU_LIST_OUTPUT_FILES") {
            builder = builder.list_output_files(parse_flag("MINERU_LIST_OUTPUT_FILES", &flag)?);
        }

        builder.build()
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, WorkerError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(WorkerError::InvalidConfig(format!(
            "{key} must be a boolean, got '{value}'"
        ))),
    }
}

/// Builder for [`WorkerConfig`].
#[derive(Debug)]
pub struct WorkerConfigBuilder {
    config: WorkerConfig,
}

impl WorkerConfigBuilder {
    pub fn workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.workspace_root = root.into();
        self
    }

    pub fn default_backend(mut self, backend: Backend) -> Self {
        self.config.default_backend = backend;
        self
    }

    pub fn default_parse_method(mut self, method: ParseMethod) -> Self {
        self.config.default_parse_method = method;
        self
    }

    pub fn lang(mut self, lang: impl Into<String>) -> Self {
        self.config.lang = Some(lang.into());
        self
    }

    pub fn engine(mut self, engine: EngineKind) -> Self {
        self.config.engine = engine;
        self
    }

    pub fn engine_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.engine_command = command.into_iter().map(Into::into).collect();
        self
    }

    pub fn stderr_tail_chars(mut self, n: usize) -> Self {
        self.config.stderr_tail_chars = n;
        self
    }

    pub fn list_output_files(mut self, v: bool) -> Self {
        self.config.list_output_files = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<WorkerConfig, WorkerError> {
        let c = &self.config;
        if c.stderr_tail_chars == 0 {
            return Err(WorkerError::InvalidConfig(
                "stderr tail must be at least 1 character".into(),
            ));
        }
        if c.engine == EngineKind::Cli && c.engine_command.is_empty() {
            return Err(WorkerError::InvalidConfig(
                "engine command must name a program when the CLI engine is selected".into(),
            ));
        }
        if c.workspace_root.as_os_str().is_empty() {
            return Err(WorkerError::InvalidConfig(
                "workspace root must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Engine backend, forwarded to the engine as `-b <backend>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// Classic layout-analysis + OCR model pipeline. Runs on CPU.
    Pipeline,
    /// Vision-language model through HF transformers.
    VlmTransformers,
    /// Vision-language model served by an embedded vLLM engine.
    VlmVllmEngine,
    /// Vision-language model behind a remote OpenAI-compatible server.
    VlmHttpClient,
    /// Pipeline for text-layer pages, VLM for the rest. (default)
    #[default]
    HybridAutoEngine,
}

impl Backend {
    pub const ALL: [Backend; 5] = [
        Backend::Pipeline,
        Backend::VlmTransformers,
        Backend::VlmVllmEngine,
        Backend::VlmHttpClient,
        Backend::HybridAutoEngine,
    ];

    /// The identifier the engine expects on its command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Pipeline => "pipeline",
            Backend::VlmTransformers => "vlm-transformers",
            Backend::VlmVllmEngine => "vlm-vllm-engine",
            Backend::VlmHttpClient => "vlm-http-client",
            Backend::HybridAutoEngine => "hybrid-auto-engine",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Backend::ALL
            .into_iter()
            .find(|b| b.as_str() == wanted)
            .ok_or_else(|| WorkerError::UnsupportedBackend(s.to_string()))
    }
}

/// How the engine should read page content, forwarded as `-m <method>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMethod {
    /// Let the engine decide per document. (default)
    #[default]
    Auto,
    /// Trust the embedded text layer.
    Txt,
    /// Rasterise and OCR every page.
    Ocr,
}

impl ParseMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseMethod::Auto => "auto",
            ParseMethod::Txt => "txt",
            ParseMethod::Ocr => "ocr",
        }
    }
}

impl fmt::Display for ParseMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParseMethod {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(ParseMethod::Auto),
            "txt" | "text" => Ok(ParseMethod::Txt),
            "ocr" => Ok(ParseMethod::Ocr),
            _ => Err(WorkerError::UnsupportedParseMethod(s.to_string())),
        }
    }
}

/// Which converter adapter the handler drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineKind {
    /// Run the engine as an external command. (default)
    #[default]
    Cli,
    /// Convert inside this process using the PDF text layer.
    InProcess,
}

impl FromStr for EngineKind {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "cli" | "subprocess" => Ok(EngineKind::Cli),
            "in-process" | "inprocess" | "library" => Ok(EngineKind::InProcess),
            other => Err(WorkerError::InvalidConfig(format!(
                "unknown engine '{other}', expected 'cli' or 'in-process'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let c = WorkerConfig::default();
        assert_eq!(c.default_backend, Backend::HybridAutoEngine);
        assert_eq!(c.default_parse_method, ParseMethod::Auto);
        assert_eq!(c.engine, EngineKind::Cli);
        assert_eq!(c.engine_command, vec!["mineru".to_string()]);
        assert_eq!(c.stderr_tail_chars, 2000);
        assert!(c.list_output_files);
    }

    #[test]
    fn backend_parsing_accepts_known_ids_only() {
        assert_eq!("pipeline".parse::<Backend>().unwrap(), Backend::Pipeline);
        assert_eq!(
            "VLM_VLLM_ENGINE".parse::<Backend>().unwrap(),
            Backend::VlmVllmEngine
        );
        let err = "rm -rf".parse::<Backend>().unwrap_err();
        assert_eq!(err.to_string(), "Unsupported backend: rm -rf");
        for b in Backend::ALL {
            assert_eq!(b.as_str().parse::<Backend>().unwrap(), b);
        }
    }

    #[test]
    fn from_lookup_reads_every_variable() {
        let c = WorkerConfig::from_lookup(lookup(&[
            ("MINERU_WORKSPACE_ROOT", "/scratch"),
            ("MINERU_BACKEND", "pipeline"),
            ("MINERU_PARSE_METHOD", "ocr"),
            ("MINERU_LANG", "en"),
            ("MINERU_ENGINE", "in-process"),
            ("MINERU_COMMAND", "python -m mineru"),
            ("MINERU_STDERR_TAIL", "512"),
            ("MINERU_LIST_OUTPUT_FILES", "false"),
        ]))
        .unwrap();

        assert_eq!(c.workspace_root, PathBuf::from("/scratch"));
        assert_eq!(c.default_backend, Backend::Pipeline);
        assert_eq!(c.default_parse_method, ParseMethod::Ocr);
        assert_eq!(c.lang.as_deref(), Some("en"));
        assert_eq!(c.engine, EngineKind::InProcess);
        assert_eq!(c.engine_command, vec!["python", "-m", "mineru"]);
        assert_eq!(c.stderr_tail_chars, 512);
        assert!(!c.list_output_files);
    }

    #[test]
    fn empty_variables_fall_back_to_defaults() {
        let c = WorkerConfig::from_lookup(lookup(&[("MINERU_BACKEND", "  ")])).unwrap();
        assert_eq!(c, WorkerConfig::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(WorkerConfig::from_lookup(lookup(&[("MINERU_STDERR_TAIL", "lots")])).is_err());
        assert!(WorkerConfig::from_lookup(lookup(&[("MINERU_STDERR_TAIL", "0")])).is_err());
        assert!(WorkerConfig::from_lookup(lookup(&[("MINERU_ENGINE", "gpu")])).is_err());
        assert!(
            WorkerConfig::from_lookup(lookup(&[("MINERU_LIST_OUTPUT_FILES", "maybe")])).is_err()
        );
    }

    #[test]
    fn cli_engine_requires_a_program() {
        let err = WorkerConfig::builder()
            .engine_command(Vec::<String>::new())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("engine command"));

        // The in-process engine never spawns anything.
        assert!(WorkerConfig::builder()
            .engine(EngineKind::InProcess)
            .engine_command(Vec::<String>::new())
            .build()
            .is_ok());
    }
}
