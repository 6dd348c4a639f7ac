//! # mineru-worker
//!
//! A serverless worker that converts base64-encoded PDFs to Markdown with
//! the [MinerU](https://github.com/opendatalab/MinerU) document engine, and
//! a client that submits jobs to a deployed endpoint and waits for them.
//!
//! ## Handler Overview
//!
//! ```text
//! {"input": {"pdf_base64": "...", "backend": "pipeline"}}
//!  │
//!  ├─ 1. Validate   required field and backend, before touching disk
//!  ├─ 2. Workspace  private temp dir: input.pdf + output/
//!  ├─ 3. Engine     `mineru -p … -o … -b …` (or the in-process adapter)
//!  ├─ 4. Discover   sorted *.md under output/, first one is canonical
//!  ├─ 5. Assemble   {markdown, pages, output_files}
//!  └─ 6. Cleanup    workspace removed whatever happened
//! ```
//!
//! Every failure comes back as `{error, stderr?, output_files?}`; the
//! handler itself never fails.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mineru_worker::{Handler, WorkerConfig};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let handler = Handler::new(WorkerConfig::from_env()?);
//!     let pdf_base64 = "JVBERi0xLjQK..."; // base64 of a PDF
//!     let result = handler
//!         .handle(&json!({ "input": { "pdf_base64": pdf_base64 } }))
//!         .await;
//!     println!("{}", serde_json::to_string_pretty(&result)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `mineru-worker` and `mineru-submit` binaries |
//!
//! ## Backends
//!
//! | Backend | Needs GPU | Notes |
//! |---------|-----------|-------|
//! | `pipeline` | no | layout models + OCR |
//! | `vlm-transformers` | yes | VLM via transformers |
//! | `vlm-vllm-engine` | yes | VLM via embedded vLLM |
//! | `vlm-http-client` | no | VLM behind a remote server |
//! | `hybrid-auto-engine` | yes | default |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod output;
pub mod pipeline;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use client::{ClientConfig, ClientConfigBuilder, EndpointClient, JobEnvelope, JobStatus, SubmitMode};
pub use config::{Backend, EngineKind, ParseMethod, WorkerConfig, WorkerConfigBuilder};
pub use error::{ClientError, Diagnostics, WorkerError};
pub use handler::Handler;
pub use output::{ConversionFailure, ConversionResult, ConversionSuccess};
pub use pipeline::engine::{create_converter, CliConverter, Converter, EngineError, EngineReport, EngineRequest};
pub use pipeline::native::InProcessConverter;
