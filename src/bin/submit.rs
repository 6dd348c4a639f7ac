//! Submission client binary.
//!
//! Encodes a local PDF, submits it to a deployed worker endpoint, waits for
//! the job and prints the outcome. Exits non-zero when the worker reports an
//! error payload or the job fails.

use anyhow::{bail, Context, Result};
use clap::builder::BoolishValueParser;
use clap::Parser;
use mineru_worker::client::report::{self, PREVIEW_CHARS};
use mineru_worker::client::{encode_pdf, JobPayload, DEFAULT_BASE_URL};
use mineru_worker::{Backend, ClientConfig, ConversionResult, EndpointClient, ParseMethod, SubmitMode};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Submit a PDF to a deployed MinerU worker endpoint.
#[derive(Parser, Debug)]
#[command(
    name = "mineru-submit",
    version,
    about = "Submit a PDF to a deployed MinerU worker endpoint and print the Markdown",
    color = clap::ColorChoice::Auto
)]
struct Cli {
    /// PDF file to convert.
    #[arg(env = "TEST_PDF", default_value = "test.pdf")]
    pdf: PathBuf,

    /// Endpoint id on the hosting platform.
    #[arg(long, env = "RUNPOD_ENDPOINT_ID")]
    endpoint_id: Option<String>,

    /// API key, sent as a bearer token.
    #[arg(long, env = "RUNPOD_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// API root; the endpoint id is appended.
    #[arg(long, env = "RUNPOD_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Save the Markdown to this file.
    #[arg(short, long, env = "SAVE_OUTPUT")]
    save: Option<PathBuf>,

    /// Use /runsync instead of /run + polling.
    #[arg(long, env = "RUNPOD_SYNC", value_parser = BoolishValueParser::new())]
    sync: bool,

    /// Seconds between status requests.
    #[arg(long, env = "POLL_INTERVAL", default_value_t = 5)]
    poll_interval: u64,

    /// Per-request HTTP timeout in seconds.
    #[arg(long, env = "RUNPOD_TIMEOUT", default_value_t = 3600)]
    timeout: u64,

    /// Backend override for this job (pipeline, vlm-transformers, ...).
    #[arg(long)]
    backend: Option<Backend>,

    /// Parse method override for this job (auto, txt, ocr).
    #[arg(long)]
    parse_method: Option<ParseMethod>,

    /// OCR language hint for this job.
    #[arg(long)]
    lang: Option<String>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(if cli.verbose { "debug" } else { "info" })
        }))
        .with_writer(io::stderr)
        .without_time()
        .init();

    let Some(endpoint_id) = cli.endpoint_id.clone().filter(|s| !s.trim().is_empty()) else {
        bail!("Set RUNPOD_ENDPOINT_ID (or pass --endpoint-id)");
    };
    let Some(api_key) = cli.api_key.clone().filter(|s| !s.trim().is_empty()) else {
        bail!("Set RUNPOD_API_KEY (or pass --api-key)");
    };
    if !cli.pdf.is_file() {
        bail!("PDF not found: {}", cli.pdf.display());
    }

    // ── Encode ───────────────────────────────────────────────────────────
    info!("Reading {}...", cli.pdf.display());
    let pdf_base64 = encode_pdf(&cli.pdf).await?;
    info!(
        "Size: {:.1} MB (base64: {} chars)",
        report::decoded_size_mb(pdf_base64.len()),
        pdf_base64.len()
    );

    let payload = JobPayload {
        pdf_base64,
        backend: cli.backend,
        parse_method: cli.parse_method,
        lang: cli.lang.clone(),
    };

    // ── Submit and wait ──────────────────────────────────────────────────
    let config = ClientConfig::builder()
        .base_url(&cli.base_url)
        .endpoint_id(endpoint_id)
        .api_key(api_key)
        .poll_interval(Duration::from_secs(cli.poll_interval.max(1)))
        .request_timeout(Duration::from_secs(cli.timeout))
        .build()?;
    let client = EndpointClient::new(config)?;

    let mode = if cli.sync {
        SubmitMode::Sync
    } else {
        SubmitMode::Async
    };
    info!("Submitting to endpoint {} ({:?})...", client.config().endpoint_id, mode);
    let envelope = client.run(&payload, mode).await?;
    if let Some(ms) = envelope.execution_time {
        info!("Execution time: {:.1}s", ms as f64 / 1000.0);
    }

    // ── Report ───────────────────────────────────────────────────────────
    match envelope.result()? {
        ConversionResult::Failure(failure) => {
            println!("{}", report::failure_report(&failure));
            Ok(ExitCode::FAILURE)
        }
        ConversionResult::Success(success) => {
            println!("{}", report::success_summary(&success));
            println!("\n--- Preview ---\n{}", report::preview(&success.markdown, PREVIEW_CHARS));
            if let Some(path) = &cli.save {
                report::save_markdown(path, &success.markdown)
                    .await
                    .with_context(|| format!("Failed to save {}", path.display()))?;
                println!("\nSaved to {}", path.display());
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
