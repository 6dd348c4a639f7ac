//! Worker binary.
//!
//! Feeds jobs to [`Handler`] and prints one JSON result per job on stdout.
//! Jobs come from `--test-input`, `--input-file`, or, by default, stdin as
//! JSON Lines (one `{"input": {...}}` object per line). Logs go to stderr so
//! stdout stays machine-readable.

use anyhow::{Context, Result};
use clap::builder::BoolishValueParser;
use clap::Parser;
use mineru_worker::{ConversionResult, Handler, WorkerConfig};
use serde_json::Value;
use std::io;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Convert base64-encoded PDFs to Markdown with MinerU.
#[derive(Parser, Debug)]
#[command(
    name = "mineru-worker",
    version,
    about = "Serverless worker converting base64 PDFs to Markdown with MinerU",
    long_about = "Runs the PDF-to-Markdown job handler. Engine settings come from MINERU_* \
environment variables (or a .env file): MINERU_BACKEND, MINERU_PARSE_METHOD, MINERU_LANG, \
MINERU_ENGINE, MINERU_COMMAND, MINERU_WORKSPACE_ROOT, MINERU_STDERR_TAIL, MINERU_LIST_OUTPUT_FILES.",
    color = clap::ColorChoice::Auto
)]
struct Cli {
    /// Run a single job given inline as JSON, then exit.
    #[arg(long, conflicts_with = "input_file")]
    test_input: Option<String>,

    /// Run a single job read from a JSON file, then exit.
    #[arg(long, env = "MINERU_INPUT_FILE")]
    input_file: Option<PathBuf>,

    /// Pretty-print results (single-job modes only).
    #[arg(long)]
    pretty: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MINERU_VERBOSE", value_parser = BoolishValueParser::new())]
    verbose: bool,

    /// Suppress all logs except errors.
    #[arg(short, long, env = "MINERU_QUIET", value_parser = BoolishValueParser::new())]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = WorkerConfig::from_env().context("Invalid worker configuration")?;
    info!(
        "Worker ready (engine={:?}, backend={}, work dir={})",
        config.engine,
        config.default_backend,
        config.workspace_root.display()
    );
    let handler = Handler::new(config);

    // ── Single-job modes ─────────────────────────────────────────────────
    if let Some(raw) = &cli.test_input {
        let job: Value = serde_json::from_str(raw).context("--test-input is not valid JSON")?;
        return print_result(&handler.handle(&job).await, cli.pretty);
    }
    if let Some(path) = &cli.input_file {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read job file: {}", path.display()))?;
        let job: Value = serde_json::from_str(&raw)
            .with_context(|| format!("Job file is not valid JSON: {}", path.display()))?;
        return print_result(&handler.handle(&job).await, cli.pretty);
    }

    // ── Queue mode: JSON Lines on stdin ──────────────────────────────────
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut handled = 0usize;

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let result = match serde_json::from_str::<Value>(&line) {
            Ok(job) => handler.handle(&job).await,
            Err(e) => {
                warn!("Skipping malformed job line: {}", e);
                ConversionResult::error(format!("Invalid job payload: {e}"))
            }
        };
        handled += 1;

        let mut out = serde_json::to_string(&result).context("Failed to serialise result")?;
        out.push('\n');
        stdout
            .write_all(out.as_bytes())
            .await
            .context("Failed to write result")?;
        stdout.flush().await.context("Failed to flush stdout")?;
    }

    info!("Input closed after {} job(s)", handled);
    Ok(())
}

fn print_result(result: &ConversionResult, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(result)
    } else {
        serde_json::to_string(result)
    }
    .context("Failed to serialise result")?;
    println!("{text}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn log_flags_accept_boolish_env_values() {
        std::env::set_var("MINERU_VERBOSE", "1");
        std::env::set_var("MINERU_QUIET", "off");
        let cli = Cli::try_parse_from(["mineru-worker"]).unwrap();
        assert!(cli.verbose);
        assert!(!cli.quiet);
        std::env::remove_var("MINERU_VERBOSE");
        std::env::remove_var("MINERU_QUIET");
    }
}
