//! Human-readable rendering of job results, for the submit binary.

use crate::error::ClientError;
use crate::output::{ConversionFailure, ConversionSuccess};
use std::fmt::Write as _;
use std::path::Path;

/// Characters of Markdown shown by [`preview`].
pub const PREVIEW_CHARS: usize = 500;

/// First `max_chars` characters of `markdown`, with `...` when cut.
pub fn preview(markdown: &str, max_chars: usize) -> String {
    match markdown.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &markdown[..idx]),
        None => markdown.to_string(),
    }
}

/// `[OK] Got markdown (N chars, P page(s), F files)`.
pub fn success_summary(success: &ConversionSuccess) -> String {
    let mut line = format!("[OK] Got markdown ({} chars", success.markdown.chars().count());
    if let Some(pages) = success.pages {
        let _ = write!(line, ", {pages} page(s)");
    }
    if let Some(files) = &success.output_files {
        let _ = write!(line, ", {} files", files.len());
    }
    line.push(')');
    line
}

/// `[FAIL] message`, followed by the engine tail and the output listing when present.
pub fn failure_report(failure: &ConversionFailure) -> String {
    let mut out = format!("[FAIL] {}", failure.error);
    if let Some(stderr) = failure.stderr.as_deref().filter(|s| !s.trim().is_empty()) {
        let _ = write!(out, "\n\nSTDERR:\n{}", stderr.trim_end());
    }
    if let Some(files) = &failure.output_files {
        let _ = write!(out, "\n\nOutput files ({}):", files.len());
        for file in files {
            let _ = write!(out, "\n  {file}");
        }
    }
    out
}

/// Approximate decoded size of a base64 string, in MiB.
pub fn decoded_size_mb(base64_len: usize) -> f64 {
    (base64_len as f64) * 3.0 / 4.0 / 1024.0 / 1024.0
}

/// Write `markdown` to `path` atomically (temp file + rename).
pub async fn save_markdown(path: &Path, markdown: &str) -> Result<(), ClientError> {
    let io_err = |source| ClientError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, markdown).await.map_err(io_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(io_err)?;
    Ok(())
}
