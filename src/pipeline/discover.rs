//! Output discovery: what did the engine write?
//!
//! The engine chooses its own layout under the output directory
//! (`{stem}/{method}/{stem}.md`, images alongside, JSON sidecars, ...). We
//! only rely on two facts: Markdown files end in `.md`, and there is at
//! least one.
//!
//! Directory listing order is not stable across file systems, so every
//! listing is sorted by its relative, `/`-separated path. The first
//! Markdown file in that order is canonical. Given `b.md` and
//! `a/sub/c.md`, `a/sub/c.md` wins on every run and every platform.

use std::io;
use std::path::{Component, Path};
use tracing::warn;

/// Sorted relative paths of every regular file under `root`.
///
/// Directory symlinks are not followed; file symlinks are listed.
pub fn scan_output(root: &Path) -> io::Result<Vec<String>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let path = entry.path();
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() || (file_type.is_symlink() && path.is_file()) {
                if let Some(rel) = relative_key(root, &path) {
                    files.push(rel);
                }
            }
        }
    }

    files.sort();
    Ok(files)
}

/// [`scan_output`] for diagnostics: a failed scan yields an empty list.
pub fn list_output_files(root: &Path) -> Vec<String> {
    scan_output(root).unwrap_or_else(|e| {
        warn!("Could not list output directory {}: {}", root.display(), e);
        Vec::new()
    })
}

/// The Markdown subset of a sorted listing, order preserved.
pub fn markdown_files(files: &[String]) -> Vec<&str> {
    files
        .iter()
        .map(String::as_str)
        .filter(|f| is_markdown(f))
        .collect()
}

fn is_markdown(path: &str) -> bool {
    Path::new(path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
}

/// `/`-joined path of `path` relative to `root`.
fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}
