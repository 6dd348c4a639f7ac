//! In-process converter built on the PDF text layer.
//!
//! Three steps, mirroring what the engine does internally:
//!
//! 1. **Classify** — load the document with `lopdf` and extract each page's
//!    text. A document with no extractable text on any page is image-based
//!    and needs OCR.
//! 2. **Analyse** — text-based documents go through the text pipeline
//!    (line cleanup, paragraph grouping). Image-based documents, or an
//!    explicit `ocr` request, are a fault: OCR needs the external engine.
//! 3. **Render** — Markdown is written to `{output}/{stem}/{method}/{stem}.md`,
//!    the same layout the CLI engine uses, so output discovery is shared.
//!
//! `lopdf` is synchronous and CPU-bound, so the work runs on the blocking
//! thread pool.

use crate::config::ParseMethod;
use crate::pipeline::engine::{Converter, EngineError, EngineReport, EngineRequest};
use async_trait::async_trait;
use lopdf::Document;
use std::fmt::Write as _;
use std::path::Path;
use tracing::{debug, info};

const ENGINE_NAME: &str = "in-process engine";

/// Whether a document carries a usable text layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// At least one page has extractable text.
    TextBased,
    /// No page has extractable text; only OCR can read it.
    ImageBased,
}

/// Text extracted from one page (1-indexed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

/// Converter that runs inside the worker process.
#[derive(Debug, Clone, Default)]
pub struct InProcessConverter;

impl InProcessConverter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Converter for InProcessConverter {
    fn name(&self) -> &str {
        ENGINE_NAME
    }

    async fn convert(&self, request: EngineRequest<'_>) -> Result<EngineReport, EngineError> {
        let pdf = request.pdf_path.to_path_buf();
        let out = request.output_dir.to_path_buf();
        let method = request.parse_method;
        info!(
            "Converting in-process (backend={}, method={})",
            request.backend, method
        );

        tokio::task::spawn_blocking(move || convert_blocking(&pdf, &out, method))
            .await
            .map_err(|e| EngineError::Fault {
                message: format!("conversion task panicked: {e}"),
                log: String::new(),
            })?
    }
}

fn convert_blocking(
    pdf_path: &Path,
    output_dir: &Path,
    method: ParseMethod,
) -> Result<EngineReport, EngineError> {
    let mut log = String::new();
    let fault = |message: String, log: &str| EngineError::Fault {
        message,
        log: log.to_string(),
    };

    let document = Document::load(pdf_path)
        .map_err(|e| fault(format!("failed to load PDF: {e}"), &log))?;

    let pages = extract_pages(&document, &mut log);
    let _ = writeln!(log, "loaded {} page(s)", pages.len());
    if pages.is_empty() {
        return Err(fault("document has no pages".into(), &log));
    }

    let kind = classify(&pages);
    let _ = writeln!(log, "classified as {kind:?}");
    debug!("Document classified as {:?}", kind);

    if method == ParseMethod::Ocr || kind == DocumentKind::ImageBased {
        return Err(fault(
            "OCR pipeline is not available in-process; use the CLI engine".into(),
            &log,
        ));
    }

    let markdown = render_markdown(&pages);

    let stem = pdf_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let target_dir = output_dir.join(&stem).join(method.as_str());
    std::fs::create_dir_all(&target_dir)
        .map_err(|e| fault(format!("failed to create {}: {e}", target_dir.display()), &log))?;

    let target = target_dir.join(format!("{stem}.md"));
    std::fs::write(&target, &markdown)
        .map_err(|e| fault(format!("failed to write {}: {e}", target.display()), &log))?;
    let _ = writeln!(log, "wrote {} ({} bytes)", target.display(), markdown.len());

    Ok(EngineReport { log })
}

/// Extract the text of every page, in page order.
///
/// A page whose content stream cannot be decoded contributes empty text
/// (and a log line) rather than failing the document.
pub fn extract_pages(document: &Document, log: &mut String) -> Vec<PageText> {
    document
        .get_pages()
        .keys()
        .map(|&number| {
            let text = document.extract_text(&[number]).unwrap_or_else(|e| {
                let _ = writeln!(log, "page {number}: text extraction failed: {e}");
                String::new()
            });
            PageText { number, text }
        })
        .collect()
}

/// A document is text-based when any page has non-whitespace text.
pub fn classify(pages: &[PageText]) -> DocumentKind {
    if pages.iter().any(|p| !p.text.trim().is_empty()) {
        DocumentKind::TextBased
    } else {
        DocumentKind::ImageBased
    }
}

/// Render extracted page text as Markdown.
///
/// Lines are right-trimmed and inner whitespace runs collapsed; runs of
/// blank lines become one paragraph break. Pages are separated by a blank
/// line, empty pages are skipped. The result ends with a single newline.
pub fn render_markdown(pages: &[PageText]) -> String {
    let blocks: Vec<String> = pages
        .iter()
        .map(|p| render_page(&p.text))
        .filter(|b| !b.is_empty())
        .collect();

    let mut markdown = blocks.join("\n\n");
    markdown.push('\n');
    markdown
}

fn render_page(text: &str) -> String {
    let mut paragraphs: Vec<Vec<String>> = vec![Vec::new()];
    for raw in text.lines() {
        let line = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            if paragraphs.last().is_some_and(|p| !p.is_empty()) {
                paragraphs.push(Vec::new());
            }
        } else if let Some(current) = paragraphs.last_mut() {
            current.push(line);
        }
    }

    paragraphs
        .into_iter()
        .filter(|p| !p.is_empty())
        .map(|p| p.join("\n"))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(number: u32, text: &str) -> PageText {
        PageText {
            number,
            text: text.to_string(),
        }
    }

    #[test]
    fn classification_looks_for_any_text() {
        assert_eq!(
            classify(&[page(1, " \n"), page(2, "Hello")]),
            DocumentKind::TextBased
        );
        assert_eq!(
            classify(&[page(1, ""), page(2, "\n\t")]),
            DocumentKind::ImageBased
        );
        assert_eq!(classify(&[]), DocumentKind::ImageBased);
    }

    #[test]
    fn rendering_groups_paragraphs_and_skips_blank_pages() {
        let md = render_markdown(&[
            page(1, "Title   line\n\n\n\nFirst  para\ncontinues  \n"),
            page(2, "   \n"),
            page(3, "Second page\n"),
        ]);
        assert_eq!(
            md,
            "Title line\n\nFirst para\ncontinues\n\nSecond page\n"
        );
    }

    #[test]
    fn rendering_empty_document_is_just_a_newline() {
        assert_eq!(render_markdown(&[]), "\n");
    }

    #[tokio::test]
    async fn unreadable_pdf_is_a_fault() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("input.pdf");
        std::fs::write(&pdf, b"%PDF-1.4\nthis is not really a pdf").unwrap();
        let out = dir.path().join("output");
        std::fs::create_dir(&out).unwrap();

        let request = EngineRequest {
            pdf_path: &pdf,
            output_dir: &out,
            backend: crate::config::Backend::Pipeline,
            parse_method: ParseMethod::Auto,
            lang: None,
        };
        let result = InProcessConverter::new().convert(request).await;
        assert!(matches!(result, Err(EngineError::Fault { .. })), "{result:?}");
    }
}
