//! Job validation and payload decoding.
//!
//! Validation runs before any workspace exists: a request that fails here
//! costs nothing but a JSON lookup. Decoding runs after the workspace is
//! acquired, so a malformed payload still exercises the cleanup path.

use crate::config::{Backend, ParseMethod, WorkerConfig};
use crate::error::WorkerError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::Value;

/// How far into the payload the `%PDF` header may appear.
const PDF_HEADER_WINDOW: usize = 1024;

/// A validated job, with per-request overrides resolved against defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInput {
    pub pdf_base64: String,
    pub backend: Backend,
    pub parse_method: ParseMethod,
    pub lang: Option<String>,
}

/// Extract and validate `input` from a job envelope.
///
/// Accepts `{ "input": { "pdf_base64": "...", "backend"?, "parse_method"?, "lang"? } }`.
/// Anything else in the envelope (ids, webhook URLs) is ignored.
pub fn parse_job(job: &Value, config: &WorkerConfig) -> Result<JobInput, WorkerError> {
    let input = job
        .get("input")
        .and_then(Value::as_object)
        .ok_or(WorkerError::MissingPdf)?;

    let pdf_base64 = input
        .get("pdf_base64")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or(WorkerError::MissingPdf)?
        .to_string();

    let backend = match optional_str(input.get("backend"), WorkerError::UnsupportedBackend)? {
        Some(s) => s.parse()?,
        None => config.default_backend,
    };

    let parse_method =
        match optional_str(input.get("parse_method"), WorkerError::UnsupportedParseMethod)? {
            Some(s) => s.parse()?,
            None => config.default_parse_method,
        };

    let lang = input
        .get("lang")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| config.lang.clone());

    Ok(JobInput {
        pdf_base64,
        backend,
        parse_method,
        lang,
    })
}

/// Treat absent, null and blank strings as "not given"; reject non-strings.
fn optional_str<'a>(
    value: Option<&'a Value>,
    reject: fn(String) -> WorkerError,
) -> Result<Option<&'a str>, WorkerError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(reject(other.to_string())),
    }
}

/// Decode a base64 PDF payload.
///
/// Tolerates a `data:application/pdf;base64,` prefix and embedded
/// whitespace (line-wrapped output from `base64`). The decoded bytes must
/// carry a `%PDF` header within the first kilobyte.
pub fn decode_pdf(encoded: &str) -> Result<Vec<u8>, WorkerError> {
    let body = match encoded.trim_start().strip_prefix("data:") {
        Some(rest) => rest
            .split_once(";base64,")
            .map(|(_, data)| data)
            .unwrap_or(rest),
        None => encoded,
    };

    let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD.decode(compact.as_bytes())?;

    let window = &bytes[..bytes.len().min(PDF_HEADER_WINDOW)];
    if !window.windows(4).any(|w| w == b"%PDF") {
        return Err(WorkerError::NotAPdf {
            magic: bytes.iter().take(4).copied().collect(),
        });
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> WorkerConfig {
        WorkerConfig::default()
    }

    #[test]
    fn missing_field_variants_are_validation_errors() {
        let cases = [
            json!({}),
            json!({ "input": null }),
            json!({ "input": "not an object" }),
            json!({ "input": [1, 2, 3] }),
            json!({ "input": {} }),
            json!({ "input": { "pdf_base64": null } }),
            json!({ "input": { "pdf_base64": "" } }),
            json!({ "input": { "pdf_base64": 42 } }),
            json!("just a string"),
            Value::Null,
        ];
        for job in cases {
            let err = parse_job(&job, &config()).unwrap_err();
            assert!(
                matches!(err, WorkerError::MissingPdf),
                "{job} gave {err:?}"
            );
        }
    }

    #[test]
    fn defaults_apply_when_overrides_absent() {
        let job = json!({ "id": "x", "input": { "pdf_base64": "JVBERi0=" } });
        let input = parse_job(&job, &config()).unwrap();
        assert_eq!(input.backend, Backend::HybridAutoEngine);
        assert_eq!(input.parse_method, ParseMethod::Auto);
        assert_eq!(input.lang, None);
    }

    #[test]
    fn overrides_are_validated() {
        let job = json!({ "input": {
            "pdf_base64": "JVBERi0=",
            "backend": "pipeline",
            "parse_method": "ocr",
            "lang": "ch"
        }});
        let input = parse_job(&job, &config()).unwrap();
        assert_eq!(input.backend, Backend::Pipeline);
        assert_eq!(input.parse_method, ParseMethod::Ocr);
        assert_eq!(input.lang.as_deref(), Some("ch"));

        let bad = json!({ "input": { "pdf_base64": "JVBERi0=", "backend": "turbo" } });
        assert!(matches!(
            parse_job(&bad, &config()),
            Err(WorkerError::UnsupportedBackend(b)) if b == "turbo"
        ));

        let wrong_type = json!({ "input": { "pdf_base64": "JVBERi0=", "backend": 7 } });
        assert!(matches!(
            parse_job(&wrong_type, &config()),
            Err(WorkerError::UnsupportedBackend(_))
        ));
    }

    #[test]
    fn blank_backend_means_default() {
        let job = json!({ "input": { "pdf_base64": "JVBERi0=", "backend": " " } });
        assert_eq!(
            parse_job(&job, &config()).unwrap().backend,
            Backend::HybridAutoEngine
        );
    }

    #[test]
    fn decode_accepts_plain_wrapped_and_data_url() {
        let encoded = STANDARD.encode(b"%PDF-1.7\n%%EOF\n");
        assert_eq!(decode_pdf(&encoded).unwrap(), b"%PDF-1.7\n%%EOF\n");

        let wrapped = format!("{}\n{}\n", &encoded[..8], &encoded[8..]);
        assert_eq!(decode_pdf(&wrapped).unwrap(), b"%PDF-1.7\n%%EOF\n");

        let data_url = format!("data:application/pdf;base64,{encoded}");
        assert_eq!(decode_pdf(&data_url).unwrap(), b"%PDF-1.7\n%%EOF\n");
    }

    #[test]
    fn decode_rejects_garbage_and_non_pdf() {
        assert!(matches!(
            decode_pdf("!!!not base64!!!"),
            Err(WorkerError::InvalidBase64(_))
        ));

        let png = STANDARD.encode(b"\x89PNG\r\n\x1a\n");
        assert!(matches!(
            decode_pdf(&png),
            Err(WorkerError::NotAPdf { magic }) if magic == b"\x89PNG"
        ));
    }
}
