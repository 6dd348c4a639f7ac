//! Client for a deployed worker endpoint.
//!
//! ```text
//! PDF file ──base64──▶ POST {base}/{endpoint}/run ──▶ job id
//!                                │
//!                    GET {base}/{endpoint}/status/{id}   every poll_interval
//!                                │
//!              COMPLETED ──▶ output (ConversionResult)
//!              FAILED / CANCELLED / TIMED_OUT ──▶ ClientError::JobFailed
//! ```
//!
//! [`SubmitMode::Sync`] posts to `/runsync` instead and only falls back to
//! polling when the platform hands the job back before it finished.
//!
//! The client adds no retries or backoff of its own.

pub mod report;
pub mod types;

pub use types::{JobEnvelope, JobPayload, JobStatus};

use crate::error::ClientError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use types::JobRequest;

// ── Defaults ─────────────────────────────────────────────────────────────

/// Platform API root; the endpoint id is appended to it.
pub const DEFAULT_BASE_URL: &str = "https://api.runpod.ai/v2";

/// Delay between two status requests.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Upper bound for any single HTTP request (`/runsync` can block for long).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3600);

// Bound on how much of a non-2xx response body ends up in an error.
const MAX_ERROR_BODY_CHARS: usize = 1000;

// ── Configuration ────────────────────────────────────────────────────────

/// Connection settings for one endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub endpoint_id: String,
    pub api_key: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("endpoint_id", &self.endpoint_id)
            .field("api_key", &"<redacted>")
            .field("poll_interval", &self.poll_interval)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// `{base_url}/{endpoint_id}/{path}`.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.endpoint_id,
            path.trim_start_matches('/')
        )
    }
}

/// Builder for [`ClientConfig`]. Endpoint id and API key are required.
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    base_url: String,
    endpoint_id: Option<String>,
    api_key: Option<String>,
    poll_interval: Duration,
    request_timeout: Duration,
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            endpoint_id: None,
            api_key: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn endpoint_id(mut self, id: impl Into<String>) -> Self {
        self.endpoint_id = Some(id.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<ClientConfig, ClientError> {
        let endpoint_id = required(self.endpoint_id, "endpoint id")?;
        let api_key = required(self.api_key, "API key")?;
        if self.base_url.trim().is_empty() {
            return Err(ClientError::InvalidConfig("base URL must not be empty".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(ClientError::InvalidConfig(
                "poll interval must be greater than zero".into(),
            ));
        }
        Ok(ClientConfig {
            base_url: self.base_url,
            endpoint_id,
            api_key,
            poll_interval: self.poll_interval,
            request_timeout: self.request_timeout,
        })
    }
}

fn required(value: Option<String>, what: &str) -> Result<String, ClientError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ClientError::InvalidConfig(format!("{what} is required"))),
    }
}

// ── Client ───────────────────────────────────────────────────────────────

/// How a job is handed to the platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubmitMode {
    /// `/run`, then poll `/status/{id}`.
    #[default]
    Async,
    /// `/runsync`; polls only if the job is still running when it returns.
    Sync,
}

/// HTTP client bound to one endpoint.
#[derive(Debug, Clone)]
pub struct EndpointClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl EndpointClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|source| ClientError::Http {
                url: config.base_url.clone(),
                source,
            })?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Submit `payload` and wait for a terminal status.
    pub async fn run(&self, payload: &JobPayload, mode: SubmitMode) -> Result<JobEnvelope, ClientError> {
        match mode {
            SubmitMode::Async => {
                let job_id = self.submit(payload).await?;
                info!("Job ID: {}", job_id);
                self.wait_for_completion(&job_id).await
            }
            SubmitMode::Sync => {
                let envelope = self.run_sync(payload).await?;
                let status = envelope.status;
                match status {
                    Some(JobStatus::Completed) => Ok(envelope),
                    Some(status) if status.is_failure() => Err(ClientError::JobFailed {
                        job_id: envelope.id.clone().unwrap_or_default(),
                        status,
                        detail: envelope.describe(),
                    }),
                    None if envelope.output.is_some() || !envelope.rest.is_empty() => Ok(envelope),
                    _ => {
                        let job_id = envelope
                            .id
                            .filter(|id| !id.is_empty())
                            .ok_or(ClientError::MissingJobId)?;
                        info!("Job {} still running after /runsync, polling", job_id);
                        self.wait_for_completion(&job_id).await
                    }
                }
            }
        }
    }

    /// `POST /run`: enqueue the job and return its id.
    pub async fn submit(&self, payload: &JobPayload) -> Result<String, ClientError> {
        let envelope = self.post("run", &JobRequest { input: payload }).await?;
        envelope
            .id
            .filter(|id| !id.is_empty())
            .ok_or(ClientError::MissingJobId)
    }

    /// `POST /runsync`: run the job and wait server-side.
    pub async fn run_sync(&self, payload: &JobPayload) -> Result<JobEnvelope, ClientError> {
        self.post("runsync", &JobRequest { input: payload }).await
    }

    /// `GET /status/{id}`.
    pub async fn status(&self, job_id: &str) -> Result<JobEnvelope, ClientError> {
        let url = self.config.url(&format!("status/{job_id}"));
        debug!("GET {}", url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|source| ClientError::Http {
                url: url.clone(),
                source,
            })?;
        read_envelope(url, response).await
    }

    /// Poll `/status/{id}` until the job reaches a terminal status.
    ///
    /// Sleeps `poll_interval` after every non-terminal status. Only
    /// COMPLETED returns `Ok`; the other terminal statuses become
    /// [`ClientError::JobFailed`].
    pub async fn wait_for_completion(&self, job_id: &str) -> Result<JobEnvelope, ClientError> {
        loop {
            let envelope = self.status(job_id).await?;
            let status = envelope.status.unwrap_or(JobStatus::Unknown);
            info!("Status: {}", status);

            if status == JobStatus::Completed {
                return Ok(envelope);
            }
            if status.is_failure() {
                return Err(ClientError::JobFailed {
                    job_id: job_id.to_string(),
                    status,
                    detail: envelope.describe(),
                });
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<JobEnvelope, ClientError> {
        let url = self.config.url(path);
        debug!("POST {}", url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|source| ClientError::Http {
                url: url.clone(),
                source,
            })?;
        read_envelope(url, response).await
    }
}

async fn read_envelope(url: String, response: reqwest::Response) -> Result<JobEnvelope, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        return Err(ClientError::Status {
            url,
            status: status.as_u16(),
            body,
        });
    }
    response
        .json::<JobEnvelope>()
        .await
        .map_err(|source| ClientError::Http { url, source })
}

/// Read a PDF file and base64-encode it for submission.
pub async fn encode_pdf(path: &Path) -> Result<String, ClientError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| ClientError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClientConfig {
        ClientConfig::builder()
            .endpoint_id("abc123")
            .api_key("secret")
            .build()
            .unwrap()
    }

    #[test]
    fn defaults() {
        let c = config();
        assert_eq!(c.base_url, DEFAULT_BASE_URL);
        assert_eq!(c.poll_interval, Duration::from_secs(5));
        assert_eq!(c.request_timeout, Duration::from_secs(3600));
    }

    #[test]
    fn urls_join_cleanly() {
        let c = ClientConfig::builder()
            .base_url("http://localhost:8000/v2/")
            .endpoint_id("ep")
            .api_key("k")
            .build()
            .unwrap();
        assert_eq!(c.url("run"), "http://localhost:8000/v2/ep/run");
        assert_eq!(c.url("/status/j1"), "http://localhost:8000/v2/ep/status/j1");
    }

    #[test]
    fn endpoint_and_key_are_required() {
        let err = ClientConfig::builder().api_key("k").build().unwrap_err();
        assert!(err.to_string().contains("endpoint id"));

        let err = ClientConfig::builder()
            .endpoint_id("ep")
            .api_key("   ")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("API key"));

        let err = ClientConfig::builder()
            .endpoint_id("ep")
            .api_key("k")
            .poll_interval(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidConfig(_)));
    }

    #[test]
    fn debug_hides_api_key() {
        let rendered = format!("{:?}", config());
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("abc123"));
    }

    #[tokio::test]
    async fn encode_pdf_reads_and_encodes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();
        assert_eq!(encode_pdf(&path).await.unwrap(), "JVBERi0xLjQ=");

        let missing = encode_pdf(&dir.path().join("nope.pdf")).await;
        assert!(matches!(missing, Err(ClientError::Io { .. })));
    }
}
