//! Fetching raw image bytes from a source reference.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::LimitsConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::types::SourceReference;

/// Resolves a source reference to raw bytes.
///
/// Uses `async_trait` so the service can hold an `Arc<dyn SourceFetcher>`.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Fetch the bytes behind `source`.
    ///
    /// `Stored` sources live in object storage and are not resolved here.
    async fn fetch(&self, source: &SourceReference) -> PipelineResult<Vec<u8>>;
}

/// Fetches remote URIs over HTTP(S) and local paths from disk.
pub struct DefaultFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_bytes: u64,
}

impl DefaultFetcher {
    /// Create a fetcher whose remote requests are bounded by
    /// `limits.fetch_timeout_ms` and whose bodies are capped at
    /// `limits.max_file_size_mb`.
    pub fn new(limits: &LimitsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: Duration::from_millis(limits.fetch_timeout_ms),
            max_bytes: limits.max_file_size_mb * 1024 * 1024,
        }
    }

    fn too_large(&self, url: &str, len: u64) -> PipelineError {
        PipelineError::FileTooLarge {
            source_ref: url.to_string(),
            size_mb: len / (1024 * 1024),
            max_mb: self.max_bytes / (1024 * 1024),
        }
    }

    async fn fetch_remote(&self, url: &str) -> PipelineResult<Vec<u8>> {
        let fetch_err = |message: String, status_code: Option<u16>| PipelineError::Fetch {
            source_ref: url.to_string(),
            message,
            status_code,
        };

        let mut response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PipelineError::Timeout {
                        source_ref: url.to_string(),
                        stage: "fetch".to_string(),
                        timeout_ms: self.timeout.as_millis() as u64,
                    }
                } else {
                    fetch_err(e.to_string(), None)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_err(format!("HTTP {status}"), Some(status.as_u16())));
        }

        if let Some(len) = response.content_length() {
            if len > self.max_bytes {
                return Err(self.too_large(url, len));
            }
        }

        // Content-Length is optional; enforce the cap on the stream too
        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| fetch_err(format!("Failed to read body: {e}"), None))?
        {
            body.extend_from_slice(&chunk);
            if body.len() as u64 > self.max_bytes {
                return Err(self.too_large(url, body.len() as u64));
            }
        }
        Ok(body)
    }
}

#[async_trait]
impl SourceFetcher for DefaultFetcher {
    async fn fetch(&self, source: &SourceReference) -> PipelineResult<Vec<u8>> {
        match source {
            SourceReference::Remote(url) => {
                tracing::debug!("Fetching remote source {url}");
                self.fetch_remote(url).await
            }
            SourceReference::Local(path) => {
                tracing::debug!("Reading local source {:?}", path);
                tokio::fs::read(path).await.map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        PipelineError::FileNotFound(path.display().to_string())
                    } else {
                        PipelineError::Fetch {
                            source_ref: path.display().to_string(),
                            message: e.to_string(),
                            status_code: None,
                        }
                    }
                })
            }
            SourceReference::Stored => Err(PipelineError::Fetch {
                source_ref: source.to_string(),
                message: "stored sources are read from object storage".to_string(),
                status_code: None,
            }),
        }
    }
}
