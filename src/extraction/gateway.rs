//! Gateway to the external document-extraction service.
//!
//! The request is a multipart form: one `files` part per image plus a JSON
//! `exam_structure` string field carrying the minimal skeleton. The
//! response is a binary archive, parsed by [`super::archive`].

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info};

use crate::config::ExtractionConfig;
use crate::models::exam::ExamSkeleton;
use crate::{AppError, Result};

/// One image shipped to the extraction service.
#[derive(Debug, Clone)]
pub struct ImagePart {
    /// File name forwarded as the multipart part's filename.
    pub file_name: String,
    /// Raw image bytes.
    pub bytes: Bytes,
}

/// Seam for the extraction call so tests can substitute a stub.
pub trait Extractor: Send + Sync {
    /// Submit images plus the exam skeleton; resolves to the raw archive
    /// bytes on success.
    fn submit(
        &self,
        images: Vec<ImagePart>,
        skeleton: &ExamSkeleton,
    ) -> impl Future<Output = Result<Bytes>> + Send;
}

/// HTTP gateway with a hard per-request abort.
#[derive(Clone)]
pub struct HttpExtractionGateway {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpExtractionGateway {
    /// Build a gateway from configuration.
    #[must_use]
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }
}

impl Extractor for HttpExtractionGateway {
    async fn submit(&self, images: Vec<ImagePart>, skeleton: &ExamSkeleton) -> Result<Bytes> {
        let skeleton_json = serde_json::to_string(skeleton)
            .map_err(|err| AppError::Format(format!("failed to encode skeleton: {err}")))?;

        let mut form = reqwest::multipart::Form::new().text("exam_structure", skeleton_json);
        let image_count = images.len();
        for image in images {
            let part = reqwest::multipart::Part::bytes(image.bytes.to_vec())
                .file_name(image.file_name)
                .mime_str("application/octet-stream")
                .map_err(|err| AppError::Format(format!("invalid mime type: {err}")))?;
            form = form.part("files", part);
        }

        info!(image_count, endpoint = %self.endpoint, "submitting extraction request");
        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    AppError::Timeout(format!(
                        "extraction exceeded {}s bound",
                        self.timeout.as_secs()
                    ))
                } else {
                    AppError::Service {
                        status: 0,
                        body: err.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await.map_err(|err| {
            if err.is_timeout() {
                AppError::Timeout(format!(
                    "extraction exceeded {}s bound while streaming response",
                    self.timeout.as_secs()
                ))
            } else {
                AppError::Service {
                    status: status.as_u16(),
                    body: err.to_string(),
                }
            }
        })?;
        debug!(archive_bytes = bytes.len(), "extraction response received");
        Ok(bytes)
    }
}
