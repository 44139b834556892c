//! HTTP object store speaking the storage service's REST surface.
//!
//! Paths map onto `{endpoint}/object/{bucket}/{path}` for writes and
//! `{endpoint}/object/public/{bucket}/{path}` for public reads.

use bytes::Bytes;
use reqwest::StatusCode;
use tracing::debug;

use crate::config::StorageConfig;
use crate::{AppError, Result};

use super::ObjectStore;

/// Object store backed by a remote storage service.
#[derive(Clone)]
pub struct HttpObjectStore {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
    api_key: String,
}

impl HttpObjectStore {
    /// Build a store from configuration.
    #[must_use]
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_owned(),
            bucket: config.bucket.clone(),
            api_key: config.api_key.clone(),
        }
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/object/{}/{path}", self.endpoint, self.bucket)
    }

    fn public_prefix(&self) -> String {
        format!("{}/object/public/{}/", self.endpoint, self.bucket)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.is_empty() {
            req
        } else {
            req.bearer_auth(&self.api_key)
        }
    }
}

impl ObjectStore for HttpObjectStore {
    async fn put(&self, path: &str, bytes: Bytes) -> Result<()> {
        let response = self
            .authorize(self.client.post(self.object_url(path)))
            .header("content-type", "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .map_err(|err| AppError::Storage(format!("put {path}: {err}")))?;
        if !response.status().is_success() {
            return Err(AppError::Storage(format!(
                "put {path}: upstream {}",
                response.status()
            )));
        }
        debug!(path, "object stored");
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Bytes> {
        let response = self
            .client
            .get(self.public_url_of(path))
            .send()
            .await
            .map_err(|err| AppError::Storage(format!("get {path}: {err}")))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(AppError::Storage(format!("object {path} not found")));
        }
        if !response.status().is_success() {
            return Err(AppError::Storage(format!(
                "get {path}: upstream {}",
                response.status()
            )));
        }
        response
            .bytes()
            .await
            .map_err(|err| AppError::Storage(format!("get {path}: {err}")))
    }

    fn public_url_of(&self, path: &str) -> String {
        format!("{}{path}", self.public_prefix())
    }

    fn path_from_url(&self, url: &str) -> Option<String> {
        url.strip_prefix(&self.public_prefix()).map(ToOwned::to_owned)
    }

    async fn remove(&self, paths: &[String]) -> Result<()> {
        for path in paths {
            let response = self
                .authorize(self.client.delete(self.object_url(path)))
                .send()
                .await
                .map_err(|err| AppError::Storage(format!("remove {path}: {err}")))?;
            // 404 on delete counts as already removed.
            if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
                return Err(AppError::Storage(format!(
                    "remove {path}: upstream {}",
                    response.status()
                )));
            }
        }
        Ok(())
    }
}
