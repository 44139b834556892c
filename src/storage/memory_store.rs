//! In-memory object store for tests and local development.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::RwLock;

use crate::{AppError, Result};

use super::ObjectStore;

/// Object store backed by a process-local map. Cheap to clone; clones share
/// the same contents.
#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    bucket: String,
    objects: Arc<RwLock<HashMap<String, Bytes>>>,
}

impl MemoryObjectStore {
    /// Create an empty store labelled with a bucket name.
    #[must_use]
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Whether the store holds no objects.
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// Whether an object exists under the path.
    pub async fn contains(&self, path: &str) -> bool {
        self.objects.read().await.contains_key(path)
    }

    /// Paths currently stored, unordered.
    pub async fn paths(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }
}

impl ObjectStore for MemoryObjectStore {
    async fn put(&self, path: &str, bytes: Bytes) -> Result<()> {
        self.objects.write().await.insert(path.to_owned(), bytes);
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Bytes> {
        self.objects
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| AppError::Storage(format!("object {path} not found")))
    }

    fn public_url_of(&self, path: &str) -> String {
        format!("memory://{}/{path}", self.bucket)
    }

    fn path_from_url(&self, url: &str) -> Option<String> {
        url.strip_prefix(&format!("memory://{}/", self.bucket))
            .map(ToOwned::to_owned)
    }

    async fn remove(&self, paths: &[String]) -> Result<()> {
        let mut objects = self.objects.write().await;
        for path in paths {
            objects.remove(path);
        }
        Ok(())
    }
}
