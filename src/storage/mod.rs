//! Object storage seam.
//!
//! The pipeline never talks HTTP directly for blobs; it goes through the
//! [`ObjectStore`] trait so tests can substitute the in-memory store.

use std::future::Future;

use bytes::Bytes;

use crate::Result;

pub mod http_store;
pub mod memory_store;

pub use http_store::HttpObjectStore;
pub use memory_store::MemoryObjectStore;

/// Path-scoped blob storage surface: put/get/public-URL/remove.
pub trait ObjectStore: Send + Sync {
    /// Store bytes under a bucket-relative path.
    fn put(&self, path: &str, bytes: Bytes) -> impl Future<Output = Result<()>> + Send;

    /// Fetch the bytes stored under a path.
    fn get(&self, path: &str) -> impl Future<Output = Result<Bytes>> + Send;

    /// Public URL a browser (or the pipeline itself) can fetch the object at.
    fn public_url_of(&self, path: &str) -> String;

    /// Inverse of [`public_url_of`](Self::public_url_of); `None` when the
    /// URL does not belong to this store.
    fn path_from_url(&self, url: &str) -> Option<String>;

    /// Remove a set of objects. Missing objects are not an error.
    fn remove(&self, paths: &[String]) -> impl Future<Output = Result<()>> + Send;
}
