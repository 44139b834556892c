//! Image buffering and upload to object storage.
//!
//! The client buffers locally-identified images without touching the
//! session, then commits them all-or-nothing: a single failed upload
//! aborts the commit with the session status unchanged.

use std::sync::OnceLock;

use bytes::Bytes;
use regex::Regex;
use tracing::{info, warn};

use crate::models::roster::RosterEntry;
use crate::models::session::{CaptureSession, SessionStatus};
use crate::persistence::roster_repo::RosterRepo;
use crate::persistence::session_repo::SessionRepo;
use crate::storage::ObjectStore;
use crate::Result;

/// Collapse any run of whitespace and/or the literal substring `%20` into a
/// single underscore, preventing path collisions from literal
/// percent-encoding. Idempotent.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        #[allow(clippy::unwrap_used)] // literal pattern, cannot fail to compile
        let re = Regex::new(r"(?:\s|%20)+").unwrap();
        re
    });
    pattern.replace_all(name, "_").into_owned()
}

/// One buffered image awaiting commit.
#[derive(Debug, Clone)]
pub struct BufferedImage {
    /// Local file name; sanitized at commit time.
    pub file_name: String,
    /// Raw image bytes.
    pub bytes: Bytes,
}

/// Buffers captured images and uploads them under a token-scoped prefix.
pub struct CaptureClient<'a, S: ObjectStore> {
    store: &'a S,
    buffer: Vec<BufferedImage>,
}

impl<'a, S: ObjectStore> CaptureClient<'a, S> {
    /// Create a client with an empty buffer.
    #[must_use]
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            buffer: Vec::new(),
        }
    }

    /// Buffer one image locally. No session interaction happens here.
    pub fn capture(&mut self, file_name: impl Into<String>, bytes: Bytes) {
        self.buffer.push(BufferedImage {
            file_name: file_name.into(),
            bytes,
        });
    }

    /// Drop a buffered image by its (pre-sanitization) name.
    pub fn discard(&mut self, file_name: &str) {
        self.buffer.retain(|img| img.file_name != file_name);
    }

    /// Number of buffered images.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Upload the buffer for a single-student session and flip it to
    /// `uploaded`.
    ///
    /// All-or-nothing: the batch is staged into storage first; any upload
    /// failure removes the staged objects and returns without touching the
    /// session. On full success the public URLs are appended to the
    /// session's path list and the status transitions `pending → uploaded`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` when the buffer is empty,
    /// `AppError::Storage` on upload failure, `AppError::State` on an
    /// illegal transition.
    pub async fn commit(
        &mut self,
        sessions: &SessionRepo,
        session: &CaptureSession,
    ) -> Result<CaptureSession> {
        let prefix = format!("temp_scans/{}", session.token);
        let urls = self.stage(&prefix).await?;

        let with_paths = sessions.append_image_paths(&session.id, &urls).await?;
        // A second commit on an already-uploaded session just adds images.
        let updated = if with_paths.status == SessionStatus::Pending {
            sessions
                .update_status(&with_paths.id, SessionStatus::Uploaded)
                .await?
        } else {
            with_paths
        };

        info!(session_id = %session.id, images = urls.len(), "capture committed");
        self.buffer.clear();
        Ok(updated)
    }

    /// Upload the buffer for one roster entry, flipping only that entry's
    /// slot to `uploaded`. Sibling entries are untouched.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`commit`](Self::commit).
    pub async fn commit_entry(
        &mut self,
        rosters: &RosterRepo,
        roster_token: &str,
        entry: &RosterEntry,
    ) -> Result<RosterEntry> {
        let prefix = format!("temp_scans/{roster_token}/{}", entry.student_id);
        let urls = self.stage(&prefix).await?;

        let updated = rosters.set_entry_uploaded(&entry.id, &urls).await?;
        info!(entry_id = %entry.id, student = entry.label(), images = urls.len(),
              "roster entry committed");
        self.buffer.clear();
        Ok(updated)
    }

    /// Stage the buffer into storage under a prefix, removing anything
    /// already staged if a later upload fails.
    async fn stage(&self, prefix: &str) -> Result<Vec<String>> {
        if self.buffer.is_empty() {
            return Err(crate::AppError::Validation(
                "no buffered images to commit".into(),
            ));
        }

        let mut staged: Vec<String> = Vec::with_capacity(self.buffer.len());
        for image in &self.buffer {
            let path = format!("{prefix}/{}", sanitize_file_name(&image.file_name));
            if let Err(err) = self.store.put(&path, image.bytes.clone()).await {
                // Roll the staged objects back so the abort leaves no litter.
                if let Err(cleanup_err) = self.store.remove(&staged).await {
                    warn!(%cleanup_err, "failed to clean up staged uploads after abort");
                }
                return Err(err);
            }
            staged.push(path);
        }

        Ok(staged
            .iter()
            .map(|path| self.store.public_url_of(path))
            .collect())
    }

    /// Remove one previously-uploaded image from storage and from the
    /// session's path list.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Storage` when the object cannot be removed, or
    /// `AppError::State` when the session is terminal.
    pub async fn remove_uploaded(
        &self,
        sessions: &SessionRepo,
        session: &CaptureSession,
        url: &str,
    ) -> Result<CaptureSession> {
        if let Some(path) = self.store.path_from_url(url) {
            self.store.remove(std::slice::from_ref(&path)).await?;
        } else {
            warn!(url, "could not derive object path from url; skipping storage delete");
        }
        sessions.remove_image_path(&session.id, url).await
    }
}

/// Direct-upload variant: skip the buffer, sanitize names, stage files, and
/// return the public URLs for a preloaded session.
///
/// # Errors
///
/// Returns `AppError::Validation` when `files` is empty, or
/// `AppError::Storage` on upload failure (staged objects are removed).
pub async fn stage_direct<S: ObjectStore>(
    store: &S,
    token: &str,
    files: &[BufferedImage],
) -> Result<Vec<String>> {
    let mut client = CaptureClient {
        store,
        buffer: files.to_vec(),
    };
    let prefix = format!("temp_scans/{token}");
    let urls = client.stage(&prefix).await?;
    client.buffer.clear();
    Ok(urls)
}
