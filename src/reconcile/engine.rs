//! Reconciliation engine: extraction, text-keyed matching, persistence.
//!
//! Drives one capture (a session or a roster entry) from `uploaded` to a
//! terminal status: downloads the captured images, submits them to the
//! extraction service, matches the returned manifest against a fresh
//! canonical lookup, replaces the student's answer set, and recalculates
//! the point aggregate.

use bytes::Bytes;
use chrono::Utc;
use tracing::{info, info_span, warn, Instrument};

use crate::capture::client::sanitize_file_name;
use crate::extraction::{ExtractionArchive, Extractor, ImagePart};
use crate::models::exam::AnswerRecord;
use crate::models::roster::{EntryStatus, RosterEntry};
use crate::models::session::{CaptureSession, SessionStatus};
use crate::persistence::answer_repo::AnswerRepo;
use crate::persistence::exam_repo::ExamRepo;
use crate::persistence::roster_repo::RosterRepo;
use crate::persistence::session_repo::SessionRepo;
use crate::storage::ObjectStore;
use crate::{AppError, Result};

/// Counters describing one reconciliation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Answer rows persisted.
    pub inserted: usize,
    /// Manifest pairs that resolved to no canonical sub-question.
    pub unmatched: usize,
    /// Referenced media filenames absent from the archive.
    pub missing_media: usize,
}

/// Engine wiring: storage, extraction seam, and the typed repos.
pub struct ReconciliationEngine<'a, S: ObjectStore, E: Extractor> {
    store: &'a S,
    extractor: &'a E,
    sessions: &'a SessionRepo,
    exams: &'a ExamRepo,
    answers: &'a AnswerRepo,
    insert_batch_size: usize,
}

impl<'a, S: ObjectStore, E: Extractor> ReconciliationEngine<'a, S, E> {
    /// Wire up an engine instance.
    #[must_use]
    pub fn new(
        store: &'a S,
        extractor: &'a E,
        sessions: &'a SessionRepo,
        exams: &'a ExamRepo,
        answers: &'a AnswerRepo,
        insert_batch_size: usize,
    ) -> Self {
        Self {
            store,
            extractor,
            sessions,
            exams,
            answers,
            insert_batch_size,
        }
    }

    /// Run the full pipeline for one uploaded session.
    ///
    /// Any unrecoverable error marks the session `failed` with the captured
    /// message before propagating, so polling clients can render a specific
    /// reason.
    ///
    /// # Errors
    ///
    /// Propagates the first pipeline error after recording it on the
    /// session row.
    pub async fn process_session(&self, session_id: &str) -> Result<ReconcileOutcome> {
        let span = info_span!("process_session", session_id);
        match self.run_session(session_id).instrument(span).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                let message = err.to_string();
                if let Err(fail_err) = self.sessions.set_failed(session_id, &message).await {
                    warn!(session_id, %fail_err, "could not record session failure");
                }
                Err(err)
            }
        }
    }

    async fn run_session(&self, session_id: &str) -> Result<ReconcileOutcome> {
        let session = self.sessions.get_by_id(session_id).await?;
        let session = self
            .sessions
            .update_status(&session.id, SessionStatus::Processing)
            .await?;

        if session.is_expired() {
            return Err(AppError::Expired("capture session has expired".into()));
        }
        let student_exam_id = session.student_exam_id.clone().ok_or_else(|| {
            AppError::Validation(format!(
                "session {} has no student_exam_id",
                session.id
            ))
        })?;

        if session.uploaded_image_paths.is_empty() {
            info!(session_id, "no images uploaded; completing without extraction");
            self.sessions
                .update_status(&session.id, SessionStatus::Completed)
                .await?;
            return Ok(ReconcileOutcome::default());
        }

        let outcome = self
            .extract_and_persist(
                &session.exam_id,
                &student_exam_id,
                &session.uploaded_image_paths,
            )
            .await?;

        // The capture surface may have cancelled the session while the
        // extraction call was in flight. The answer rows are already
        // committed (at-least-once semantics); only the status write is
        // suppressed here.
        let current = self.sessions.get_by_id(&session.id).await?;
        if current.status == SessionStatus::Cancelled {
            warn!(session_id, "session cancelled mid-flight; discarding completion");
            return Ok(outcome);
        }
        self.sessions
            .update_status(&session.id, SessionStatus::Completed)
            .await?;

        self.cleanup_temp(&session).await;
        info!(
            session_id,
            inserted = outcome.inserted,
            unmatched = outcome.unmatched,
            missing_media = outcome.missing_media,
            "session reconciliation completed"
        );
        Ok(outcome)
    }

    /// Run the pipeline for one roster entry, flipping only that entry's
    /// status slot. Sibling entries are unaffected by this entry's failure.
    ///
    /// # Errors
    ///
    /// Propagates the first pipeline error after recording it on the entry
    /// row.
    pub async fn process_entry(
        &self,
        rosters: &RosterRepo,
        exam_id: &str,
        entry_id: &str,
    ) -> Result<ReconcileOutcome> {
        let span = info_span!("process_entry", entry_id);
        match self
            .run_entry(rosters, exam_id, entry_id)
            .instrument(span)
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                let message = err.to_string();
                if let Err(fail_err) = rosters.set_entry_failed(entry_id, &message).await {
                    warn!(entry_id, %fail_err, "could not record entry failure");
                }
                Err(err)
            }
        }
    }

    async fn run_entry(
        &self,
        rosters: &RosterRepo,
        exam_id: &str,
        entry_id: &str,
    ) -> Result<ReconcileOutcome> {
        let entry: RosterEntry = rosters
            .update_entry_status(entry_id, EntryStatus::Processing)
            .await?;

        let outcome = self
            .extract_and_persist(exam_id, &entry.student_exam_id, &entry.uploaded_image_paths)
            .await?;

        rosters
            .update_entry_status(entry_id, EntryStatus::Completed)
            .await?;
        info!(
            entry_id,
            student = entry.label(),
            inserted = outcome.inserted,
            "entry reconciliation completed"
        );
        Ok(outcome)
    }

    /// Shared core: download, extract, match, persist, recalculate.
    async fn extract_and_persist(
        &self,
        exam_id: &str,
        student_exam_id: &str,
        image_urls: &[String],
    ) -> Result<ReconcileOutcome> {
        let images = self.download_images(image_urls).await?;
        let skeleton = self.exams.skeleton(exam_id).await?;
        let raw_archive = self.extractor.submit(images, &skeleton).await?;
        let archive = ExtractionArchive::from_bytes(&raw_archive)?;
        self.reconcile_manifest(exam_id, student_exam_id, &archive)
            .await
    }

    /// Fetch the captured images back out of storage. Individual download
    /// failures are logged and skipped; zero usable images aborts.
    async fn download_images(&self, image_urls: &[String]) -> Result<Vec<ImagePart>> {
        let mut images = Vec::with_capacity(image_urls.len());
        for url in image_urls {
            let Some(path) = self.store.path_from_url(url) else {
                warn!(%url, "could not derive object path from url; skipping image");
                continue;
            };
            match self.store.get(&path).await {
                Ok(bytes) => {
                    let file_name = path.rsplit('/').next().unwrap_or(&path).to_owned();
                    images.push(ImagePart { file_name, bytes });
                }
                Err(err) => {
                    warn!(%url, %err, "failed to download captured image; skipping");
                }
            }
        }
        if images.is_empty() {
            return Err(AppError::Storage(
                "no captured images could be downloaded".into(),
            ));
        }
        Ok(images)
    }

    /// Match the manifest against a fresh canonical lookup and replace the
    /// student's answer set.
    async fn reconcile_manifest(
        &self,
        exam_id: &str,
        student_exam_id: &str,
        archive: &ExtractionArchive,
    ) -> Result<ReconcileOutcome> {
        // Rebuilt here, not earlier, so an exam edited mid-flight cannot
        // leave stale sub-question IDs in the match.
        let lookup = self.exams.canonical_lookup(exam_id).await?;

        let mut records: Vec<AnswerRecord> = Vec::new();
        let mut unmatched = 0usize;
        let mut missing_media = 0usize;

        for question in &archive.manifest().questions {
            for sub in &question.sub_questions {
                let Some(sub_question_id) =
                    lookup.resolve(question.question_number, &sub.sub_q_text_content)
                else {
                    // Never guessed: the service echoes the skeleton text
                    // verbatim, so a miss means the exam changed.
                    warn!(
                        question_number = question.question_number,
                        sub_q = %sub.sub_q_text_content,
                        "no canonical sub-question match; dropping answer"
                    );
                    unmatched += 1;
                    continue;
                };

                let Some(extracted) = &sub.student_answers else {
                    continue;
                };

                let answer_visual = match &extracted.answer_visual {
                    Some(file_name) => {
                        match self
                            .upload_answer_visual(student_exam_id, file_name, archive)
                            .await
                        {
                            Some(url) => Some(url),
                            None => {
                                missing_media += 1;
                                None
                            }
                        }
                    }
                    None => None,
                };

                records.push(AnswerRecord {
                    student_exam_id: student_exam_id.to_owned(),
                    sub_question_id: sub_question_id.to_owned(),
                    answer_text: extracted.answer_text.clone(),
                    orig_answer_text: extracted.answer_text.clone(),
                    answer_visual,
                });
            }
        }

        let inserted = self
            .answers
            .replace_for_student_exam(student_exam_id, &records, self.insert_batch_size)
            .await?;
        self.answers
            .recalculate_total_points(student_exam_id)
            .await?;

        Ok(ReconcileOutcome {
            inserted,
            unmatched,
            missing_media,
        })
    }

    /// Move one referenced visual from the archive into permanent storage.
    /// Returns `None` when the file is absent or the upload fails — a
    /// missing image never fails the whole batch.
    async fn upload_answer_visual(
        &self,
        student_exam_id: &str,
        file_name: &str,
        archive: &ExtractionArchive,
    ) -> Option<String> {
        let Some(bytes) = archive.media(file_name) else {
            warn!(file_name, "visual referenced in manifest but not found in archive");
            return None;
        };

        let path = format!(
            "answers/{student_exam_id}/{}_{}",
            Utc::now().timestamp_millis(),
            sanitize_file_name(file_name)
        );
        match self.store.put(&path, Bytes::copy_from_slice(bytes)).await {
            Ok(()) => Some(self.store.public_url_of(&path)),
            Err(err) => {
                warn!(file_name, %err, "visual upload failed; persisting answer without it");
                None
            }
        }
    }

    /// Best-effort removal of the session's temp uploads. Failures are
    /// logged and never surfaced.
    async fn cleanup_temp(&self, session: &CaptureSession) {
        let paths: Vec<String> = session
            .uploaded_image_paths
            .iter()
            .filter_map(|url| self.store.path_from_url(url))
            .collect();
        if paths.is_empty() {
            return;
        }
        if let Err(err) = self.store.remove(&paths).await {
            warn!(session_id = %session.id, %err, "temp file cleanup failed");
        }
    }
}
