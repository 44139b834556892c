//! Multi-student coordination: one token, N independent roster entries.

use futures_util::future::join_all;
use tracing::{info, info_span, warn};

use crate::extraction::Extractor;
use crate::models::roster::{EntryStatus, RosterEntry, RosterSession, RosterStatus};
use crate::models::session::StudentIdentity;
use crate::persistence::exam_repo::ExamRepo;
use crate::persistence::roster_repo::RosterRepo;
use crate::storage::ObjectStore;
use crate::{AppError, Result};

use super::engine::{ReconcileOutcome, ReconciliationEngine};

/// Result of sweeping one roster: per-entry outcomes, failures isolated.
#[derive(Debug, Default)]
pub struct SweepSummary {
    /// Entries that reconciled successfully.
    pub processed: Vec<(String, ReconcileOutcome)>,
    /// Entries whose pipeline failed, with the recorded reason.
    pub failed: Vec<(String, String)>,
    /// Entries skipped because they were not in `uploaded`.
    pub skipped: usize,
}

/// Coordinates a roster of students sharing one capture token.
pub struct MultiSessionCoordinator<'a> {
    rosters: &'a RosterRepo,
    exams: &'a ExamRepo,
}

impl<'a> MultiSessionCoordinator<'a> {
    /// Wire up a coordinator instance.
    #[must_use]
    pub fn new(rosters: &'a RosterRepo, exams: &'a ExamRepo) -> Self {
        Self { rosters, exams }
    }

    /// Create a roster session with one entry per identity.
    ///
    /// Each identity gets its own provisioned student and student-exam
    /// rows, so entries upload and reconcile fully independently.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` when no identity is usable, or
    /// `AppError::Db` on persistence failure.
    pub async fn create_roster(
        &self,
        exam_id: &str,
        identities: &[StudentIdentity],
        ttl_minutes: i64,
    ) -> Result<(RosterSession, Vec<RosterEntry>)> {
        let span = info_span!("create_roster", exam_id);
        let _guard = span.enter();

        let usable: Vec<&StudentIdentity> = identities
            .iter()
            .filter(|identity| identity.validate().is_ok())
            .collect();
        if usable.is_empty() {
            return Err(AppError::Validation(
                "a roster needs at least one student with a name or number".into(),
            ));
        }

        let roster = self
            .rosters
            .create(&RosterSession::new(exam_id.to_owned(), ttl_minutes))
            .await?;

        let mut entries = Vec::with_capacity(usable.len());
        for identity in usable {
            let (student_id, student_exam_id) =
                self.exams.provision_student_exam(exam_id, identity).await?;
            let entry = self
                .rosters
                .create_entry(&RosterEntry::new(
                    roster.id.clone(),
                    student_id,
                    student_exam_id,
                    identity,
                ))
                .await?;
            entries.push(entry);
        }

        info!(roster_id = %roster.id, students = entries.len(), "roster created");
        Ok((roster, entries))
    }

    /// Whether every entry has uploaded — the "ready to process" predicate.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the entry query fails.
    pub async fn ready(&self, roster_id: &str) -> Result<bool> {
        let entries = self.rosters.list_entries(roster_id).await?;
        Ok(!entries.is_empty()
            && entries
                .iter()
                .all(|entry| entry.status == EntryStatus::Uploaded))
    }

    /// Flip the roster wrapper to `completed` once every entry uploaded.
    /// A no-op while any entry is still pending.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the status update fails.
    pub async fn refresh_status(&self, roster_id: &str) -> Result<RosterSession> {
        if self.ready(roster_id).await? {
            return self
                .rosters
                .update_status(roster_id, RosterStatus::Completed)
                .await;
        }
        self.rosters.get_by_id(roster_id).await
    }

    /// One student's own polling view: their entry slot, never the roster.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the entry does not exist.
    pub async fn entry_status(&self, entry_id: &str) -> Result<EntryStatus> {
        Ok(self.rosters.get_entry(entry_id).await?.status)
    }

    /// Reconcile every uploaded-but-unprocessed entry of a roster.
    ///
    /// Entries run concurrently; one student's failure never blocks
    /// another's — it is recorded on that entry and in the summary.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the roster or its entries cannot be read;
    /// per-entry pipeline failures land in [`SweepSummary::failed`].
    pub async fn sweep<S: ObjectStore, E: Extractor>(
        &self,
        engine: &ReconciliationEngine<'_, S, E>,
        roster_id: &str,
    ) -> Result<SweepSummary> {
        let roster = self.rosters.get_by_id(roster_id).await?;
        let entries = self.rosters.list_entries(roster_id).await?;

        let mut summary = SweepSummary::default();
        let mut runnable: Vec<RosterEntry> = Vec::new();
        for entry in entries {
            if entry.status == EntryStatus::Uploaded {
                runnable.push(entry);
            } else {
                summary.skipped += 1;
            }
        }

        let results = join_all(runnable.iter().map(|entry| {
            let entry_id = entry.id.clone();
            let exam_id = roster.exam_id.clone();
            let rosters = self.rosters;
            async move {
                let outcome = engine.process_entry(rosters, &exam_id, &entry_id).await;
                (entry_id, outcome)
            }
        }))
        .await;

        for (entry_id, result) in results {
            match result {
                Ok(outcome) => summary.processed.push((entry_id, outcome)),
                Err(err) => {
                    warn!(entry_id, %err, "roster entry reconciliation failed");
                    summary.failed.push((entry_id, err.to_string()));
                }
            }
        }

        info!(
            roster_id,
            processed = summary.processed.len(),
            failed = summary.failed.len(),
            skipped = summary.skipped,
            "roster sweep finished"
        );
        Ok(summary)
    }
}
