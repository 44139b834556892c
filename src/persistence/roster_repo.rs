//! Roster repository for multi-student capture sessions.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::models::roster::{EntryStatus, RosterEntry, RosterSession, RosterStatus};
use crate::{AppError, Result};

use super::SqlitePool;

/// Repository wrapper around `SQLite` for roster records.
#[derive(Clone)]
pub struct RosterRepo {
    pool: Arc<SqlitePool>,
}

#[derive(sqlx::FromRow)]
struct RosterRow {
    id: String,
    token: String,
    exam_id: String,
    status: String,
    expires_at: String,
    created_at: String,
}

#[derive(sqlx::FromRow)]
struct EntryRow {
    id: String,
    roster_id: String,
    student_id: String,
    student_exam_id: String,
    display_name: Option<String>,
    student_number: Option<String>,
    status: String,
    uploaded_image_paths: String,
    error_message: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RosterRow {
    fn into_roster(self) -> Result<RosterSession> {
        Ok(RosterSession {
            id: self.id,
            token: self.token,
            exam_id: self.exam_id,
            status: parse_roster_status(&self.status)?,
            expires_at: parse_timestamp(&self.expires_at, "expires_at")?,
            created_at: parse_timestamp(&self.created_at, "created_at")?,
        })
    }
}

impl EntryRow {
    fn into_entry(self) -> Result<RosterEntry> {
        let uploaded_image_paths: Vec<String> = serde_json::from_str(&self.uploaded_image_paths)
            .map_err(|e| AppError::Db(format!("invalid uploaded_image_paths: {e}")))?;
        Ok(RosterEntry {
            id: self.id,
            roster_id: self.roster_id,
            student_id: self.student_id,
            student_exam_id: self.student_exam_id,
            display_name: self.display_name,
            student_number: self.student_number,
            status: parse_entry_status(&self.status)?,
            uploaded_image_paths,
            error_message: self.error_message,
            created_at: parse_timestamp(&self.created_at, "created_at")?,
            updated_at: parse_timestamp(&self.updated_at, "updated_at")?,
        })
    }
}

fn parse_timestamp(s: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Db(format!("invalid {field}: {e}")))
}

fn parse_roster_status(s: &str) -> Result<RosterStatus> {
    match s {
        "pending" => Ok(RosterStatus::Pending),
        "completed" => Ok(RosterStatus::Completed),
        "cancelled" => Ok(RosterStatus::Cancelled),
        other => Err(AppError::Db(format!("invalid roster status: {other}"))),
    }
}

fn roster_status_str(s: RosterStatus) -> &'static str {
    match s {
        RosterStatus::Pending => "pending",
        RosterStatus::Completed => "completed",
        RosterStatus::Cancelled => "cancelled",
    }
}

fn parse_entry_status(s: &str) -> Result<EntryStatus> {
    match s {
        "pending" => Ok(EntryStatus::Pending),
        "uploaded" => Ok(EntryStatus::Uploaded),
        "processing" => Ok(EntryStatus::Processing),
        "completed" => Ok(EntryStatus::Completed),
        "failed" => Ok(EntryStatus::Failed),
        other => Err(AppError::Db(format!("invalid entry status: {other}"))),
    }
}

fn entry_status_str(s: EntryStatus) -> &'static str {
    match s {
        EntryStatus::Pending => "pending",
        EntryStatus::Uploaded => "uploaded",
        EntryStatus::Processing => "processing",
        EntryStatus::Completed => "completed",
        EntryStatus::Failed => "failed",
    }
}

impl RosterRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    /// Insert a roster session record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn create(&self, roster: &RosterSession) -> Result<RosterSession> {
        sqlx::query(
            "INSERT INTO roster_session (id, token, exam_id, status, expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&roster.id)
        .bind(&roster.token)
        .bind(&roster.exam_id)
        .bind(roster_status_str(roster.status))
        .bind(roster.expires_at.to_rfc3339())
        .bind(roster.created_at.to_rfc3339())
        .execute(self.pool.as_ref())
        .await?;
        self.get_by_id(&roster.id).await
    }

    /// Insert one roster entry.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn create_entry(&self, entry: &RosterEntry) -> Result<RosterEntry> {
        let paths = serde_json::to_string(&entry.uploaded_image_paths)
            .map_err(|e| AppError::Db(format!("failed to encode image paths: {e}")))?;
        sqlx::query(
            "INSERT INTO roster_entry (id, roster_id, student_id, student_exam_id, display_name,
             student_number, status, uploaded_image_paths, error_message, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(&entry.id)
        .bind(&entry.roster_id)
        .bind(&entry.student_id)
        .bind(&entry.student_exam_id)
        .bind(&entry.display_name)
        .bind(&entry.student_number)
        .bind(entry_status_str(entry.status))
        .bind(paths)
        .bind(&entry.error_message)
        .bind(entry.created_at.to_rfc3339())
        .bind(entry.updated_at.to_rfc3339())
        .execute(self.pool.as_ref())
        .await?;
        self.get_entry(&entry.id).await
    }

    /// Retrieve a roster by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the roster does not exist.
    pub async fn get_by_id(&self, id: &str) -> Result<RosterSession> {
        let row: Option<RosterRow> = sqlx::query_as("SELECT * FROM roster_session WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;
        row.ok_or_else(|| AppError::NotFound(format!("roster {id} not found")))?
            .into_roster()
    }

    /// Retrieve a roster by its shared token.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no roster carries the token.
    pub async fn get_by_token(&self, token: &str) -> Result<RosterSession> {
        let row: Option<RosterRow> =
            sqlx::query_as("SELECT * FROM roster_session WHERE token = ?1")
                .bind(token)
                .fetch_optional(self.pool.as_ref())
                .await?;
        row.ok_or_else(|| AppError::NotFound("roster not found for token".into()))?
            .into_roster()
    }

    /// Retrieve one entry by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the entry does not exist.
    pub async fn get_entry(&self, id: &str) -> Result<RosterEntry> {
        let row: Option<EntryRow> = sqlx::query_as("SELECT * FROM roster_entry WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;
        row.ok_or_else(|| AppError::NotFound(format!("roster entry {id} not found")))?
            .into_entry()
    }

    /// List all entries of a roster, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_entries(&self, roster_id: &str) -> Result<Vec<RosterEntry>> {
        let rows: Vec<EntryRow> =
            sqlx::query_as("SELECT * FROM roster_entry WHERE roster_id = ?1 ORDER BY created_at")
                .bind(roster_id)
                .fetch_all(self.pool.as_ref())
                .await?;
        rows.into_iter().map(EntryRow::into_entry).collect()
    }

    /// Update one entry's status slot, respecting the entry state machine.
    ///
    /// # Errors
    ///
    /// Returns `AppError::State` if the transition is not permitted; the
    /// stored row is left unchanged.
    pub async fn update_entry_status(&self, id: &str, status: EntryStatus) -> Result<RosterEntry> {
        let current = self.get_entry(id).await?;
        if !current.status.can_transition_to(status) {
            return Err(AppError::State(format!(
                "illegal entry transition {} -> {}",
                entry_status_str(current.status),
                entry_status_str(status)
            )));
        }
        sqlx::query("UPDATE roster_entry SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(entry_status_str(status))
            .bind(Utc::now().to_rfc3339())
            .execute(self.pool.as_ref())
            .await?;
        self.get_entry(id).await
    }

    /// Record one entry's terminal failure with its reason.
    ///
    /// # Errors
    ///
    /// Returns `AppError::State` if the entry cannot transition to `failed`.
    pub async fn set_entry_failed(&self, id: &str, message: &str) -> Result<RosterEntry> {
        let current = self.get_entry(id).await?;
        if !current.status.can_transition_to(EntryStatus::Failed) {
            return Err(AppError::State(format!(
                "illegal entry transition {} -> failed",
                entry_status_str(current.status)
            )));
        }
        sqlx::query(
            "UPDATE roster_entry SET status = 'failed', error_message = ?2, updated_at = ?3
             WHERE id = ?1",
        )
        .bind(id)
        .bind(message)
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool.as_ref())
        .await?;
        self.get_entry(id).await
    }

    /// Replace one entry's image URL list and flip it to `uploaded`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::State` if the entry is not `pending`.
    pub async fn set_entry_uploaded(&self, id: &str, urls: &[String]) -> Result<RosterEntry> {
        let current = self.get_entry(id).await?;
        if !current.status.can_transition_to(EntryStatus::Uploaded) {
            return Err(AppError::State(format!(
                "illegal entry transition {} -> uploaded",
                entry_status_str(current.status)
            )));
        }
        let paths = serde_json::to_string(urls)
            .map_err(|e| AppError::Db(format!("failed to encode image paths: {e}")))?;
        sqlx::query(
            "UPDATE roster_entry SET status = 'uploaded', uploaded_image_paths = ?2,
             updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(paths)
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool.as_ref())
        .await?;
        self.get_entry(id).await
    }

    /// Update the roster wrapper status.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn update_status(&self, id: &str, status: RosterStatus) -> Result<RosterSession> {
        sqlx::query("UPDATE roster_session SET status = ?2 WHERE id = ?1")
            .bind(id)
            .bind(roster_status_str(status))
            .execute(self.pool.as_ref())
            .await?;
        self.get_by_id(id).await
    }

    /// List rosters ready for the worker sweep: no entry still waiting for
    /// its upload, at least one uploaded-but-unprocessed entry, wrapper not
    /// cancelled.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_ready(&self) -> Result<Vec<RosterSession>> {
        let rows: Vec<RosterRow> = sqlx::query_as(
            "SELECT rs.* FROM roster_session rs
             WHERE rs.status != 'cancelled'
               AND NOT EXISTS (
                   SELECT 1 FROM roster_entry re
                   WHERE re.roster_id = rs.id AND re.status = 'pending'
               )
               AND EXISTS (
                   SELECT 1 FROM roster_entry re
                   WHERE re.roster_id = rs.id AND re.status = 'uploaded'
               )",
        )
        .fetch_all(self.pool.as_ref())
        .await?;
        rows.into_iter().map(RosterRow::into_roster).collect()
    }
}
