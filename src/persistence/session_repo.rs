//! Capture session repository for `SQLite` persistence.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::models::session::{CaptureSession, SessionStatus};
use crate::{AppError, Result};

use super::SqlitePool;

/// Repository wrapper around `SQLite` for capture session records.
#[derive(Clone)]
pub struct SessionRepo {
    pool: Arc<SqlitePool>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    token: String,
    exam_id: String,
    student_id: Option<String>,
    student_exam_id: Option<String>,
    student_name: Option<String>,
    student_number: Option<String>,
    status: String,
    uploaded_image_paths: String,
    error_message: Option<String>,
    expires_at: String,
    created_at: String,
    updated_at: String,
}

impl SessionRow {
    /// Convert a database row into the domain model.
    fn into_session(self) -> Result<CaptureSession> {
        let status = parse_session_status(&self.status)?;
        let uploaded_image_paths: Vec<String> = serde_json::from_str(&self.uploaded_image_paths)
            .map_err(|e| AppError::Db(format!("invalid uploaded_image_paths: {e}")))?;
        Ok(CaptureSession {
            id: self.id,
            token: self.token,
            exam_id: self.exam_id,
            student_id: self.student_id,
            student_exam_id: self.student_exam_id,
            student_name: self.student_name,
            student_number: self.student_number,
            status,
            uploaded_image_paths,
            error_message: self.error_message,
            expires_at: parse_timestamp(&self.expires_at, "expires_at")?,
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

fn parse_session_status(s: &str) -> Result<SessionStatus> {
    match s {
        "pending" => Ok(SessionStatus::Pending),
        "uploaded" => Ok(SessionStatus::Uploaded),
        "processing" => Ok(SessionStatus::Processing),
        "completed" => Ok(SessionStatus::Completed),
        "failed" => Ok(SessionStatus::Failed),
        "cancelled" => Ok(SessionStatus::Cancelled),
        other => Err(AppError::Db(format!("invalid session status: {other}"))),
    }
}

fn session_status_str(s: SessionStatus) -> &'static str {
    match s {
        SessionStatus::Pending => "pending",
        SessionStatus::Uploaded => "uploaded",
        SessionStatus::Processing => "processing",
        SessionStatus::Completed => "completed",
        SessionStatus::Failed => "failed",
        SessionStatus::Cancelled => "cancelled",
    }
}

fn paths_json(paths: &[String]) -> Result<String> {
    serde_json::to_string(paths)
        .map_err(|e| AppError::Db(format!("failed to encode image paths: {e}")))
}

impl SessionRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    /// Insert a new capture session record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the database insert fails.
    pub async fn create(&self, session: &CaptureSession) -> Result<CaptureSession> {
        sqlx::query(
            "INSERT INTO capture_session (id, token, exam_id, student_id, student_exam_id,
             student_name, student_number, status, uploaded_image_paths, error_message,
             expires_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )
        .bind(&session.id)
        .bind(&session.token)
        .bind(&session.exam_id)
        .bind(&session.student_id)
        .bind(&session.student_exam_id)
        .bind(&session.student_name)
        .bind(&session.student_number)
        .bind(session_status_str(session.status))
        .bind(paths_json(&session.uploaded_image_paths)?)
        .bind(&session.error_message)
        .bind(session.expires_at.to_rfc3339())
        .bind(session.created_at.to_rfc3339())
        .bind(session.updated_at.to_rfc3339())
        .execute(self.pool.as_ref())
        .await?;
        self.get_by_id(&session.id).await
    }

    /// Retrieve a session by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the session does not exist.
    pub async fn get_by_id(&self, id: &str) -> Result<CaptureSession> {
        let row: Option<SessionRow> =
            sqlx::query_as("SELECT * FROM capture_session WHERE id = ?1")
                .bind(id)
                .fetch_optional(self.pool.as_ref())
                .await?;
        row.ok_or_else(|| AppError::NotFound(format!("session {id} not found")))?
            .into_session()
    }

    /// Retrieve a session by its hand-off token.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no session carries the token.
    pub async fn get_by_token(&self, token: &str) -> Result<CaptureSession> {
        let row: Option<SessionRow> =
            sqlx::query_as("SELECT * FROM capture_session WHERE token = ?1")
                .bind(token)
                .fetch_optional(self.pool.as_ref())
                .await?;
        row.ok_or_else(|| AppError::NotFound("session not found for token".into()))?
            .into_session()
    }

    /// Bind the provisioned student and student-exam rows to a session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn bind_student(
        &self,
        id: &str,
        student_id: &str,
        student_exam_id: &str,
    ) -> Result<CaptureSession> {
        sqlx::query(
            "UPDATE capture_session SET student_id = ?2, student_exam_id = ?3, updated_at = ?4
             WHERE id = ?1",
        )
        .bind(id)
        .bind(student_id)
        .bind(student_exam_id)
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool.as_ref())
        .await?;
        self.get_by_id(id).await
    }

    /// Update session status, respecting the state machine.
    ///
    /// # Errors
    ///
    /// Returns `AppError::State` if the transition is not permitted; the
    /// stored row is left unchanged. Returns `AppError::Db` on persistence
    /// failure.
    pub async fn update_status(&self, id: &str, status: SessionStatus) -> Result<CaptureSession> {
        let current = self.get_by_id(id).await?;
        if !current.can_transition_to(status) {
            return Err(AppError::State(format!(
                "illegal transition {} -> {}",
                session_status_str(current.status),
                session_status_str(status)
            )));
        }
        sqlx::query("UPDATE capture_session SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(session_status_str(status))
            .bind(Utc::now().to_rfc3339())
            .execute(self.pool.as_ref())
            .await?;
        self.get_by_id(id).await
    }

    /// Append uploaded image URLs; append-only while the session is live.
    ///
    /// # Errors
    ///
    /// Returns `AppError::State` when the session is already terminal.
    pub async fn append_image_paths(&self, id: &str, urls: &[String]) -> Result<CaptureSession> {
        let current = self.get_by_id(id).await?;
        if current.status.is_terminal() {
            return Err(AppError::State(
                "cannot append images to a terminal session".into(),
            ));
        }
        let mut paths = current.uploaded_image_paths;
        paths.extend(urls.iter().cloned());
        sqlx::query(
            "UPDATE capture_session SET uploaded_image_paths = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(paths_json(&paths)?)
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool.as_ref())
        .await?;
        self.get_by_id(id).await
    }

    /// Remove a single uploaded image URL from a live session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::State` when the session is already terminal.
    pub async fn remove_image_path(&self, id: &str, url: &str) -> Result<CaptureSession> {
        let current = self.get_by_id(id).await?;
        if current.status.is_terminal() {
            return Err(AppError::State(
                "cannot remove images from a terminal session".into(),
            ));
        }
        let paths: Vec<String> = current
            .uploaded_image_paths
            .into_iter()
            .filter(|p| p != url)
            .collect();
        sqlx::query(
            "UPDATE capture_session SET uploaded_image_paths = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(paths_json(&paths)?)
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool.as_ref())
        .await?;
        self.get_by_id(id).await
    }

    /// Record a terminal failure with its reason.
    ///
    /// # Errors
    ///
    /// Returns `AppError::State` if the session cannot transition to
    /// `failed`, or `AppError::Db` on persistence failure.
    pub async fn set_failed(&self, id: &str, message: &str) -> Result<CaptureSession> {
        let current = self.get_by_id(id).await?;
        if !current.can_transition_to(SessionStatus::Failed) {
            return Err(AppError::State(format!(
                "illegal transition {} -> failed",
                session_status_str(current.status)
            )));
        }
        sqlx::query(
            "UPDATE capture_session SET status = 'failed', error_message = ?2, updated_at = ?3
             WHERE id = ?1",
        )
        .bind(id)
        .bind(message)
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool.as_ref())
        .await?;
        self.get_by_id(id).await
    }

    /// List sessions sitting in `uploaded`, ready for the worker sweep.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_uploaded(&self) -> Result<Vec<CaptureSession>> {
        let rows: Vec<SessionRow> = sqlx::query_as(
            "SELECT * FROM capture_session WHERE status = 'uploaded' ORDER BY created_at",
        )
        .fetch_all(self.pool.as_ref())
        .await?;
        rows.into_iter().map(SessionRow::into_session).collect()
    }
}
