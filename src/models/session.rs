//! Capture session model and lifecycle helpers.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppError, Result};

/// Lifecycle status for a capture session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Session created, waiting for the capture surface to upload images.
    Pending,
    /// Images landed in storage; ready for extraction.
    Uploaded,
    /// Extraction and reconciliation in flight.
    Processing,
    /// Answers persisted; terminal.
    Completed,
    /// Pipeline aborted with a recorded reason; terminal.
    Failed,
    /// Explicitly cancelled by the operator; terminal.
    Cancelled,
}

impl SessionStatus {
    /// Whether this status admits no further forward transition.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Who the captured images belong to. At least one field must be present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentIdentity {
    /// Full display name.
    pub name: Option<String>,
    /// Institutional student number.
    pub number: Option<String>,
}

impl StudentIdentity {
    /// Build an identity from raw form inputs, trimming whitespace.
    #[must_use]
    pub fn new(name: Option<&str>, number: Option<&str>) -> Self {
        let clean = |v: Option<&str>| {
            v.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned)
        };
        Self {
            name: clean(name),
            number: clean(number),
        }
    }

    /// Reject identities that carry neither a name nor a number.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` when both fields are absent.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_none() && self.number.is_none() {
            return Err(AppError::Validation(
                "a student name or student number is required".into(),
            ));
        }
        Ok(())
    }

    /// Best label for log lines: name, then number, then a placeholder.
    #[must_use]
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .or(self.number.as_deref())
            .unwrap_or("unknown")
    }
}

/// Capture session domain entity persisted in `SQLite`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct CaptureSession {
    /// Unique record identifier.
    pub id: String,
    /// Opaque token embedded in the hand-off URL.
    pub token: String,
    /// Exam the captured answers belong to.
    pub exam_id: String,
    /// Student row provisioned at session creation.
    pub student_id: Option<String>,
    /// Student-exam row the reconciled answers attach to.
    pub student_exam_id: Option<String>,
    /// Display name supplied at creation.
    pub student_name: Option<String>,
    /// Student number supplied at creation.
    pub student_number: Option<String>,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// Public URLs of uploaded images, append-only until terminal.
    pub uploaded_image_paths: Vec<String>,
    /// Reason recorded when the pipeline fails.
    pub error_message: Option<String>,
    /// Hard expiry; lookups past this instant fail regardless of status.
    pub expires_at: DateTime<Utc>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl CaptureSession {
    /// Construct a pending session with a fresh token and the given lifetime.
    #[must_use]
    pub fn new(exam_id: String, identity: &StudentIdentity, ttl_minutes: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            token: Uuid::new_v4().to_string(),
            exam_id,
            student_id: None,
            student_exam_id: None,
            student_name: identity.name.clone(),
            student_number: identity.number.clone(),
            status: SessionStatus::Pending,
            uploaded_image_paths: Vec::new(),
            error_message: None,
            expires_at: now + Duration::minutes(ttl_minutes),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the expiry deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }

    /// Determine whether a lifecycle transition is permitted.
    ///
    /// Forward edges: `pending → uploaded → processing → {completed, failed}`.
    /// Any status other than `cancelled` may transition to `cancelled`.
    #[must_use]
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        if next == SessionStatus::Cancelled {
            return self.status != SessionStatus::Cancelled;
        }
        matches!(
            (self.status, next),
            (SessionStatus::Pending, SessionStatus::Uploaded)
                | (SessionStatus::Uploaded, SessionStatus::Processing)
                | (
                    SessionStatus::Processing,
                    SessionStatus::Completed | SessionStatus::Failed
                )
        )
    }
}
