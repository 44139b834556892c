//! Roster model for multi-student capture sessions.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::session::StudentIdentity;

/// Lifecycle status for the roster wrapper itself.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RosterStatus {
    /// At least one entry still waits for an upload.
    Pending,
    /// Every entry has uploaded.
    Completed,
    /// Explicitly cancelled.
    Cancelled,
}

/// Per-student status inside a roster.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Waiting for this student's images.
    Pending,
    /// This student's images landed in storage.
    Uploaded,
    /// Extraction in flight for this student.
    Processing,
    /// Answers persisted for this student.
    Completed,
    /// Pipeline failed for this student; other entries are unaffected.
    Failed,
}

impl EntryStatus {
    /// Edge table mirroring the single-session state machine, minus cancel
    /// (the roster wrapper owns cancellation).
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Uploaded)
                | (Self::Uploaded, Self::Processing)
                | (Self::Processing, Self::Completed | Self::Failed)
        )
    }
}

/// Multi-student session: one token shared by N roster entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct RosterSession {
    /// Unique record identifier.
    pub id: String,
    /// Opaque token embedded in the shared hand-off URL.
    pub token: String,
    /// Exam all entries belong to.
    pub exam_id: String,
    /// Wrapper status.
    pub status: RosterStatus,
    /// Hard expiry for the shared token.
    pub expires_at: DateTime<Utc>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl RosterSession {
    /// Construct a pending roster with a fresh shared token.
    #[must_use]
    pub fn new(exam_id: String, ttl_minutes: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            token: Uuid::new_v4().to_string(),
            exam_id,
            status: RosterStatus::Pending,
            expires_at: now + Duration::minutes(ttl_minutes),
            created_at: now,
        }
    }

    /// Whether the expiry deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// One student's slot in a roster, mutated independently of its siblings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct RosterEntry {
    /// Unique record identifier.
    pub id: String,
    /// Owning roster session.
    pub roster_id: String,
    /// Student row provisioned at roster creation.
    pub student_id: String,
    /// Student-exam row the reconciled answers attach to.
    pub student_exam_id: String,
    /// Display name supplied at creation.
    pub display_name: Option<String>,
    /// Student number supplied at creation.
    pub student_number: Option<String>,
    /// This entry's own status slot.
    pub status: EntryStatus,
    /// Public URLs of this student's uploaded images.
    pub uploaded_image_paths: Vec<String>,
    /// Reason recorded when this entry's pipeline fails.
    pub error_message: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl RosterEntry {
    /// Construct a pending entry bound to provisioned student rows.
    #[must_use]
    pub fn new(
        roster_id: String,
        student_id: String,
        student_exam_id: String,
        identity: &StudentIdentity,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            roster_id,
            student_id,
            student_exam_id,
            display_name: identity.name.clone(),
            student_number: identity.number.clone(),
            status: EntryStatus::Pending,
            uploaded_image_paths: Vec::new(),
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Best label for log lines.
    #[must_use]
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.student_number.as_deref())
            .unwrap_or("unknown")
    }
}
