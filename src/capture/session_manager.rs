//! Capture session lifecycle management: create, lookup, transition.
//!
//! Provides high-level operations over the session repository. All status
//! changes funnel through the state machine in the model; illegal edges
//! surface as `AppError::State` and leave the stored row untouched.

use tracing::{info, info_span};

use crate::models::session::{CaptureSession, SessionStatus, StudentIdentity};
use crate::persistence::exam_repo::ExamRepo;
use crate::persistence::session_repo::SessionRepo;
use crate::{AppError, Result};

/// Create a pending capture session for a QR hand-off.
///
/// Provisions a student row and student-exam row, then inserts the session
/// with a fresh opaque token and the configured lifetime.
///
/// # Errors
///
/// Returns `AppError::Validation` when the identity carries neither a name
/// nor a number, or `AppError::Db` on persistence failure.
pub async fn create(
    sessions: &SessionRepo,
    exams: &ExamRepo,
    exam_id: &str,
    identity: &StudentIdentity,
    ttl_minutes: i64,
) -> Result<CaptureSession> {
    let span = info_span!("create_session", exam_id, student = identity.label());
    let _guard = span.enter();

    identity.validate()?;
    let (student_id, student_exam_id) = exams.provision_student_exam(exam_id, identity).await?;

    let mut session = CaptureSession::new(exam_id.to_owned(), identity, ttl_minutes);
    session.student_id = Some(student_id);
    session.student_exam_id = Some(student_exam_id);
    let session = sessions.create(&session).await?;

    info!(session_id = %session.id, "capture session created");
    Ok(session)
}

/// Create a session that is already `uploaded` — the direct-upload path,
/// where the images were staged in storage before the session existed.
///
/// Uses the shorter direct-upload lifetime since no hand-off wait applies.
///
/// # Errors
///
/// Returns `AppError::Validation` on a bad identity, or `AppError::Db` on
/// persistence failure.
pub async fn create_preloaded(
    sessions: &SessionRepo,
    exams: &ExamRepo,
    exam_id: &str,
    identity: &StudentIdentity,
    image_urls: Vec<String>,
    ttl_minutes: i64,
) -> Result<CaptureSession> {
    let span = info_span!("create_preloaded_session", exam_id, student = identity.label());
    let _guard = span.enter();

    identity.validate()?;
    let (student_id, student_exam_id) = exams.provision_student_exam(exam_id, identity).await?;

    let mut session = CaptureSession::new(exam_id.to_owned(), identity, ttl_minutes);
    session.student_id = Some(student_id);
    session.student_exam_id = Some(student_exam_id);
    session.status = SessionStatus::Uploaded;
    session.uploaded_image_paths = image_urls;
    let session = sessions.create(&session).await?;

    info!(session_id = %session.id, images = session.uploaded_image_paths.len(),
          "preloaded capture session created");
    Ok(session)
}

/// Resolve a session from its hand-off token.
///
/// # Errors
///
/// Returns `AppError::NotFound` when no session carries the token, and
/// `AppError::Expired` when the expiry deadline has passed — even if the
/// persisted status is still non-terminal.
pub async fn lookup_by_token(sessions: &SessionRepo, token: &str) -> Result<CaptureSession> {
    let session = sessions.get_by_token(token).await?;
    if session.is_expired() {
        return Err(AppError::Expired(format!(
            "session for token expired at {}",
            session.expires_at.to_rfc3339()
        )));
    }
    Ok(session)
}

/// Apply a status transition through the state machine.
///
/// # Errors
///
/// Returns `AppError::State` on an illegal edge; the stored row is left
/// unchanged.
pub async fn transition(
    sessions: &SessionRepo,
    session: &CaptureSession,
    next: SessionStatus,
) -> Result<CaptureSession> {
    let updated = sessions.update_status(&session.id, next).await?;
    info!(session_id = %session.id, ?next, "session status transition");
    Ok(updated)
}

/// Cancel a session from any live state.
///
/// # Errors
///
/// Returns `AppError::State` if the session is already cancelled.
pub async fn cancel(sessions: &SessionRepo, session_id: &str) -> Result<CaptureSession> {
    let updated = sessions
        .update_status(session_id, SessionStatus::Cancelled)
        .await?;
    info!(session_id, "session cancelled");
    Ok(updated)
}

/// Record a terminal failure with its reason so polling clients can render
/// something specific.
///
/// # Errors
///
/// Returns `AppError::State` if the session cannot reach `failed`.
pub async fn fail(
    sessions: &SessionRepo,
    session_id: &str,
    message: &str,
) -> Result<CaptureSession> {
    let updated = sessions.set_failed(session_id, message).await?;
    info!(session_id, message, "session marked failed");
    Ok(updated)
}
