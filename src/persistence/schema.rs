//! `SQLite` schema bootstrap logic.
//!
//! All table definitions use `CREATE TABLE IF NOT EXISTS` — safe to
//! re-run on every startup. Produces a convergent result.

use sqlx::SqlitePool;

use crate::Result;

/// Apply all table definitions to the connected `SQLite` database.
///
/// # Errors
///
/// Returns `AppError::Db` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS capture_session (
    id                   TEXT PRIMARY KEY NOT NULL,
    token                TEXT NOT NULL UNIQUE,
    exam_id              TEXT NOT NULL,
    student_id           TEXT,
    student_exam_id      TEXT,
    student_name         TEXT,
    student_number       TEXT,
    status               TEXT NOT NULL CHECK(status IN ('pending','uploaded','processing','completed','failed','cancelled')),
    uploaded_image_paths TEXT NOT NULL DEFAULT '[]',
    error_message        TEXT,
    expires_at           TEXT NOT NULL,
    created_at           TEXT NOT NULL,
    updated_at           TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS roster_session (
    id              TEXT PRIMARY KEY NOT NULL,
    token           TEXT NOT NULL UNIQUE,
    exam_id         TEXT NOT NULL,
    status          TEXT NOT NULL CHECK(status IN ('pending','completed','cancelled')),
    expires_at      TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS roster_entry (
    id                   TEXT PRIMARY KEY NOT NULL,
    roster_id            TEXT NOT NULL,
    student_id           TEXT NOT NULL,
    student_exam_id      TEXT NOT NULL,
    display_name         TEXT,
    student_number       TEXT,
    status               TEXT NOT NULL CHECK(status IN ('pending','uploaded','processing','completed','failed')),
    uploaded_image_paths TEXT NOT NULL DEFAULT '[]',
    error_message        TEXT,
    created_at           TEXT NOT NULL,
    updated_at           TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS student (
    id              TEXT PRIMARY KEY NOT NULL,
    full_name       TEXT,
    student_number  TEXT,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS student_exam (
    id                   TEXT PRIMARY KEY NOT NULL,
    student_id           TEXT NOT NULL,
    exam_id              TEXT NOT NULL,
    status               TEXT NOT NULL,
    total_points_awarded REAL,
    created_at           TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS question (
    id               TEXT PRIMARY KEY NOT NULL,
    exam_id          TEXT NOT NULL,
    question_number  INTEGER NOT NULL,
    max_total_points REAL
);

CREATE TABLE IF NOT EXISTS sub_question (
    id                 TEXT PRIMARY KEY NOT NULL,
    question_id        TEXT NOT NULL,
    sub_q_text_content TEXT NOT NULL,
    max_sub_points     REAL
);

CREATE TABLE IF NOT EXISTS student_answer (
    id                 TEXT PRIMARY KEY NOT NULL,
    student_exam_id    TEXT NOT NULL,
    sub_question_id    TEXT NOT NULL,
    answer_text        TEXT,
    orig_answer_text   TEXT,
    answer_visual      TEXT,
    sub_points_awarded REAL,
    created_at         TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_session_token ON capture_session(token);
CREATE INDEX IF NOT EXISTS idx_session_status ON capture_session(status);
CREATE INDEX IF NOT EXISTS idx_entry_roster ON roster_entry(roster_id);
CREATE INDEX IF NOT EXISTS idx_student_exam_pair ON student_exam(student_id, exam_id);
CREATE INDEX IF NOT EXISTS idx_question_exam ON question(exam_id);
CREATE INDEX IF NOT EXISTS idx_sub_question_parent ON sub_question(question_id);
CREATE INDEX IF NOT EXISTS idx_answer_student_exam ON student_answer(student_exam_id);
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}
