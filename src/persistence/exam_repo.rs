//! Exam structure reads and student provisioning.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::models::exam::{CanonicalLookup, ExamSkeleton, SkeletonQuestion, SkeletonSubQuestion};
use crate::models::session::StudentIdentity;
use crate::{AppError, Result};

use super::SqlitePool;

/// Repository for the pre-existing exam schema and student rows.
#[derive(Clone)]
pub struct ExamRepo {
    pool: Arc<SqlitePool>,
}

#[derive(sqlx::FromRow)]
struct SkeletonRow {
    question_number: i64,
    sub_q_text_content: String,
}

#[derive(sqlx::FromRow)]
struct LookupRow {
    question_number: i64,
    sub_q_text_content: String,
    sub_question_id: String,
}

impl ExamRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    /// Build the minimal skeleton sent to the extraction service: question
    /// numbers and sub-question texts only, ordered by question number.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` when the exam has no questions, or
    /// `AppError::Db` if the query fails.
    pub async fn skeleton(&self, exam_id: &str) -> Result<ExamSkeleton> {
        let rows: Vec<SkeletonRow> = sqlx::query_as(
            "SELECT q.question_number, sq.sub_q_text_content
             FROM question q JOIN sub_question sq ON sq.question_id = q.id
             WHERE q.exam_id = ?1
             ORDER BY q.question_number, sq.id",
        )
        .bind(exam_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        if rows.is_empty() {
            return Err(AppError::NotFound(format!(
                "exam {exam_id} has no questions"
            )));
        }

        let mut questions: Vec<SkeletonQuestion> = Vec::new();
        for row in rows {
            match questions.last_mut() {
                Some(last) if last.question_number == row.question_number => {
                    last.sub_questions.push(SkeletonSubQuestion {
                        sub_q_text_content: row.sub_q_text_content,
                    });
                }
                _ => questions.push(SkeletonQuestion {
                    question_number: row.question_number,
                    sub_questions: vec![SkeletonSubQuestion {
                        sub_q_text_content: row.sub_q_text_content,
                    }],
                }),
            }
        }
        Ok(ExamSkeleton { questions })
    }

    /// Rebuild the canonical text-keyed lookup from the store.
    ///
    /// Called immediately before reconciliation so a concurrent exam edit
    /// cannot leave stale sub-question IDs in play.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn canonical_lookup(&self, exam_id: &str) -> Result<CanonicalLookup> {
        let rows: Vec<LookupRow> = sqlx::query_as(
            "SELECT q.question_number, sq.sub_q_text_content, sq.id AS sub_question_id
             FROM question q JOIN sub_question sq ON sq.question_id = q.id
             WHERE q.exam_id = ?1",
        )
        .bind(exam_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        let mut lookup = CanonicalLookup::default();
        for row in rows {
            lookup.insert(row.question_number, row.sub_q_text_content, row.sub_question_id);
        }
        Ok(lookup)
    }

    /// Provision a student row and its student-exam row for a new capture.
    ///
    /// A fresh student row is always inserted; the student-exam row is
    /// found-or-created for that student. When an existing student-exam is
    /// reused its stale answers are deleted up front so a re-scan cannot
    /// duplicate them.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if any statement fails.
    pub async fn provision_student_exam(
        &self,
        exam_id: &str,
        identity: &StudentIdentity,
    ) -> Result<(String, String)> {
        let student_id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO student (id, full_name, student_number, created_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&student_id)
        .bind(&identity.name)
        .bind(&identity.number)
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool.as_ref())
        .await?;

        let existing: Option<(String,)> = sqlx::query_as(
            "SELECT id FROM student_exam WHERE student_id = ?1 AND exam_id = ?2",
        )
        .bind(&student_id)
        .bind(exam_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        let student_exam_id = if let Some((id,)) = existing {
            sqlx::query("DELETE FROM student_answer WHERE student_exam_id = ?1")
                .bind(&id)
                .execute(self.pool.as_ref())
                .await?;
            id
        } else {
            let id = Uuid::new_v4().to_string();
            sqlx::query(
                "INSERT INTO student_exam (id, student_id, exam_id, status, created_at)
                 VALUES (?1, ?2, ?3, 'submitted', ?4)",
            )
            .bind(&id)
            .bind(&student_id)
            .bind(exam_id)
            .bind(Utc::now().to_rfc3339())
            .execute(self.pool.as_ref())
            .await?;
            id
        };

        Ok((student_id, student_exam_id))
    }
}
