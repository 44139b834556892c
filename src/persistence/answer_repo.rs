//! Answer record repository: idempotent replace and point aggregates.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::models::exam::AnswerRecord;
use crate::Result;

use super::SqlitePool;

/// Repository wrapper around `SQLite` for student answer rows.
#[derive(Clone)]
pub struct AnswerRepo {
    pool: Arc<SqlitePool>,
}

/// Row shape returned to callers that need to inspect persisted answers.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AnswerRow {
    /// Unique record identifier.
    pub id: String,
    /// Student-exam the answer belongs to.
    pub student_exam_id: String,
    /// Canonical sub-question the answer resolved to.
    pub sub_question_id: String,
    /// Current answer text.
    pub answer_text: Option<String>,
    /// Extraction text preserved verbatim.
    pub orig_answer_text: Option<String>,
    /// Public URL of the answer visual, if any.
    pub answer_visual: Option<String>,
    /// Points awarded by a grader; NULL until graded.
    pub sub_points_awarded: Option<f64>,
}

impl AnswerRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    /// Replace all answers for one student-exam with the given set.
    ///
    /// Deletes existing rows, then inserts in fixed-size batches to bound
    /// statement payload size. The delete and the inserts are not wrapped
    /// in one transaction: a failed batch aborts remaining work and
    /// already-committed batches stay committed, so a crash mid-way loses
    /// that student's answers until re-processed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the delete or any insert batch fails.
    pub async fn replace_for_student_exam(
        &self,
        student_exam_id: &str,
        records: &[AnswerRecord],
        batch_size: usize,
    ) -> Result<usize> {
        sqlx::query("DELETE FROM student_answer WHERE student_exam_id = ?1")
            .bind(student_exam_id)
            .execute(self.pool.as_ref())
            .await?;

        let mut inserted = 0usize;
        for chunk in records.chunks(batch_size.max(1)) {
            let mut builder: sqlx::QueryBuilder<'_, sqlx::Sqlite> = sqlx::QueryBuilder::new(
                "INSERT INTO student_answer (id, student_exam_id, sub_question_id, answer_text,
                 orig_answer_text, answer_visual, created_at) ",
            );
            let now = Utc::now().to_rfc3339();
            builder.push_values(chunk, |mut b, record| {
                b.push_bind(Uuid::new_v4().to_string())
                    .push_bind(&record.student_exam_id)
                    .push_bind(&record.sub_question_id)
                    .push_bind(&record.answer_text)
                    .push_bind(&record.orig_answer_text)
                    .push_bind(&record.answer_visual)
                    .push_bind(now.clone());
            });
            builder.build().execute(self.pool.as_ref()).await?;
            inserted += chunk.len();
            debug!(student_exam_id, inserted, "answer batch committed");
        }
        Ok(inserted)
    }

    /// List persisted answers for one student-exam.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_for_student_exam(&self, student_exam_id: &str) -> Result<Vec<AnswerRow>> {
        let rows: Vec<AnswerRow> = sqlx::query_as(
            "SELECT id, student_exam_id, sub_question_id, answer_text, orig_answer_text,
             answer_visual, sub_points_awarded
             FROM student_answer WHERE student_exam_id = ?1 ORDER BY created_at, id",
        )
        .bind(student_exam_id)
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(rows)
    }

    /// Recalculate the student's point aggregate from per-answer awards.
    ///
    /// `total_points_awarded` becomes the sum of non-NULL
    /// `sub_points_awarded` rows, or NULL when no answer has been graded
    /// yet — partial grading must not masquerade as a zero score.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn recalculate_total_points(&self, student_exam_id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE student_exam SET total_points_awarded = (
                 SELECT SUM(sub_points_awarded) FROM student_answer
                 WHERE student_exam_id = ?1 AND sub_points_awarded IS NOT NULL
             ) WHERE id = ?1",
        )
        .bind(student_exam_id)
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }

    /// Award points for one answer row, for grading flows and tests.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn set_points(&self, answer_id: &str, points: Option<f64>) -> Result<()> {
        sqlx::query("UPDATE student_answer SET sub_points_awarded = ?2 WHERE id = ?1")
            .bind(answer_id)
            .bind(points)
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }
}
