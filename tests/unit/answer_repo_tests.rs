use std::sync::Arc;

use gradescan::models::exam::AnswerRecord;
use gradescan::persistence::{answer_repo::AnswerRepo, db, SqlitePool};

async fn setup() -> (Arc<SqlitePool>, AnswerRepo) {
    let pool = Arc::new(db::connect_memory().await.expect("db connect"));
    sqlx::raw_sql(
        "INSERT INTO student (id, full_name, student_number, created_at)
             VALUES ('st1', 'Ada Lovelace', 's001', '2026-01-01T00:00:00Z');
         INSERT INTO student_exam (id, student_id, exam_id, status, created_at)
             VALUES ('se1', 'st1', 'exam-1', 'submitted', '2026-01-01T00:00:00Z');",
    )
    .execute(pool.as_ref())
    .await
    .expect("seed student");
    (Arc::clone(&pool), AnswerRepo::new(pool))
}

fn record(sub_question_id: &str, text: &str) -> AnswerRecord {
    AnswerRecord {
        student_exam_id: "se1".into(),
        sub_question_id: sub_question_id.into(),
        answer_text: Some(text.into()),
        orig_answer_text: Some(text.into()),
        answer_visual: None,
    }
}

#[tokio::test]
async fn replace_inserts_the_full_set() {
    let (_pool, repo) = setup().await;
    let records = vec![record("sq1", "a"), record("sq2", "b")];
    let inserted = repo
        .replace_for_student_exam("se1", &records, 100)
        .await
        .expect("replace");
    assert_eq!(inserted, 2);

    let rows = repo.list_for_student_exam("se1").await.expect("list");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].orig_answer_text.as_deref(), Some("a"));
}

#[tokio::test]
async fn replace_is_idempotent_per_student_exam() {
    let (_pool, repo) = setup().await;
    let records = vec![record("sq1", "a"), record("sq2", "b"), record("sq3", "c")];

    repo.replace_for_student_exam("se1", &records, 100)
        .await
        .expect("first run");
    repo.replace_for_student_exam("se1", &records, 100)
        .await
        .expect("second run");

    let rows = repo.list_for_student_exam("se1").await.expect("list");
    assert_eq!(rows.len(), 3, "re-running must not duplicate answers");
    let mut subs: Vec<&str> = rows.iter().map(|r| r.sub_question_id.as_str()).collect();
    subs.sort_unstable();
    assert_eq!(subs, vec!["sq1", "sq2", "sq3"]);
}

#[tokio::test]
async fn small_batches_still_insert_everything() {
    let (_pool, repo) = setup().await;
    let records: Vec<AnswerRecord> = (0..250)
        .map(|i| record(&format!("sq{i}"), "text"))
        .collect();

    let inserted = repo
        .replace_for_student_exam("se1", &records, 100)
        .await
        .expect("replace in 3 batches");
    assert_eq!(inserted, 250);

    let rows = repo.list_for_student_exam("se1").await.expect("list");
    assert_eq!(rows.len(), 250);
}

#[tokio::test]
async fn replacing_with_empty_set_clears_answers() {
    let (_pool, repo) = setup().await;
    repo.replace_for_student_exam("se1", &[record("sq1", "a")], 100)
        .await
        .expect("seed answers");
    repo.replace_for_student_exam("se1", &[], 100)
        .await
        .expect("clear");
    assert!(repo
        .list_for_student_exam("se1")
        .await
        .expect("list")
        .is_empty());
}

#[tokio::test]
async fn total_points_stay_null_until_something_is_graded() {
    let (pool, repo) = setup().await;
    repo.replace_for_student_exam("se1", &[record("sq1", "a"), record("sq2", "b")], 100)
        .await
        .expect("insert");

    repo.recalculate_total_points("se1").await.expect("recalc");
    let (total,): (Option<f64>,) =
        sqlx::query_as("SELECT total_points_awarded FROM student_exam WHERE id = 'se1'")
            .fetch_one(pool.as_ref())
            .await
            .expect("read total");
    assert_eq!(total, None);
}

#[tokio::test]
async fn total_points_sum_the_graded_answers() {
    let (pool, repo) = setup().await;
    repo.replace_for_student_exam("se1", &[record("sq1", "a"), record("sq2", "b")], 100)
        .await
        .expect("insert");

    let rows = repo.list_for_student_exam("se1").await.expect("list");
    repo.set_points(&rows[0].id, Some(3.5)).await.expect("grade one");
    repo.set_points(&rows[1].id, Some(2.0)).await.expect("grade two");

    repo.recalculate_total_points("se1").await.expect("recalc");
    let (total,): (Option<f64>,) =
        sqlx::query_as("SELECT total_points_awarded FROM student_exam WHERE id = 'se1'")
            .fetch_one(pool.as_ref())
            .await
            .expect("read total");
    assert_eq!(total, Some(5.5));
}
