//! Shared helpers for pipeline integration tests.
//!
//! Provides an in-memory database seeded with a small exam, a ZIP builder
//! for fake extraction archives, and stub extractors so tests can exercise
//! the pipeline without any network.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;

use gradescan::extraction::{Extractor, ImagePart};
use gradescan::models::exam::ExamSkeleton;
use gradescan::persistence::{db, session_repo::SessionRepo, SqlitePool};
use gradescan::storage::{MemoryObjectStore, ObjectStore};
use gradescan::{AppError, Result};

/// In-memory pool seeded with exam `exam-1`: question 1 holding
/// sub-questions `sq1` ("Define entropy.") and `sq2` ("Give an example.").
pub async fn pool_with_exam() -> Arc<SqlitePool> {
    let pool = Arc::new(db::connect_memory().await.expect("db connect"));
    sqlx::raw_sql(
        "INSERT INTO question (id, exam_id, question_number, max_total_points) VALUES
            ('q1', 'exam-1', 1, 10.0);
         INSERT INTO sub_question (id, question_id, sub_q_text_content, max_sub_points) VALUES
            ('sq1', 'q1', 'Define entropy.', 4.0),
            ('sq2', 'q1', 'Give an example.', 6.0);",
    )
    .execute(pool.as_ref())
    .await
    .expect("seed exam");
    pool
}

/// Build a ZIP archive from (name, bytes) entries.
pub fn build_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let cursor = std::io::Cursor::new(Vec::new());
    let mut writer = zip::ZipWriter::new(cursor);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    for (name, bytes) in entries {
        writer.start_file(*name, options).expect("start entry");
        writer.write_all(bytes).expect("write entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// Manifest where `sq1` matches and one sub-question text matches nothing.
pub fn manifest_one_matched_one_unmatched() -> &'static [u8] {
    br#"{"questions":[{"question_number":1,"sub_questions":[
        {"sub_q_text_content":"Define entropy.",
         "student_answers":{"answer_text":"A measure of disorder."}},
        {"sub_q_text_content":"This text matches no canonical sub-question.",
         "student_answers":{"answer_text":"Orphaned answer."}}
    ]}]}"#
}

/// Extractor stub returning prepared archive bytes and counting calls.
pub struct StubExtractor {
    archive: Vec<u8>,
    calls: AtomicUsize,
}

impl StubExtractor {
    pub fn new(archive: Vec<u8>) -> Self {
        Self {
            archive,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Extractor for StubExtractor {
    async fn submit(&self, _images: Vec<ImagePart>, _skeleton: &ExamSkeleton) -> Result<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Bytes::from(self.archive.clone()))
    }
}

/// Store wrapper that refuses any put whose path contains `poison`,
/// for exercising the all-or-nothing commit abort.
pub struct PoisonedStore {
    pub inner: MemoryObjectStore,
}

impl PoisonedStore {
    pub fn new(inner: MemoryObjectStore) -> Self {
        Self { inner }
    }
}

impl ObjectStore for PoisonedStore {
    async fn put(&self, path: &str, bytes: bytes::Bytes) -> Result<()> {
        if path.contains("poison") {
            return Err(AppError::Storage(format!("upstream rejected {path}")));
        }
        self.inner.put(path, bytes).await
    }

    async fn get(&self, path: &str) -> Result<bytes::Bytes> {
        self.inner.get(path).await
    }

    fn public_url_of(&self, path: &str) -> String {
        self.inner.public_url_of(path)
    }

    fn path_from_url(&self, url: &str) -> Option<String> {
        self.inner.path_from_url(url)
    }

    async fn remove(&self, paths: &[String]) -> Result<()> {
        self.inner.remove(paths).await
    }
}

/// Extractor stub that cancels the session mid-flight, simulating the
/// operator abandoning the capture while the extraction call is in the air.
pub struct CancellingExtractor {
    archive: Vec<u8>,
    sessions: SessionRepo,
    session_id: String,
}

impl CancellingExtractor {
    pub fn new(archive: Vec<u8>, sessions: SessionRepo, session_id: String) -> Self {
        Self {
            archive,
            sessions,
            session_id,
        }
    }
}

impl Extractor for CancellingExtractor {
    async fn submit(&self, _images: Vec<ImagePart>, _skeleton: &ExamSkeleton) -> Result<Bytes> {
        use gradescan::models::session::SessionStatus;
        self.sessions
            .update_status(&self.session_id, SessionStatus::Cancelled)
            .await?;
        Ok(Bytes::from(self.archive.clone()))
    }
}
