//! Capture client behaviors: all-or-nothing commit, direct upload, image
//! removal.

use std::sync::Arc;

use bytes::Bytes;

use gradescan::capture::client::{stage_direct, BufferedImage, CaptureClient};
use gradescan::capture::session_manager;
use gradescan::models::session::{SessionStatus, StudentIdentity};
use gradescan::persistence::exam_repo::ExamRepo;
use gradescan::persistence::session_repo::SessionRepo;
use gradescan::storage::{MemoryObjectStore, ObjectStore};
use gradescan::AppError;

use super::test_helpers::{pool_with_exam, PoisonedStore};

#[tokio::test]
async fn commit_uploads_under_the_token_prefix_and_flips_status() {
    let pool = pool_with_exam().await;
    let sessions = SessionRepo::new(Arc::clone(&pool));
    let exams = ExamRepo::new(Arc::clone(&pool));
    let store = MemoryObjectStore::new("exam-visuals");

    let session = session_manager::create(
        &sessions,
        &exams,
        "exam-1",
        &StudentIdentity::new(Some("Ada Lovelace"), None),
        60,
    )
    .await
    .expect("create");

    let mut client = CaptureClient::new(&store);
    client.capture("page one.jpg", Bytes::from_static(b"a"));
    client.capture("page two.jpg", Bytes::from_static(b"b"));
    let committed = client.commit(&sessions, &session).await.expect("commit");

    assert_eq!(committed.status, SessionStatus::Uploaded);
    assert_eq!(committed.uploaded_image_paths.len(), 2);
    assert_eq!(client.buffered(), 0, "buffer drains on success");
    assert!(
        store
            .contains(&format!("temp_scans/{}/page_one.jpg", session.token))
            .await,
        "names are sanitized into the token prefix"
    );
}

#[tokio::test]
async fn a_single_failed_upload_aborts_the_whole_commit() {
    let pool = pool_with_exam().await;
    let sessions = SessionRepo::new(Arc::clone(&pool));
    let exams = ExamRepo::new(Arc::clone(&pool));
    let store = PoisonedStore::new(MemoryObjectStore::new("exam-visuals"));

    let session = session_manager::create(
        &sessions,
        &exams,
        "exam-1",
        &StudentIdentity::new(Some("Ada Lovelace"), None),
        60,
    )
    .await
    .expect("create");

    let mut client = CaptureClient::new(&store);
    client.capture("fine.jpg", Bytes::from_static(b"a"));
    client.capture("poison.jpg", Bytes::from_static(b"b"));
    let err = client
        .commit(&sessions, &session)
        .await
        .expect_err("must abort");
    assert!(matches!(err, AppError::Storage(_)), "got {err}");

    // Session untouched, staged object rolled back.
    let stored = sessions.get_by_id(&session.id).await.expect("reload");
    assert_eq!(stored.status, SessionStatus::Pending);
    assert!(stored.uploaded_image_paths.is_empty());
    assert!(store.inner.is_empty().await, "no staged litter remains");
    assert_eq!(client.buffered(), 2, "buffer survives for a retry");
}

#[tokio::test]
async fn direct_upload_stages_files_and_preloads_the_session() {
    let pool = pool_with_exam().await;
    let sessions = SessionRepo::new(Arc::clone(&pool));
    let exams = ExamRepo::new(Arc::clone(&pool));
    let store = MemoryObjectStore::new("exam-visuals");

    let files = vec![
        BufferedImage {
            file_name: "exam page%201.pdf".into(),
            bytes: Bytes::from_static(b"pdf"),
        },
        BufferedImage {
            file_name: "notes.jpg".into(),
            bytes: Bytes::from_static(b"jpg"),
        },
    ];
    let urls = stage_direct(&store, "direct-tok", &files).await.expect("stage");
    assert_eq!(urls.len(), 2);
    assert!(urls[0].ends_with("temp_scans/direct-tok/exam_page_1.pdf"), "got {}", urls[0]);

    let session = session_manager::create_preloaded(
        &sessions,
        &exams,
        "exam-1",
        &StudentIdentity::new(None, Some("s007")),
        urls.clone(),
        20,
    )
    .await
    .expect("preloaded session");

    assert_eq!(session.status, SessionStatus::Uploaded);
    assert_eq!(session.uploaded_image_paths, urls);
    assert!(session.student_exam_id.is_some());
}

#[tokio::test]
async fn removing_an_uploaded_image_deletes_object_and_path() {
    let pool = pool_with_exam().await;
    let sessions = SessionRepo::new(Arc::clone(&pool));
    let exams = ExamRepo::new(Arc::clone(&pool));
    let store = MemoryObjectStore::new("exam-visuals");

    let session = session_manager::create(
        &sessions,
        &exams,
        "exam-1",
        &StudentIdentity::new(Some("Ada Lovelace"), None),
        60,
    )
    .await
    .expect("create");

    let mut client = CaptureClient::new(&store);
    client.capture("keep.jpg", Bytes::from_static(b"a"));
    client.capture("drop.jpg", Bytes::from_static(b"b"));
    let committed = client.commit(&sessions, &session).await.expect("commit");

    let drop_url = committed
        .uploaded_image_paths
        .iter()
        .find(|u| u.ends_with("drop.jpg"))
        .cloned()
        .expect("drop url");
    let updated = client
        .remove_uploaded(&sessions, &committed, &drop_url)
        .await
        .expect("remove");

    assert_eq!(updated.uploaded_image_paths.len(), 1);
    assert!(updated.uploaded_image_paths[0].ends_with("keep.jpg"));
    assert!(!store
        .contains(&format!("temp_scans/{}/drop.jpg", session.token))
        .await);
}
