//! Roster coordination: readiness, isolation, per-slot observation.

use std::sync::Arc;

use bytes::Bytes;

use gradescan::capture::client::CaptureClient;
use gradescan::models::roster::{EntryStatus, RosterStatus};
use gradescan::models::session::StudentIdentity;
use gradescan::persistence::answer_repo::AnswerRepo;
use gradescan::persistence::exam_repo::ExamRepo;
use gradescan::persistence::roster_repo::RosterRepo;
use gradescan::persistence::session_repo::SessionRepo;
use gradescan::reconcile::{MultiSessionCoordinator, ReconciliationEngine};
use gradescan::storage::MemoryObjectStore;
use gradescan::AppError;

use super::test_helpers::{build_archive, manifest_one_matched_one_unmatched, pool_with_exam, StubExtractor};

#[tokio::test]
async fn roster_requires_at_least_one_usable_identity() {
    let pool = pool_with_exam().await;
    let exams = ExamRepo::new(Arc::clone(&pool));
    let rosters = RosterRepo::new(Arc::clone(&pool));
    let coordinator = MultiSessionCoordinator::new(&rosters, &exams);

    let err = coordinator
        .create_roster(
            "exam-1",
            &[StudentIdentity::new(Some("  "), None), StudentIdentity::default()],
            60,
        )
        .await
        .expect_err("must fail");
    assert!(matches!(err, AppError::Validation(_)), "got {err}");
}

#[tokio::test]
async fn blank_identities_are_filtered_out_of_the_roster() {
    let pool = pool_with_exam().await;
    let exams = ExamRepo::new(Arc::clone(&pool));
    let rosters = RosterRepo::new(Arc::clone(&pool));
    let coordinator = MultiSessionCoordinator::new(&rosters, &exams);

    let (_, entries) = coordinator
        .create_roster(
            "exam-1",
            &[
                StudentIdentity::new(Some("Ada Lovelace"), None),
                StudentIdentity::default(),
                StudentIdentity::new(None, Some("s002")),
            ],
            60,
        )
        .await
        .expect("create roster");
    assert_eq!(entries.len(), 2);
}

#[tokio::test]
async fn readiness_flips_the_wrapper_to_completed() {
    let pool = pool_with_exam().await;
    let exams = ExamRepo::new(Arc::clone(&pool));
    let rosters = RosterRepo::new(Arc::clone(&pool));
    let store = MemoryObjectStore::new("exam-visuals");
    let coordinator = MultiSessionCoordinator::new(&rosters, &exams);

    let identities = vec![
        StudentIdentity::new(Some("Ada Lovelace"), None),
        StudentIdentity::new(Some("Grace Hopper"), None),
    ];
    let (roster, entries) = coordinator
        .create_roster("exam-1", &identities, 60)
        .await
        .expect("create roster");

    let refreshed = coordinator.refresh_status(&roster.id).await.expect("refresh");
    assert_eq!(refreshed.status, RosterStatus::Pending);

    for entry in &entries {
        let mut client = CaptureClient::new(&store);
        client.capture("scan.jpg", Bytes::from_static(b"img"));
        client
            .commit_entry(&rosters, &roster.token, entry)
            .await
            .expect("commit entry");
    }

    assert!(coordinator.ready(&roster.id).await.expect("ready"));
    let refreshed = coordinator.refresh_status(&roster.id).await.expect("refresh");
    assert_eq!(refreshed.status, RosterStatus::Completed);
}

#[tokio::test]
async fn one_entry_failure_never_blocks_the_others() {
    let pool = pool_with_exam().await;
    let sessions = SessionRepo::new(Arc::clone(&pool));
    let exams = ExamRepo::new(Arc::clone(&pool));
    let answers = AnswerRepo::new(Arc::clone(&pool));
    let rosters = RosterRepo::new(Arc::clone(&pool));
    let store = MemoryObjectStore::new("exam-visuals");
    let coordinator = MultiSessionCoordinator::new(&rosters, &exams);

    let identities = vec![
        StudentIdentity::new(Some("Ada Lovelace"), None),
        StudentIdentity::new(Some("Grace Hopper"), None),
    ];
    let (roster, entries) = coordinator
        .create_roster("exam-1", &identities, 60)
        .await
        .expect("create roster");

    // First entry's images vanished from storage; its download will fail.
    rosters
        .set_entry_uploaded(&entries[0].id, &["memory://exam-visuals/gone.jpg".into()])
        .await
        .expect("mark uploaded");

    let mut client = CaptureClient::new(&store);
    client.capture("scan.jpg", Bytes::from_static(b"img"));
    client
        .commit_entry(&rosters, &roster.token, &entries[1])
        .await
        .expect("commit second");

    let extractor = StubExtractor::new(build_archive(&[(
        "out.json",
        manifest_one_matched_one_unmatched(),
    )]));
    let engine = ReconciliationEngine::new(&store, &extractor, &sessions, &exams, &answers, 100);
    let summary = coordinator.sweep(&engine, &roster.id).await.expect("sweep");

    assert_eq!(summary.processed.len(), 1);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, entries[0].id);

    let failed = rosters.get_entry(&entries[0].id).await.expect("failed entry");
    assert_eq!(failed.status, EntryStatus::Failed);
    assert!(failed.error_message.is_some());

    let ok = rosters.get_entry(&entries[1].id).await.expect("ok entry");
    assert_eq!(ok.status, EntryStatus::Completed);
}

#[tokio::test]
async fn a_student_observes_only_their_own_slot() {
    let pool = pool_with_exam().await;
    let exams = ExamRepo::new(Arc::clone(&pool));
    let rosters = RosterRepo::new(Arc::clone(&pool));
    let store = MemoryObjectStore::new("exam-visuals");
    let coordinator = MultiSessionCoordinator::new(&rosters, &exams);

    let identities = vec![
        StudentIdentity::new(Some("Ada Lovelace"), None),
        StudentIdentity::new(Some("Grace Hopper"), None),
    ];
    let (roster, entries) = coordinator
        .create_roster("exam-1", &identities, 60)
        .await
        .expect("create roster");

    let mut client = CaptureClient::new(&store);
    client.capture("scan.jpg", Bytes::from_static(b"img"));
    client
        .commit_entry(&rosters, &roster.token, &entries[0])
        .await
        .expect("commit first");

    assert_eq!(
        coordinator.entry_status(&entries[0].id).await.expect("own slot"),
        EntryStatus::Uploaded
    );
    assert_eq!(
        coordinator.entry_status(&entries[1].id).await.expect("other slot"),
        EntryStatus::Pending
    );
}
