use std::sync::Arc;

use gradescan::models::roster::{EntryStatus, RosterEntry, RosterSession, RosterStatus};
use gradescan::models::session::StudentIdentity;
use gradescan::persistence::{db, roster_repo::RosterRepo};
use gradescan::AppError;

async fn repo() -> RosterRepo {
    let pool = db::connect_memory().await.expect("db connect");
    RosterRepo::new(Arc::new(pool))
}

async fn roster_with_entries(repo: &RosterRepo, count: usize) -> (RosterSession, Vec<RosterEntry>) {
    let roster = repo
        .create(&RosterSession::new("exam-1".into(), 60))
        .await
        .expect("create roster");
    let mut entries = Vec::new();
    for i in 0..count {
        let name = format!("Student {i}");
        let identity = StudentIdentity::new(Some(name.as_str()), None);
        let entry = repo
            .create_entry(&RosterEntry::new(
                roster.id.clone(),
                format!("st{i}"),
                format!("se{i}"),
                &identity,
            ))
            .await
            .expect("create entry");
        entries.push(entry);
    }
    (roster, entries)
}

#[tokio::test]
async fn roster_and_entries_round_trip() {
    let repo = repo().await;
    let (roster, entries) = roster_with_entries(&repo, 3).await;

    let loaded = repo.get_by_token(&roster.token).await.expect("by token");
    assert_eq!(loaded.id, roster.id);
    assert_eq!(loaded.status, RosterStatus::Pending);

    let listed = repo.list_entries(&roster.id).await.expect("list entries");
    assert_eq!(listed.len(), 3);
    assert!(listed.iter().all(|e| e.status == EntryStatus::Pending));
    assert_eq!(listed[0].id, entries[0].id);
}

#[tokio::test]
async fn set_entry_uploaded_touches_only_that_slot() {
    let repo = repo().await;
    let (roster, entries) = roster_with_entries(&repo, 2).await;

    let updated = repo
        .set_entry_uploaded(&entries[0].id, &["u1".into(), "u2".into()])
        .await
        .expect("upload first");
    assert_eq!(updated.status, EntryStatus::Uploaded);
    assert_eq!(updated.uploaded_image_paths, vec!["u1", "u2"]);

    let sibling = repo.get_entry(&entries[1].id).await.expect("sibling");
    assert_eq!(sibling.status, EntryStatus::Pending);
    assert!(sibling.uploaded_image_paths.is_empty());

    let loaded = repo.get_by_id(&roster.id).await.expect("roster");
    assert_eq!(loaded.status, RosterStatus::Pending);
}

#[tokio::test]
async fn illegal_entry_transition_is_rejected() {
    let repo = repo().await;
    let (_roster, entries) = roster_with_entries(&repo, 1).await;

    let err = repo
        .update_entry_status(&entries[0].id, EntryStatus::Completed)
        .await
        .expect_err("pending cannot complete");
    assert!(matches!(err, AppError::State(_)), "got {err}");

    let stored = repo.get_entry(&entries[0].id).await.expect("reload");
    assert_eq!(stored.status, EntryStatus::Pending);
}

#[tokio::test]
async fn list_ready_requires_every_entry_uploaded() {
    let repo = repo().await;
    let (roster, entries) = roster_with_entries(&repo, 2).await;

    repo.set_entry_uploaded(&entries[0].id, &["u1".into()])
        .await
        .expect("upload first");
    assert!(repo.list_ready().await.expect("list").is_empty());

    repo.set_entry_uploaded(&entries[1].id, &["u2".into()])
        .await
        .expect("upload second");
    let ready = repo.list_ready().await.expect("list");
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].id, roster.id);
}

#[tokio::test]
async fn entry_failure_records_the_reason() {
    let repo = repo().await;
    let (_roster, entries) = roster_with_entries(&repo, 1).await;

    repo.set_entry_uploaded(&entries[0].id, &["u1".into()])
        .await
        .expect("upload");
    repo.update_entry_status(&entries[0].id, EntryStatus::Processing)
        .await
        .expect("processing");
    let failed = repo
        .set_entry_failed(&entries[0].id, "storage: object missing")
        .await
        .expect("fail");
    assert_eq!(failed.status, EntryStatus::Failed);
    assert_eq!(failed.error_message.as_deref(), Some("storage: object missing"));
}
