use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use gradescan::capture::poll_watcher::{PollWatcher, WatchEvent};
use gradescan::models::session::SessionStatus;
use gradescan::AppError;

fn watcher(
    poll_interval: Duration,
    deadline: Duration,
) -> (PollWatcher, mpsc::Receiver<WatchEvent>, CancellationToken) {
    let (tx, rx) = mpsc::channel(4);
    let cancel = CancellationToken::new();
    let watcher = PollWatcher::new(
        "session-1".into(),
        poll_interval,
        deadline,
        tx,
        cancel.clone(),
    );
    (watcher, rx, cancel)
}

#[tokio::test]
async fn upload_fires_exactly_once_and_stops() {
    let (watcher, mut rx, _cancel) =
        watcher(Duration::from_millis(10), Duration::from_secs(5));

    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in_fetch = Arc::clone(&calls);
    let handle = watcher.spawn(move || {
        let n = calls_in_fetch.fetch_add(1, Ordering::SeqCst);
        async move {
            // Third poll cycle sees the upload.
            if n >= 2 {
                Ok(SessionStatus::Uploaded)
            } else {
                Ok(SessionStatus::Pending)
            }
        }
    });

    let event = rx.recv().await.expect("one event");
    assert_eq!(
        event,
        WatchEvent::Uploaded {
            session_id: "session-1".into()
        }
    );
    handle.join().await;
    // The task returned after the send: the channel is closed, no second event.
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn deadline_fires_exactly_once_when_nothing_uploads() {
    let (watcher, mut rx, _cancel) =
        watcher(Duration::from_millis(10), Duration::from_millis(60));

    let handle = watcher.spawn(|| async { Ok(SessionStatus::Pending) });

    let event = rx.recv().await.expect("one event");
    assert_eq!(
        event,
        WatchEvent::TimedOut {
            session_id: "session-1".into()
        }
    );
    handle.join().await;
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn cancellation_stops_both_timers_without_an_event() {
    let (watcher, mut rx, cancel) =
        watcher(Duration::from_millis(10), Duration::from_millis(80));

    let handle = watcher.spawn(|| async { Ok(SessionStatus::Pending) });
    cancel.cancel();
    handle.join().await;

    // No event ever leaves a cancelled watch, even after the deadline.
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn fetch_errors_do_not_end_the_watch() {
    let (watcher, mut rx, _cancel) =
        watcher(Duration::from_millis(10), Duration::from_secs(5));

    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in_fetch = Arc::clone(&calls);
    let handle = watcher.spawn(move || {
        let n = calls_in_fetch.fetch_add(1, Ordering::SeqCst);
        async move {
            if n < 2 {
                Err(AppError::Db("transient".into()))
            } else {
                Ok(SessionStatus::Uploaded)
            }
        }
    });

    let event = rx.recv().await.expect("one event");
    assert!(matches!(event, WatchEvent::Uploaded { .. }));
    handle.join().await;
}

#[tokio::test]
async fn dropping_the_handle_cancels_the_watch() {
    let (watcher, mut rx, _cancel) =
        watcher(Duration::from_millis(10), Duration::from_millis(50));

    let handle = watcher.spawn(|| async { Ok(SessionStatus::Pending) });
    drop(handle);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.recv().await.is_none());
}
