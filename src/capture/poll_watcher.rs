//! Upload detection by polling, with an independent absolute deadline.
//!
//! Each watched session gets a [`PollWatcher`] task that fetches the
//! session status on a fixed period through a read-only closure. On
//! `uploaded` it emits [`WatchEvent::Uploaded`] exactly once and stops; if
//! the absolute deadline passes first it emits [`WatchEvent::TimedOut`]
//! exactly once and stops. At most one event fires per watch lifecycle,
//! and cancelling the handle kills both timers together — no orphans.
//!
//! Events are delivered via a `tokio::sync::mpsc` channel so the caller
//! can react (kick off extraction, surface a timeout).

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Instrument};

use crate::models::session::SessionStatus;
use crate::Result;

/// Events emitted by the poll watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// The session reached `uploaded` within the deadline.
    Uploaded {
        /// Session the watcher observed.
        session_id: String,
    },
    /// The absolute deadline passed without an upload.
    TimedOut {
        /// Session the watcher observed.
        session_id: String,
    },
}

/// Builder for a per-session poll watcher.
///
/// Call [`spawn`](Self::spawn) to start the background timer task.
pub struct PollWatcher {
    session_id: String,
    poll_interval: Duration,
    deadline: Duration,
    event_tx: mpsc::Sender<WatchEvent>,
    cancel: CancellationToken,
}

impl PollWatcher {
    /// Construct a new watcher (does not start the timer yet).
    #[must_use]
    pub fn new(
        session_id: String,
        poll_interval: Duration,
        deadline: Duration,
        event_tx: mpsc::Sender<WatchEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            session_id,
            poll_interval,
            deadline,
            event_tx,
            cancel,
        }
    }

    /// Spawn the background timer task and return a handle for stopping it.
    ///
    /// `fetch_status` must be a read-only, idempotent status fetch; the
    /// watcher never mutates session state itself. Per-tick fetch errors
    /// are logged and the loop keeps going.
    #[must_use]
    pub fn spawn<F, Fut>(self, fetch_status: F) -> PollWatcherHandle
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<SessionStatus>> + Send + 'static,
    {
        let cancel_for_handle = self.cancel.clone();
        let session_id = self.session_id.clone();

        let task_handle = tokio::spawn(
            Self::run(
                self.session_id,
                self.poll_interval,
                self.deadline,
                self.event_tx,
                self.cancel,
                fetch_status,
            )
            .instrument(info_span!("poll_watcher")),
        );

        PollWatcherHandle {
            session_id,
            cancel: cancel_for_handle,
            join_handle: Some(task_handle),
        }
    }

    /// Core timer loop. Returns after the first event send, so at most one
    /// event can ever leave this task.
    async fn run<F, Fut>(
        session_id: String,
        poll_interval: Duration,
        deadline: Duration,
        event_tx: mpsc::Sender<WatchEvent>,
        cancel: CancellationToken,
        fetch_status: F,
    ) where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<SessionStatus>> + Send + 'static,
    {
        let deadline_sleep = tokio::time::sleep(deadline);
        tokio::pin!(deadline_sleep);

        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!(session_id, "poll watcher cancelled");
                    return;
                }
                () = &mut deadline_sleep => {
                    debug!(session_id, "poll watcher deadline reached");
                    let _ = event_tx.send(WatchEvent::TimedOut { session_id }).await;
                    return;
                }
                _ = ticker.tick() => {
                    match fetch_status().await {
                        Ok(SessionStatus::Uploaded) => {
                            debug!(session_id, "upload detected");
                            let _ = event_tx.send(WatchEvent::Uploaded { session_id }).await;
                            return;
                        }
                        Ok(status) => {
                            debug!(session_id, ?status, "poll tick, still waiting");
                        }
                        Err(err) => {
                            // Transient fetch failures do not end the watch.
                            warn!(session_id, %err, "status fetch failed during poll");
                        }
                    }
                }
            }
        }
    }
}

/// Handle for a spawned poll watcher. Dropping the handle cancels the
/// watch, so navigation/unmount paths cannot leak timers.
pub struct PollWatcherHandle {
    session_id: String,
    cancel: CancellationToken,
    join_handle: Option<JoinHandle<()>>,
}

impl PollWatcherHandle {
    /// Session this handle watches.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Stop the watch: both the interval and the deadline die together.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the watcher task to finish.
    pub async fn join(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.join_handle.take() {
            if let Err(err) = handle.await {
                warn!(session_id = %self.session_id, %err, "poll watcher task panicked");
            }
        }
    }
}

impl Drop for PollWatcherHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
