//! Background worker: sweeps uploaded captures through the pipeline.
//!
//! The serve loop wakes on a fixed interval, finds single sessions sitting
//! in `uploaded` and rosters whose entries have all uploaded, and drives
//! each through extraction and reconciliation. Per-capture failures are
//! isolated: they are recorded on the session or entry and the sweep moves
//! on.

use std::time::Duration;

use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::extraction::Extractor;
use crate::persistence::roster_repo::RosterRepo;
use crate::persistence::session_repo::SessionRepo;
use crate::reconcile::{MultiSessionCoordinator, ReconciliationEngine};
use crate::storage::ObjectStore;
use crate::Result;

/// Counters for one sweep pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct SweepReport {
    /// Single sessions reconciled successfully.
    pub sessions_processed: usize,
    /// Single sessions whose pipeline failed.
    pub sessions_failed: usize,
    /// Roster entries reconciled successfully.
    pub entries_processed: usize,
    /// Roster entries whose pipeline failed.
    pub entries_failed: usize,
}

/// Run one sweep over uploaded sessions and ready rosters.
///
/// # Errors
///
/// Returns `AppError::Db` when the work lists cannot be read; per-capture
/// pipeline failures are counted, not propagated.
pub async fn sweep_once<S: ObjectStore, E: Extractor>(
    engine: &ReconciliationEngine<'_, S, E>,
    sessions: &SessionRepo,
    rosters: &RosterRepo,
    coordinator: &MultiSessionCoordinator<'_>,
) -> Result<SweepReport> {
    let mut report = SweepReport::default();

    // Independent per-student extract+persist tasks run concurrently and
    // are joined; one student's failure never blocks another's.
    let uploaded = sessions.list_uploaded().await?;
    let results = join_all(uploaded.iter().map(|session| {
        let session_id = session.id.clone();
        async move { (session_id.clone(), engine.process_session(&session_id).await) }
    }))
    .await;
    for (session_id, result) in results {
        match result {
            Ok(_) => report.sessions_processed += 1,
            Err(err) => {
                warn!(session_id, %err, "session sweep item failed");
                report.sessions_failed += 1;
            }
        }
    }

    for roster in rosters.list_ready().await? {
        // Capture is finished for this roster; flip the wrapper before
        // processing so the capture surface shows its completion screen.
        coordinator.refresh_status(&roster.id).await?;
        let summary = coordinator.sweep(engine, &roster.id).await?;
        report.entries_processed += summary.processed.len();
        report.entries_failed += summary.failed.len();
    }

    Ok(report)
}

/// Interval-driven serve loop; stops cleanly when the token is cancelled.
///
/// # Errors
///
/// Returns `AppError::Db` when a sweep cannot read its work lists.
pub async fn serve<S: ObjectStore, E: Extractor>(
    engine: &ReconciliationEngine<'_, S, E>,
    sessions: &SessionRepo,
    rosters: &RosterRepo,
    coordinator: &MultiSessionCoordinator<'_>,
    sweep_interval: Duration,
    cancel: CancellationToken,
) -> Result<()> {
    let mut ticker = tokio::time::interval(sweep_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!(interval_secs = sweep_interval.as_secs(), "worker serve loop started");
    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                info!("worker serve loop stopped");
                return Ok(());
            }
            _ = ticker.tick() => {
                let report = sweep_once(engine, sessions, rosters, coordinator).await?;
                debug!(
                    sessions_processed = report.sessions_processed,
                    sessions_failed = report.sessions_failed,
                    entries_processed = report.entries_processed,
                    entries_failed = report.entries_failed,
                    "sweep pass finished"
                );
            }
        }
    }
}
