#![forbid(unsafe_code)]

//! `gradescan` — capture-and-reconciliation worker binary.
//!
//! Bootstraps configuration, opens the `SQLite` store, and either runs the
//! sweep worker or performs one-shot operator commands.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use gradescan::capture::handoff::HandoffChannel;
use gradescan::capture::session_manager;
use gradescan::config::GlobalConfig;
use gradescan::extraction::HttpExtractionGateway;
use gradescan::models::session::StudentIdentity;
use gradescan::persistence::answer_repo::AnswerRepo;
use gradescan::persistence::db;
use gradescan::persistence::exam_repo::ExamRepo;
use gradescan::persistence::roster_repo::RosterRepo;
use gradescan::persistence::session_repo::SessionRepo;
use gradescan::reconcile::{MultiSessionCoordinator, ReconciliationEngine};
use gradescan::storage::HttpObjectStore;
use gradescan::{worker, AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "gradescan", about = "Exam capture and reconciliation worker", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the sweep loop until interrupted.
    Serve,
    /// Run a single sweep pass, then exit.
    Sweep,
    /// Create a capture session and print its hand-off URL.
    Handoff {
        /// Exam the session belongs to.
        #[arg(long)]
        exam_id: String,
        /// Student display name.
        #[arg(long)]
        name: Option<String>,
        /// Student number.
        #[arg(long)]
        number: Option<String>,
    },
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("gradescan worker bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let mut config = GlobalConfig::load_from_path(&args.config)?;
    config.load_credentials();
    info!("configuration loaded");

    let pool = Arc::new(db::connect(&config.database_path).await?);
    info!(db = %config.database_path.display(), "database ready");

    let sessions = SessionRepo::new(Arc::clone(&pool));
    let rosters = RosterRepo::new(Arc::clone(&pool));
    let exams = ExamRepo::new(Arc::clone(&pool));
    let answers = AnswerRepo::new(Arc::clone(&pool));

    let store = HttpObjectStore::new(&config.storage);
    let gateway = HttpExtractionGateway::new(&config.extraction);
    let engine = ReconciliationEngine::new(
        &store,
        &gateway,
        &sessions,
        &exams,
        &answers,
        config.reconcile.insert_batch_size,
    );
    let coordinator = MultiSessionCoordinator::new(&rosters, &exams);

    match args.command {
        Command::Serve => {
            let cancel = CancellationToken::new();
            let cancel_for_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("shutdown signal received");
                    cancel_for_signal.cancel();
                }
            });
            worker::serve(
                &engine,
                &sessions,
                &rosters,
                &coordinator,
                Duration::from_secs(config.worker.sweep_interval_seconds),
                cancel,
            )
            .await
        }
        Command::Sweep => {
            let report = worker::sweep_once(&engine, &sessions, &rosters, &coordinator).await?;
            info!(
                sessions_processed = report.sessions_processed,
                sessions_failed = report.sessions_failed,
                entries_processed = report.entries_processed,
                entries_failed = report.entries_failed,
                "sweep finished"
            );
            Ok(())
        }
        Command::Handoff {
            exam_id,
            name,
            number,
        } => {
            let identity = StudentIdentity::new(name.as_deref(), number.as_deref());
            let session = session_manager::create(
                &sessions,
                &exams,
                &exam_id,
                &identity,
                config.session.ttl_minutes,
            )
            .await?;
            let handoff = HandoffChannel::new(
                config.capture_page_url.clone(),
                config.multi_capture_page_url.clone(),
            );
            println!("{}", handoff.share_url(&session.token));
            Ok(())
        }
    }
}

fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => builder
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }
    Ok(())
}
