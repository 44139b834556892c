//! Global configuration parsing, validation, and credential loading.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::{AppError, Result};

/// Object storage connectivity.
///
/// The API key is loaded at runtime from the environment, not from the
/// TOML config file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct StorageConfig {
    /// Base URL of the storage service, e.g. `https://host/storage/v1`.
    pub endpoint: String,
    /// Bucket that holds capture uploads and answer visuals.
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Bearer key for write operations (populated at runtime).
    #[serde(skip)]
    pub api_key: String,
}

fn default_bucket() -> String {
    "exam-visuals".into()
}

/// Extraction service connectivity and time bound.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ExtractionConfig {
    /// URL of the document-extraction endpoint.
    pub endpoint: String,
    /// Hard abort for a single extraction request.
    #[serde(default = "default_extraction_timeout")]
    pub timeout_seconds: u64,
}

fn default_extraction_timeout() -> u64 {
    300
}

/// Capture session lifetimes.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SessionConfig {
    /// Minutes until a QR hand-off session expires.
    #[serde(default = "default_session_ttl")]
    pub ttl_minutes: i64,
    /// Minutes until a direct-upload session expires.
    #[serde(default = "default_direct_ttl")]
    pub direct_ttl_minutes: i64,
}

fn default_session_ttl() -> i64 {
    60
}

fn default_direct_ttl() -> i64 {
    20
}

/// Poll watcher cadence and absolute deadline.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct PollConfig {
    /// Seconds between status fetches.
    #[serde(default = "default_poll_interval")]
    pub interval_seconds: u64,
    /// Absolute deadline for a watch, independent of the interval.
    #[serde(default = "default_poll_deadline")]
    pub deadline_seconds: u64,
}

fn default_poll_interval() -> u64 {
    5
}

fn default_poll_deadline() -> u64 {
    600
}

/// Reconciliation tunables.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ReconcileConfig {
    /// Rows per answer insert batch; bounds statement payload size.
    #[serde(default = "default_insert_batch")]
    pub insert_batch_size: usize,
}

fn default_insert_batch() -> usize {
    100
}

/// Worker sweep cadence.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct WorkerConfig {
    /// Seconds between sweeps over uploaded sessions and ready rosters.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

fn default_sweep_interval() -> u64 {
    15
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Path to the `SQLite` database file.
    pub database_path: PathBuf,
    /// Page the QR hand-off link points at; the token rides as a query param.
    pub capture_page_url: String,
    /// Page the multi-student hand-off link points at.
    pub multi_capture_page_url: String,
    /// Object storage connectivity.
    pub storage: StorageConfig,
    /// Extraction service connectivity.
    pub extraction: ExtractionConfig,
    /// Session lifetime settings.
    #[serde(default)]
    pub session: SessionConfig,
    /// Poll watcher settings.
    #[serde(default)]
    pub poll: PollConfig,
    /// Reconciliation settings.
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    /// Worker sweep settings.
    #[serde(default)]
    pub worker: WorkerConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_session_ttl(),
            direct_ttl_minutes: default_direct_ttl(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_poll_interval(),
            deadline_seconds: default_poll_deadline(),
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            insert_batch_size: default_insert_batch(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the storage API key from the environment.
    ///
    /// Reads `GRADESCAN_STORAGE_KEY`. A missing key is tolerated with a
    /// warning so read-only commands still work against public buckets.
    pub fn load_credentials(&mut self) {
        match env::var("GRADESCAN_STORAGE_KEY") {
            Ok(value) if !value.is_empty() => self.storage.api_key = value,
            _ => warn!("GRADESCAN_STORAGE_KEY not set; storage writes will be anonymous"),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.storage.endpoint.trim().is_empty() {
            return Err(AppError::Config("storage.endpoint must not be empty".into()));
        }
        if self.extraction.endpoint.trim().is_empty() {
            return Err(AppError::Config(
                "extraction.endpoint must not be empty".into(),
            ));
        }
        if self.capture_page_url.trim().is_empty() {
            return Err(AppError::Config("capture_page_url must not be empty".into()));
        }
        if self.reconcile.insert_batch_size == 0 {
            return Err(AppError::Config(
                "reconcile.insert_batch_size must be greater than zero".into(),
            ));
        }
        if self.session.ttl_minutes <= 0 || self.session.direct_ttl_minutes <= 0 {
            return Err(AppError::Config(
                "session lifetimes must be greater than zero".into(),
            ));
        }
        if self.poll.interval_seconds == 0 {
            return Err(AppError::Config(
                "poll.interval_seconds must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
