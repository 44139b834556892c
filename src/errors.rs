//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Bad caller input; retrying with the same input cannot succeed.
    Validation(String),
    /// Requested entity does not exist.
    NotFound(String),
    /// Capture session exists but its expiry deadline has passed.
    Expired(String),
    /// Illegal session status transition; the stored state is unchanged.
    State(String),
    /// Extraction request exceeded its time bound.
    Timeout(String),
    /// Extraction service returned a non-2xx response.
    Service {
        /// Upstream HTTP status code.
        status: u16,
        /// Upstream response body, for diagnostics.
        body: String,
    },
    /// Extraction archive is malformed (missing or ambiguous manifest).
    Format(String),
    /// Persistence failure when interacting with `SQLite`.
    Db(String),
    /// Object storage put/get/remove failure.
    Storage(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Validation(msg) => write!(f, "validation: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Expired(msg) => write!(f, "expired: {msg}"),
            Self::State(msg) => write!(f, "state: {msg}"),
            Self::Timeout(msg) => write!(f, "timeout: {msg}"),
            Self::Service { status, body } => write!(f, "service: upstream {status}: {body}"),
            Self::Format(msg) => write!(f, "format: {msg}"),
            Self::Db(msg) => write!(f, "db: {msg}"),
            Self::Storage(msg) => write!(f, "storage: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
