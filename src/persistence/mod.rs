//! Persistence layer modules.

pub mod answer_repo;
pub mod db;
pub mod exam_repo;
pub mod roster_repo;
pub mod schema;
pub mod session_repo;

/// Re-export the database pool type for convenience.
pub use sqlx::SqlitePool;
