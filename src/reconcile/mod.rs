//! Reconciliation modules.
//!
//! Covers the single-session pipeline engine and the multi-student
//! coordinator built on top of it.

pub mod coordinator;
pub mod engine;

pub use coordinator::MultiSessionCoordinator;
pub use engine::{ReconcileOutcome, ReconciliationEngine};
