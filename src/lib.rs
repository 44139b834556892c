#![forbid(unsafe_code)]

//! `gradescan` — exam submission capture and reconciliation pipeline.
//!
//! Captured answer images (QR hand-off, roster hand-off, or direct upload)
//! flow through object storage to an external document-extraction service;
//! the returned manifest is matched back to canonical sub-questions by text
//! key and persisted as the student's answer set.

pub mod capture;
pub mod config;
pub mod errors;
pub mod extraction;
pub mod models;
pub mod persistence;
pub mod reconcile;
pub mod storage;
pub mod worker;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
