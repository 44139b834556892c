//! Capture-side modules.
//!
//! Covers session lifecycle, image buffering and upload, hand-off link
//! generation, and upload detection by polling.

pub mod client;
pub mod handoff;
pub mod poll_watcher;
pub mod session_manager;
