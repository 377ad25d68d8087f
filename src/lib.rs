//! Recitation review and scoring core for the Ngaji app.
//!
//! Students submit recitations, teachers accept or reject them, and accepted
//! work credits a per-student ledger and juz-completion labels. The crate is
//! driven by the `ngajid` sidecar binary over line-delimited JSON, but every
//! operation is also callable directly against a `rusqlite::Connection`.

pub mod backup;
pub mod config;
pub mod db;
pub mod error;
pub mod ipc;
pub mod ledger;
pub mod media;
pub mod model;
pub mod monitoring;
pub mod navigation;
pub mod roster;
pub mod submissions;
pub mod workflow;

pub use error::{NgajiError, Result};
