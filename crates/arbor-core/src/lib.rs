//! arbor-core library.
//!
//! Issues in a repository form a forest: each issue has at most one parent
//! and any number of sub-issues. This crate stores that forest in SQLite,
//! validates parent changes against depth and size limits, and records every
//! change on both issues' timelines.
//!
//! # Conventions
//!
//! - **Errors**: `anyhow::Result` for storage helpers; [`hierarchy::HierarchyError`]
//!   for anything a caller may want to match on.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `error!`, `debug!`).

pub mod cancel;
pub mod config;
pub mod db;
pub mod error;
pub mod hierarchy;
pub mod model;
pub mod timing;

pub use cancel::{CancelToken, Cancellation, Checkpoint};
pub use config::{ConfigHandle, HierarchyConfig};
pub use hierarchy::{HierarchyError, HierarchyService};
pub use model::{Actor, Issue, NewIssue};
