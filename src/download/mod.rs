//! Download module containing download-related functionality.
//!
//! This module provides the structures that describe a transfer from the
//! outside (what to fetch), from the inside (how far it got) and after the
//! fact (how it ended).
//!
//! # Overview
//!
//! - [`download`] - The [`Download`] input handed over by a resolver
//! - [`task`] - [`DownloadTask`] and its [`TaskState`] machine
//! - [`summary`] - Per-task [`Summary`] records and the [`BatchSummary`]
//! - [`marker`] - The [`ResumeMarker`] persisted next to partial files

pub mod download;
pub mod marker;
pub mod summary;
pub mod task;

pub use download::Download;
pub use marker::{marker_path, ResumeMarker};
pub use summary::{BatchSummary, Summary};
pub use task::{DownloadTask, TaskId, TaskState};
