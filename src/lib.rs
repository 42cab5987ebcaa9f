//! Haul is a resumable, parallel download engine.
//!
//! It runs batches of HTTP(S) transfers with bounded concurrency, resumes
//! partial files through byte-range requests, retries transient failures
//! with exponential backoff and reports live progress.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use haul::{Download, DownloaderBuilder, Error};
//! use std::path::PathBuf;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Error> {
//! let reqwest_rs = "https://github.com/seanmonstar/reqwest/archive/refs/tags/v0.11.9.zip";
//! let downloads = vec![Download::try_from(reqwest_rs)?];
//! let downloader = DownloaderBuilder::new()
//!     .directory(PathBuf::from("output"))
//!     .build();
//! let batch = downloader.download(&downloads).await;
//! println!("{batch}");
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`download`] - What to fetch, per-task state, outcomes and resume markers
//! - [`downloader`] - The dispatcher, its builder and the transfer worker
//! - [`retry`] - Failure classification, backoff and the attempt budget
//! - [`http`] - The shared session pool and client setup
//! - [`progress`] - Progress aggregation, speed estimation and terminal bars
//! - [`config`] - Settings filled by an external loader
//! - [`error`] - Crate errors and the transfer failure taxonomy
//! - [`logging`] - Optional `tracing` subscriber setup
//! - [`utils`] - Response header helpers

pub mod config;
pub mod download;
pub mod downloader;
pub mod error;
pub mod http;
pub mod logging;
pub mod progress;
pub mod retry;
pub mod utils;

pub use config::Settings;
pub use download::{BatchSummary, Download, DownloadTask, Summary, TaskId, TaskState};
pub use downloader::{Downloader, DownloaderBuilder};
pub use error::{Error, Failure, FailureKind, Result};
pub use http::{RotationPolicy, SessionConfig, SessionPool};
pub use progress::{
    OverallProgress, ProgressAggregator, ProgressBarOpts, ProgressReceiver, ProgressSnapshot,
    StyleOptions,
};
pub use retry::RetryPolicy;
pub use tokio_util::sync::CancellationToken;
