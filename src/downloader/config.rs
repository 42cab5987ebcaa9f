//! Configuration structures and defaults for the downloader.
//!
//! [`DownloaderConfig`] is filled by [`DownloaderBuilder`](super::DownloaderBuilder)
//! and is immutable once the [`Downloader`](super::Downloader) is built.
//!
//! # Example
//!
//! ```rust
//! use haul::downloader::DownloadCallback;
//! use haul::{Summary, TaskState};
//!
//! let callback: DownloadCallback = Box::new(|summary: &Summary| match summary.state() {
//!     TaskState::Completed => println!("done: {}", summary.path().display()),
//!     TaskState::Failed => println!(
//!         "failed: {} ({})",
//!         summary.path().display(),
//!         summary.error().map(|e| e.to_string()).unwrap_or_default()
//!     ),
//!     _ => {}
//! });
//! ```

use crate::download::Summary;
use crate::http::SessionConfig;
use crate::progress::StyleOptions;
use crate::retry::RetryPolicy;

use std::env::current_dir;
use std::path::PathBuf;
use std::sync::Arc;

/// Callback invoked once per task when it reaches a terminal state.
pub type DownloadCallback = Box<dyn Fn(&Summary) + Send + Sync>;

/// Allowed range for the number of simultaneous transfers.
pub const CONCURRENCY_RANGE: std::ops::RangeInclusive<usize> = 1..=10;

/// Default size of the write buffer per task.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Configuration structure for the downloader
#[derive(Clone)]
pub struct DownloaderConfig {
    /// Directory against which relative destinations are resolved.
    pub directory: PathBuf,
    /// Number of maximum concurrent downloads.
    pub concurrent_downloads: usize,
    pub retry_policy: RetryPolicy,
    pub session: SessionConfig,
    /// Bytes buffered before each write to disk.
    pub chunk_size: usize,
    /// Progress updates buffered per subscriber.
    pub progress_capacity: usize,
    /// Downloader style options.
    pub style_options: StyleOptions,
    /// Hide main progress bar for single file downloads.
    pub single_file_progress: bool,
    /// Callback for when each download completes.
    pub on_complete: Option<Arc<DownloadCallback>>,
    /// Resume partial files from their marker.
    pub resumable: bool,
    /// Force download and overwrite existing files.
    pub overwrite: bool,
}

impl std::fmt::Debug for DownloaderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloaderConfig")
            .field("directory", &self.directory)
            .field("concurrent_downloads", &self.concurrent_downloads)
            .field("retry_policy", &self.retry_policy)
            .field("session", &self.session)
            .field("chunk_size", &self.chunk_size)
            .field("progress_capacity", &self.progress_capacity)
            .field("style_options", &self.style_options)
            .field("single_file_progress", &self.single_file_progress)
            .field("on_complete", &self.on_complete.is_some())
            .field("resumable", &self.resumable)
            .field("overwrite", &self.overwrite)
            .finish()
    }
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            directory: current_dir().unwrap_or_default(),
            concurrent_downloads: 3,
            retry_policy: RetryPolicy::default(),
            session: SessionConfig::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            progress_capacity: 64,
            style_options: StyleOptions::default(),
            single_file_progress: false,
            on_complete: None,
            resumable: true,
            overwrite: false,
        }
    }
}
