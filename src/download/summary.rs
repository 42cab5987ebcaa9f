//! Download summary functionality.
//!
//! A [`Summary`] is the final outcome record for one task: where the file
//! went, which state the task ended in, how many bytes are on disk and why it
//! failed, if it did. A [`BatchSummary`] groups the summaries of one batch
//! and counts the mixed results.
//!
//! # Examples
//!
//! ```rust,no_run
//! use haul::downloader::DownloaderBuilder;
//! use haul::download::Download;
//! use haul::TaskState;
//! use std::convert::TryFrom;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let downloader = DownloaderBuilder::hidden().build();
//! let batch = downloader
//!     .download(&[Download::try_from("https://example.com/file.zip")?])
//!     .await;
//!
//! for summary in batch.iter() {
//!     match summary.state() {
//!         TaskState::Completed => println!("{} bytes", summary.bytes_downloaded()),
//!         TaskState::Failed => println!("failed: {:?}", summary.error()),
//!         other => println!("left {}", other),
//!     }
//! }
//! println!("{}", batch);
//! # Ok(())
//! # }
//! ```

use super::download::Download;
use super::task::{DownloadTask, TaskState};
use crate::error::Failure;

use std::fmt;
use std::path::{Path, PathBuf};

/// Represents a [`Download`] summary.
#[derive(Debug, Clone)]
pub struct Summary {
    /// Downloaded item.
    download: Download,
    /// Resolved destination path.
    path: PathBuf,
    /// Final state.
    state: TaskState,
    /// Bytes on disk.
    bytes_downloaded: u64,
    /// Transfer attempts made.
    attempts: u32,
    /// Last failure, when the task did not complete.
    error: Option<Failure>,
}

impl Summary {
    /// Snapshot the outcome of `task`.
    pub fn from_task(download: Download, task: &DownloadTask) -> Self {
        Self {
            download,
            path: task.destination.clone(),
            state: task.state,
            bytes_downloaded: task.bytes_downloaded,
            attempts: task.attempt_count,
            error: task.last_error.clone(),
        }
    }

    /// Get a reference to the summary's download.
    pub fn download(&self) -> &Download {
        &self.download
    }

    /// Where the file was written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn bytes_downloaded(&self) -> u64 {
        self.bytes_downloaded
    }

    /// Number of transfer attempts. Zero when admission rejected the task or
    /// the file was already complete.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn error(&self) -> Option<&Failure> {
        self.error.as_ref()
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.state == TaskState::Completed
    }
}

/// Outcome of a whole batch, in submission order.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    summaries: Vec<Summary>,
}

impl BatchSummary {
    pub fn new(summaries: Vec<Summary>) -> Self {
        Self { summaries }
    }

    fn count(&self, state: TaskState) -> usize {
        self.summaries.iter().filter(|s| s.state == state).count()
    }

    pub fn completed(&self) -> usize {
        self.count(TaskState::Completed)
    }

    pub fn failed(&self) -> usize {
        self.count(TaskState::Failed)
    }

    pub fn paused(&self) -> usize {
        self.count(TaskState::Paused)
    }

    pub fn pending(&self) -> usize {
        self.count(TaskState::Pending)
    }

    pub fn len(&self) -> usize {
        self.summaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Summary> {
        self.summaries.iter()
    }

    /// Summaries in submission order.
    pub fn summaries(&self) -> &[Summary] {
        &self.summaries
    }

    pub fn into_inner(self) -> Vec<Summary> {
        self.summaries
    }
}

impl std::ops::Index<usize> for BatchSummary {
    type Output = Summary;

    fn index(&self, index: usize) -> &Self::Output {
        &self.summaries[index]
    }
}

impl IntoIterator for BatchSummary {
    type Item = Summary;
    type IntoIter = std::vec::IntoIter<Summary>;

    fn into_iter(self) -> Self::IntoIter {
        self.summaries.into_iter()
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tasks: {} completed, {} failed",
            self.len(),
            self.completed(),
            self.failed()
        )?;
        let paused = self.paused();
        if paused > 0 {
            write!(f, ", {} paused", paused)?;
        }
        let pending = self.pending();
        if pending > 0 {
            write!(f, ", {} not started", pending)?;
        }
        Ok(())
    }
}
