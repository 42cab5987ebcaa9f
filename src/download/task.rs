//! Mutable per-transfer state owned by the dispatcher.

use super::download::Download;
use crate::error::Failure;

use reqwest::header::HeaderMap;
use reqwest::Url;
use std::fmt;
use std::path::{Path, PathBuf};

/// Position of a task inside its batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub usize);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a [`DownloadTask`].
///
/// ```text
/// Pending -> InProgress -> { Completed, Paused, Failed }
/// Paused  -> InProgress
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Admitted but no attempt has started.
    Pending,
    /// An attempt is transferring bytes.
    InProgress,
    /// Stopped with partial bytes on disk; either waiting out a retry backoff
    /// or interrupted by cancellation.
    Paused,
    /// All bytes are on disk.
    Completed,
    /// Retry budget exhausted or non-retryable failure.
    Failed,
}

impl TaskState {
    /// Completed and Failed are never left.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// Pending may fail directly when admission rejects the destination, and
    /// may complete directly when the file is already on disk.
    pub fn can_transition_to(self, next: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (Pending, Failed)
                | (Pending, Completed)
                | (InProgress, Completed)
                | (InProgress, Paused)
                | (InProgress, Failed)
                | (Paused, InProgress)
                | (Paused, Failed)
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskState::Pending => "pending",
            TaskState::InProgress => "in progress",
            TaskState::Paused => "paused",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One unit of work: a single file transfer and everything learned about it.
#[derive(Debug, Clone)]
pub struct DownloadTask {
    pub id: TaskId,
    pub source: Url,
    pub destination: PathBuf,
    /// Size announced by the resolver.
    pub expected_size: Option<u64>,
    /// Total size reported by the server, once seen.
    pub total_size: Option<u64>,
    /// Bytes durably written to the destination.
    pub bytes_downloaded: u64,
    pub state: TaskState,
    pub attempt_count: u32,
    pub last_error: Option<Failure>,
    pub quality: Option<String>,
    /// Per-file request headers.
    pub headers: Option<HeaderMap>,
    /// The single integrity re-download has been spent.
    pub(crate) integrity_retry_used: bool,
    /// The next attempt must ignore partial bytes and skip the Range header.
    pub(crate) discard_partial: bool,
    /// Times the server answered a range request with the full body.
    pub(crate) range_fallbacks: u32,
}

impl DownloadTask {
    /// Build a task for `download`, resolving relative destinations against
    /// `directory`.
    pub fn new(id: TaskId, download: &Download, directory: &Path) -> Self {
        let destination = if download.destination.is_absolute() {
            download.destination.clone()
        } else {
            directory.join(&download.destination)
        };

        Self {
            id,
            source: download.url.clone(),
            destination,
            expected_size: download.expected_size,
            total_size: None,
            bytes_downloaded: 0,
            state: TaskState::Pending,
            attempt_count: 0,
            last_error: None,
            quality: download.quality.clone(),
            headers: download.headers.clone(),
            integrity_retry_used: false,
            discard_partial: false,
            range_fallbacks: 0,
        }
    }

    /// The size the finished file must have, if anyone knows it.
    pub fn known_size(&self) -> Option<u64> {
        self.expected_size.or(self.total_size)
    }

    /// Bytes still missing, if the size is known.
    pub fn remaining(&self) -> Option<u64> {
        self.known_size()
            .map(|size| size.saturating_sub(self.bytes_downloaded))
    }

    /// Move to `next`. Illegal transitions are programming errors.
    pub(crate) fn set_state(&mut self, next: TaskState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal task transition {} -> {} for {}",
            self.state,
            next,
            self.id
        );
        self.state = next;
    }

    /// Record a terminal failure.
    pub(crate) fn fail(&mut self, failure: Failure) {
        self.last_error = Some(failure);
        self.set_state(TaskState::Failed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> DownloadTask {
        let download = Download::new(&Url::parse("http://example.com/a.bin").unwrap(), "a.bin");
        DownloadTask::new(TaskId(0), &download, Path::new("/tmp/out"))
    }

    #[test]
    fn relative_destination_is_joined() {
        let t = task();
        assert_eq!(t.destination, PathBuf::from("/tmp/out/a.bin"));
        assert_eq!(t.state, TaskState::Pending);
    }

    #[test]
    fn terminal_states_are_never_left() {
        for next in [
            TaskState::Pending,
            TaskState::InProgress,
            TaskState::Paused,
            TaskState::Completed,
            TaskState::Failed,
        ] {
            assert!(!TaskState::Completed.can_transition_to(next));
            assert!(!TaskState::Failed.can_transition_to(next));
        }
    }

    #[test]
    fn resume_cycle_is_allowed() {
        assert!(TaskState::InProgress.can_transition_to(TaskState::Paused));
        assert!(TaskState::Paused.can_transition_to(TaskState::InProgress));
        assert!(!TaskState::Paused.can_transition_to(TaskState::Pending));
    }

    #[test]
    fn expected_size_wins_over_server_total() {
        let mut t = task();
        t.total_size = Some(50);
        assert_eq!(t.known_size(), Some(50));
        t.expected_size = Some(40);
        t.bytes_downloaded = 10;
        assert_eq!(t.known_size(), Some(40));
        assert_eq!(t.remaining(), Some(30));
    }
}
