//! Merge per-task progress into one consistent view.
//!
//! Workers report a [`ProgressSnapshot`] after every committed chunk. The
//! [`ProgressAggregator`] keeps the latest snapshot per task and fans every
//! update out through a bounded broadcast buffer. When a subscriber falls
//! behind, the oldest snapshots are dropped for that subscriber only; workers
//! never wait on a consumer.
//!
//! # Example
//!
//! ```rust
//! use haul::progress::{ProgressAggregator, ProgressSnapshot};
//! use haul::{TaskId, TaskState};
//!
//! # async fn example() {
//! let progress = ProgressAggregator::new(16);
//! let mut updates = progress.subscribe();
//!
//! progress.report(ProgressSnapshot {
//!     task_id: TaskId(0),
//!     state: TaskState::InProgress,
//!     bytes_downloaded: 512,
//!     total_bytes: Some(1024),
//!     speed: 256.0,
//!     eta: None,
//! });
//!
//! let update = updates.recv().await.unwrap();
//! assert_eq!(update.bytes_downloaded, 512);
//! assert_eq!(progress.overall().total_bytes, 1024);
//! # }
//! ```

use crate::download::{TaskId, TaskState};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

/// Point-in-time progress of one task.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub task_id: TaskId,
    pub state: TaskState,
    pub bytes_downloaded: u64,
    pub total_bytes: Option<u64>,
    /// Smoothed transfer rate in bytes per second.
    pub speed: f64,
    pub eta: Option<Duration>,
}

/// Merged view over every task known to the aggregator.
///
/// Byte counts and speed cover tasks that are not yet Completed or Failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverallProgress {
    pub bytes_downloaded: u64,
    pub total_bytes: u64,
    pub speed: f64,
    /// Longest known ETA among unfinished tasks.
    pub eta: Option<Duration>,
    pub active: usize,
    pub finished: usize,
}

#[derive(Debug)]
struct Inner {
    latest: Mutex<HashMap<TaskId, ProgressSnapshot>>,
    sender: broadcast::Sender<ProgressSnapshot>,
}

/// Collects snapshots from concurrent workers.
#[derive(Debug, Clone)]
pub struct ProgressAggregator {
    inner: Arc<Inner>,
}

impl Default for ProgressAggregator {
    fn default() -> Self {
        Self::new(64)
    }
}

impl ProgressAggregator {
    /// Create an aggregator whose subscribers buffer up to `capacity` updates.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                latest: Mutex::new(HashMap::new()),
                sender,
            }),
        }
    }

    /// Record `snapshot` as the latest state of its task and publish it.
    pub fn report(&self, snapshot: ProgressSnapshot) {
        if let Ok(mut latest) = self.inner.latest.lock() {
            latest.insert(snapshot.task_id, snapshot.clone());
        }
        // No subscribers is fine.
        let _ = self.inner.sender.send(snapshot);
    }

    /// Forget every task. Task ids restart at zero with each batch, so the
    /// dispatcher clears the view before a new one starts.
    pub fn clear(&self) {
        if let Ok(mut latest) = self.inner.latest.lock() {
            latest.clear();
        }
    }

    pub fn subscribe(&self) -> ProgressReceiver {
        ProgressReceiver {
            receiver: self.inner.sender.subscribe(),
            dropped: 0,
        }
    }

    /// Latest snapshot reported for `task_id`.
    pub fn snapshot(&self, task_id: TaskId) -> Option<ProgressSnapshot> {
        self.inner
            .latest
            .lock()
            .ok()
            .and_then(|latest| latest.get(&task_id).cloned())
    }

    pub fn overall(&self) -> OverallProgress {
        let Ok(latest) = self.inner.latest.lock() else {
            return OverallProgress::default();
        };
        let mut overall = OverallProgress::default();
        for snapshot in latest.values() {
            if snapshot.state.is_terminal() {
                overall.finished += 1;
                continue;
            }
            overall.active += 1;
            overall.bytes_downloaded += snapshot.bytes_downloaded;
            overall.total_bytes += snapshot.total_bytes.unwrap_or(snapshot.bytes_downloaded);
            overall.speed += snapshot.speed;
            if let Some(eta) = snapshot.eta {
                overall.eta = Some(overall.eta.map_or(eta, |current| current.max(eta)));
            }
        }
        overall
    }
}

/// A subscription to progress updates.
#[derive(Debug)]
pub struct ProgressReceiver {
    receiver: broadcast::Receiver<ProgressSnapshot>,
    dropped: u64,
}

impl ProgressReceiver {
    /// Next update, skipping any that were overwritten while lagging.
    ///
    /// Returns `None` once the aggregator is gone.
    pub async fn recv(&mut self) -> Option<ProgressSnapshot> {
        loop {
            match self.receiver.recv().await {
                Ok(snapshot) => return Some(snapshot),
                Err(RecvError::Lagged(skipped)) => self.dropped += skipped,
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next buffered update without waiting.
    pub fn try_recv(&mut self) -> Option<ProgressSnapshot> {
        loop {
            match self.receiver.try_recv() {
                Ok(snapshot) => return Some(snapshot),
                Err(TryRecvError::Lagged(skipped)) => self.dropped += skipped,
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Updates this receiver lost by falling behind.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
