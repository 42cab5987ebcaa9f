//! Terminal rendering of progress updates.
//!
//! [`ProgressDisplay`] is one consumer of the aggregator's broadcast stream:
//! a main bar counting finished tasks and one child bar per task that is
//! currently transferring.
//!
//! ```rust,no_run
//! use haul::progress::{ProgressAggregator, ProgressDisplay, StyleOptions};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() {
//! let progress = ProgressAggregator::new(64);
//! let display = Arc::new(ProgressDisplay::new(StyleOptions::default(), 3, false));
//! let stop = CancellationToken::new();
//! let follower = tokio::spawn(Arc::clone(&display).follow(progress.subscribe(), stop.clone()));
//!
//! // ... workers report into `progress` ...
//!
//! stop.cancel();
//! let _ = follower.await;
//! display.finish();
//! # }
//! ```

use super::aggregator::{ProgressReceiver, ProgressSnapshot};
use super::style::StyleOptions;
use crate::download::{TaskId, TaskState};

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Coordinates the main bar and the per-task bars.
pub struct ProgressDisplay {
    multi: MultiProgress,
    main: ProgressBar,
    children: Mutex<HashMap<TaskId, ProgressBar>>,
    labels: Mutex<HashMap<TaskId, String>>,
    style_options: StyleOptions,
    show_main_progress: bool,
}

impl ProgressDisplay {
    /// Create the display for a batch of `total_downloads` tasks.
    ///
    /// With `single_file_progress` set, a batch of one task shows only its
    /// child bar.
    pub fn new(
        style_options: StyleOptions,
        total_downloads: usize,
        single_file_progress: bool,
    ) -> Self {
        let multi = if style_options.is_enabled() {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };

        let show_main_progress = !single_file_progress || total_downloads > 1;
        let main = if show_main_progress {
            let main = multi.add(style_options.main().to_progress_bar(total_downloads as u64));
            main.tick();
            main
        } else {
            ProgressBar::hidden()
        };

        Self {
            multi,
            main,
            children: Mutex::new(HashMap::new()),
            labels: Mutex::new(HashMap::new()),
            style_options,
            show_main_progress,
        }
    }

    /// Name shown next to the task's bar.
    pub fn set_label(&self, task_id: TaskId, label: impl Into<String>) {
        if let Ok(mut labels) = self.labels.lock() {
            labels.insert(task_id, label.into());
        }
    }

    pub fn main(&self) -> &ProgressBar {
        &self.main
    }

    pub fn increment_main(&self) {
        self.main.inc(1);
    }

    /// Number of child bars currently shown.
    pub fn active_children(&self) -> usize {
        self.children.lock().map(|c| c.len()).unwrap_or_default()
    }

    /// Render one update.
    pub fn apply(&self, snapshot: &ProgressSnapshot) {
        let Ok(mut children) = self.children.lock() else {
            return;
        };

        if snapshot.state != TaskState::InProgress {
            if let Some(bar) = children.remove(&snapshot.task_id) {
                self.finish_child(bar);
            }
            return;
        }

        let bar = children.entry(snapshot.task_id).or_insert_with(|| {
            let bar = self.multi.add(
                self.style_options
                    .child()
                    .to_progress_bar(snapshot.total_bytes.unwrap_or(0)),
            );
            if let Some(label) = self
                .labels
                .lock()
                .ok()
                .and_then(|labels| labels.get(&snapshot.task_id).cloned())
            {
                bar.set_message(label);
            }
            bar
        });
        if let Some(total) = snapshot.total_bytes {
            if bar.length() != Some(total) {
                bar.set_length(total);
            }
        }
        bar.set_position(snapshot.bytes_downloaded);
    }

    /// Render updates from `receiver` until `stop` fires or the stream ends.
    pub async fn follow(self: Arc<Self>, mut receiver: ProgressReceiver, stop: CancellationToken) {
        loop {
            tokio::select! {
                update = receiver.recv() => match update {
                    Some(snapshot) => self.apply(&snapshot),
                    None => break,
                },
                _ = stop.cancelled() => {
                    while let Some(snapshot) = receiver.try_recv() {
                        self.apply(&snapshot);
                    }
                    break;
                }
            }
        }
    }

    /// Finish the main bar and any child bar left behind by cancellation.
    pub fn finish(&self) {
        if let Ok(mut children) = self.children.lock() {
            for (_, bar) in children.drain() {
                self.finish_child(bar);
            }
        }
        if self.show_main_progress {
            if self.style_options.main().clear {
                self.main.finish_and_clear();
            } else {
                self.main.finish();
            }
        }
    }

    fn finish_child(&self, bar: ProgressBar) {
        if self.style_options.child().clear {
            bar.finish_and_clear();
        } else {
            bar.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressAggregator;

    fn update(id: usize, state: TaskState, bytes: u64) -> ProgressSnapshot {
        ProgressSnapshot {
            task_id: TaskId(id),
            state,
            bytes_downloaded: bytes,
            total_bytes: Some(100),
            speed: 0.0,
            eta: None,
        }
    }

    #[test]
    fn child_bars_follow_task_state() {
        let display = ProgressDisplay::new(StyleOptions::hidden(), 2, false);
        display.apply(&update(0, TaskState::InProgress, 10));
        display.apply(&update(1, TaskState::InProgress, 20));
        assert_eq!(display.active_children(), 2);
        display.apply(&update(0, TaskState::Completed, 100));
        assert_eq!(display.active_children(), 1);
        display.apply(&update(1, TaskState::Paused, 20));
        assert_eq!(display.active_children(), 0);
    }

    #[test]
    fn main_bar_counts_finished_tasks() {
        let display = ProgressDisplay::new(StyleOptions::hidden(), 3, false);
        display.increment_main();
        display.increment_main();
        assert_eq!(display.main().position(), 2);
        display.finish();
    }

    #[tokio::test]
    async fn follow_drains_on_stop() {
        let progress = ProgressAggregator::new(8);
        let display = Arc::new(ProgressDisplay::new(StyleOptions::hidden(), 1, true));
        let stop = CancellationToken::new();
        let receiver = progress.subscribe();
        progress.report(update(0, TaskState::InProgress, 10));
        stop.cancel();
        Arc::clone(&display).follow(receiver, stop).await;
        assert_eq!(display.active_children(), 1);
        display.finish();
        assert_eq!(display.active_children(), 0);
    }
}
