//! Work dispatcher.
//!
//! [`Downloader::download`] admits a batch of tasks, keeps at most
//! `concurrent_downloads` attempts in flight and hands every attempt's
//! outcome to the [`RetryController`]. Tasks waiting out a retry backoff do
//! not occupy a slot; when their delay ends they go back to the head of the
//! queue.
//!
//! # Examples
//!
//! ## Basic Download
//!
//! ```rust,no_run
//! use haul::{Download, DownloaderBuilder};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let downloader = DownloaderBuilder::new().build();
//! let downloads = vec![
//!     Download::try_from("https://example.com/file1.zip")?,
//!     Download::try_from("https://example.com/file2.pdf")?.with_expected_size(2048),
//! ];
//!
//! let batch = downloader.download(&downloads).await;
//! for summary in batch.iter() {
//!     println!("{} - {:?}", summary.path().display(), summary.state());
//! }
//! println!("{batch}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Stopping a Batch
//!
//! ```rust,no_run
//! use haul::{Download, DownloaderBuilder};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let downloader = DownloaderBuilder::hidden().build();
//! let token = downloader.cancellation_token();
//! tokio::spawn(async move {
//!     tokio::time::sleep(Duration::from_secs(5)).await;
//!     token.cancel();
//! });
//!
//! let batch = downloader
//!     .download(&[Download::try_from("https://example.com/big.iso")?])
//!     .await;
//! // Anything interrupted is Paused and resumes on the next run.
//! println!("{} paused", batch.paused());
//! # Ok(())
//! # }
//! ```

use super::config::DownloaderConfig;
use super::worker::Worker;
use crate::download::{marker_path, BatchSummary, Download, DownloadTask, Summary, TaskId, TaskState};
use crate::error::Failure;
use crate::http::{SessionConfig, SessionPool};
use crate::progress::{ProgressAggregator, ProgressDisplay, ProgressReceiver, ProgressSnapshot};
use crate::retry::{Decision, RetryController, RetryPolicy};

use futures::stream::{FuturesUnordered, StreamExt};
use reqwest::header::HeaderMap;
use std::collections::VecDeque;
use std::fmt;
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::{self, OpenOptions};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Represents the download controller.
///
/// A downloader can be created via its builder:
///
/// ```rust
/// use haul::DownloaderBuilder;
///
/// let d = DownloaderBuilder::new().build();
/// ```
///
/// Cancelling the downloader's token stops the current batch and every later
/// one; build a new downloader to resume.
#[derive(Clone)]
pub struct Downloader {
    config: DownloaderConfig,
    progress: ProgressAggregator,
    cancel: CancellationToken,
}

impl Debug for Downloader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Downloader")
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl Downloader {
    pub(crate) fn new(config: DownloaderConfig, cancel: CancellationToken) -> Self {
        let progress = ProgressAggregator::new(config.progress_capacity);
        Self {
            config,
            progress,
            cancel,
        }
    }

    /// Gets the directory against which relative destinations are resolved.
    pub fn directory(&self) -> &PathBuf {
        &self.config.directory
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.config.retry_policy
    }

    /// Gets the number of concurrent downloads.
    pub fn concurrent_downloads(&self) -> usize {
        self.config.concurrent_downloads
    }

    pub fn session(&self) -> &SessionConfig {
        &self.config.session
    }

    /// Gets the custom headers.
    pub fn headers(&self) -> Option<&HeaderMap> {
        self.config.session.headers.as_ref()
    }

    pub fn chunk_size(&self) -> usize {
        self.config.chunk_size
    }

    /// Gets whether downloads are resumable.
    pub fn resumable(&self) -> bool {
        self.config.resumable
    }

    /// Gets whether to show single file progress.
    pub fn single_file_progress(&self) -> bool {
        self.config.single_file_progress
    }

    /// Gets whether to overwrite existing files.
    pub fn overwrite(&self) -> bool {
        self.config.overwrite
    }

    /// Progress of the current batch, or of the last one once it returned.
    pub fn progress(&self) -> &ProgressAggregator {
        &self.progress
    }

    /// Subscribe to progress updates.
    pub fn subscribe(&self) -> ProgressReceiver {
        self.progress.subscribe()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop every running and queued transfer.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Run the batch to completion or cancellation.
    ///
    /// A single task's failure never aborts the batch. The returned summaries
    /// follow the order of `downloads`.
    pub async fn download(&self, downloads: &[Download]) -> BatchSummary {
        self.progress.clear();
        let tasks: Vec<DownloadTask> = downloads
            .iter()
            .enumerate()
            .map(|(index, download)| {
                DownloadTask::new(TaskId(index), download, &self.config.directory)
            })
            .collect();
        let mut results: Vec<Option<Summary>> = (0..tasks.len()).map(|_| None).collect();

        let display = Arc::new(ProgressDisplay::new(
            self.config.style_options.clone(),
            tasks.len(),
            self.config.single_file_progress,
        ));
        for task in &tasks {
            let label = task
                .destination
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| task.source.to_string());
            display.set_label(task.id, label);
        }
        let stop_display = CancellationToken::new();
        let follower = tokio::spawn(
            Arc::clone(&display).follow(self.progress.subscribe(), stop_display.clone()),
        );

        info!(
            "Downloading {} files, {} at a time",
            tasks.len(),
            self.config.concurrent_downloads
        );

        let pool = self.config.retry_policy.validate().and_then(|_| {
            SessionPool::new(
                self.config.session.clone(),
                self.config.concurrent_downloads,
            )
        });
        match pool {
            Ok(pool) => {
                let worker = Worker::new(
                    Arc::new(pool),
                    self.progress.clone(),
                    self.config.chunk_size,
                    self.cancel.clone(),
                );
                self.schedule(tasks, &worker, downloads, &mut results, &display)
                    .await;
            }
            Err(e) => {
                warn!("Cannot start the batch: {}", e);
                for mut task in tasks {
                    task.fail(Failure::fatal(format!("cannot start the batch: {e}")));
                    self.finish(task, downloads, &mut results, &display);
                }
            }
        }

        stop_display.cancel();
        if let Err(e) = follower.await {
            debug!("Progress display stopped abnormally: {}", e);
        }
        display.finish();

        let batch = BatchSummary::new(results.into_iter().flatten().collect());
        info!("{}", batch);
        batch
    }

    async fn schedule(
        &self,
        tasks: Vec<DownloadTask>,
        worker: &Worker,
        downloads: &[Download],
        results: &mut [Option<Summary>],
        display: &ProgressDisplay,
    ) {
        let controller = RetryController::new(self.config.retry_policy);
        let limit = self.config.concurrent_downloads.max(1);

        let mut queue: VecDeque<DownloadTask> = tasks.into();
        let mut running = FuturesUnordered::new();
        let mut waiting = FuturesUnordered::new();

        loop {
            while !self.cancel.is_cancelled() && running.len() < limit {
                let Some(task) = queue.pop_front() else {
                    break;
                };
                running.push(self.run(task, worker, &controller));
            }
            if running.is_empty() && waiting.is_empty() {
                break;
            }

            tokio::select! {
                Some((task, decision)) = running.next(), if !running.is_empty() => match decision {
                    Decision::RetryAfter(delay) => {
                        self.report(&task);
                        waiting.push(backoff(task, delay, self.cancel.clone()));
                    }
                    Decision::Finished | Decision::Paused => {
                        self.finish(task, downloads, results, display);
                    }
                },
                Some((task, elapsed)) = waiting.next(), if !waiting.is_empty() => {
                    if elapsed {
                        queue.push_front(task);
                    } else {
                        self.finish(task, downloads, results, display);
                    }
                }
            }
        }

        // Cancellation leaves never-started tasks Pending and retried ones Paused.
        for task in queue {
            self.finish(task, downloads, results, display);
        }
    }

    /// Admit `task` if it has not started yet, then run one attempt.
    async fn run(
        &self,
        mut task: DownloadTask,
        worker: &Worker,
        controller: &RetryController,
    ) -> (DownloadTask, Decision) {
        if task.state == TaskState::Pending {
            match self.admit(&mut task).await {
                Ok(true) => {}
                Ok(false) => return (task, Decision::Finished),
                Err(failure) => {
                    warn!("Cannot download to {}: {}", task.destination.display(), failure);
                    task.fail(failure);
                    return (task, Decision::Finished);
                }
            }
        }

        // Cancelled while admitting: nothing was sent, so no attempt is counted.
        if self.cancel.is_cancelled() {
            return (task, Decision::Paused);
        }

        controller.begin_attempt(&mut task);
        let outcome = worker.attempt(&mut task).await;
        let decision = controller.decide(&mut task, outcome);
        (task, decision)
    }

    /// Prepare the destination. `Ok(false)` means nothing is left to transfer.
    async fn admit(&self, task: &mut DownloadTask) -> Result<bool, Failure> {
        let destination = task.destination.clone();
        if destination.file_name().is_none() {
            return Err(Failure::fatal(format!(
                "invalid destination {:?}",
                destination
            )));
        }

        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            debug!("Creating destination directory {:?}", parent);
            fs::create_dir_all(parent).await.map_err(|e| {
                Failure::fatal(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        match fs::metadata(&destination).await {
            Ok(meta) if meta.is_dir() => {
                return Err(Failure::fatal(format!(
                    "{} is a directory",
                    destination.display()
                )));
            }
            Ok(meta) if !self.config.overwrite => {
                let has_marker = fs::try_exists(marker_path(&destination))
                    .await
                    .unwrap_or(false);
                if !has_marker && task.expected_size == Some(meta.len()) {
                    info!("{} is already complete, skipping", destination.display());
                    task.bytes_downloaded = meta.len();
                    task.total_size = Some(meta.len());
                    task.set_state(TaskState::Completed);
                    return Ok(false);
                }
            }
            _ => {}
        }

        if self.config.overwrite || !self.config.resumable {
            task.discard_partial = true;
        }

        debug!("Creating destination file {:?}", &destination);
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&destination)
            .await
            .map_err(|e| Failure::fatal(format!("cannot open {}: {}", destination.display(), e)))?;
        Ok(true)
    }

    /// Archive a task that will not run again in this batch.
    fn finish(
        &self,
        task: DownloadTask,
        downloads: &[Download],
        results: &mut [Option<Summary>],
        display: &ProgressDisplay,
    ) {
        let index = task.id.0;
        let summary = Summary::from_task(downloads[index].clone(), &task);
        self.report(&task);

        if task.state.is_terminal() {
            display.increment_main();
            if let Some(ref callback) = self.config.on_complete {
                callback(&summary);
            }
        }
        results[index] = Some(summary);
    }

    fn report(&self, task: &DownloadTask) {
        self.progress.report(ProgressSnapshot {
            task_id: task.id,
            state: task.state,
            bytes_downloaded: task.bytes_downloaded,
            total_bytes: task.known_size(),
            speed: 0.0,
            eta: None,
        });
    }
}

/// Sleep out a retry delay. Yields `false` if cancelled first.
async fn backoff(
    task: DownloadTask,
    delay: Duration,
    cancel: CancellationToken,
) -> (DownloadTask, bool) {
    tokio::select! {
        _ = cancel.cancelled() => (task, false),
        _ = tokio::time::sleep(delay) => (task, true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::DownloaderBuilder;
    use reqwest::Url;

    #[tokio::test]
    async fn cancelled_before_the_first_attempt_counts_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = DownloaderBuilder::hidden()
            .directory(dir.path().to_path_buf())
            .build();
        let pool = SessionPool::new(SessionConfig::default(), 1).unwrap();
        let worker = Worker::new(
            Arc::new(pool),
            downloader.progress.clone(),
            1024,
            downloader.cancellation_token(),
        );
        let controller = RetryController::new(RetryPolicy::default());

        let url = Url::parse("http://127.0.0.1:9/a.bin").unwrap();
        let task = DownloadTask::new(TaskId(0), &Download::new(&url, "a.bin"), dir.path());
        downloader.cancel();

        let (task, decision) = downloader.run(task, &worker, &controller).await;
        assert_eq!(decision, Decision::Paused);
        assert_eq!(task.state, TaskState::Pending);
        assert_eq!(task.attempt_count, 0);
    }
}
