//! One transfer attempt for one task.
//!
//! The worker resumes from the task's marker when it can, streams the body
//! into bounded chunks and makes every chunk durable before recording it:
//! bytes are written, flushed and synced, then the marker is replaced, then
//! the task's counters move and a progress snapshot goes out.

use crate::download::{DownloadTask, ResumeMarker, TaskState};
use crate::error::Failure;
use crate::http::SessionPool;
use crate::progress::{ProgressAggregator, ProgressSnapshot, SpeedEstimator};
use crate::retry::{classify_body_error, classify_request_error, status_failure, AttemptOutcome};
use crate::utils::{content_range, parse_content_range_start, parse_content_range_total, total_size};

use futures::StreamExt;
use reqwest::{header::RANGE, StatusCode};
use std::io::SeekFrom;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

type Step<T> = Result<T, Failure>;

/// Runs attempts against the shared session.
#[derive(Debug, Clone)]
pub struct Worker {
    pool: Arc<SessionPool>,
    progress: ProgressAggregator,
    chunk_size: usize,
    timeout: Duration,
    cancel: CancellationToken,
}

impl Worker {
    pub fn new(
        pool: Arc<SessionPool>,
        progress: ProgressAggregator,
        chunk_size: usize,
        cancel: CancellationToken,
    ) -> Self {
        let timeout = pool.config().timeout;
        Self {
            pool,
            progress,
            chunk_size: chunk_size.max(1),
            timeout,
            cancel,
        }
    }

    /// Run one attempt. The task must already be InProgress.
    pub async fn attempt(&self, task: &mut DownloadTask) -> AttemptOutcome {
        if self.cancel.is_cancelled() {
            return paused(task);
        }
        match self.transfer(task).await {
            Ok(outcome) => outcome,
            Err(failure) => AttemptOutcome::from_failure(failure),
        }
    }

    async fn transfer(&self, task: &mut DownloadTask) -> Step<AttemptOutcome> {
        let mut offset = self.resume_offset(task).await;
        let mut file = open_at(task, offset).await?;
        task.bytes_downloaded = offset;
        if offset == 0 {
            forget_marker(task).await;
        }

        let lease = tokio::select! {
            _ = self.cancel.cancelled() => return Ok(paused(task)),
            lease = self.pool.acquire(&task.source) => lease.map_err(|e| Failure::fatal(e.to_string()))?,
        };

        let mut request = lease.get(task.source.clone());
        if let Some(headers) = &task.headers {
            let mut headers = headers.clone();
            headers.remove(RANGE);
            request = request.headers(headers);
        }
        if offset > 0 {
            request = request.header(RANGE, format!("bytes={}-", offset));
        }
        debug!("Fetching {} from byte {}", task.source, offset);

        let response = tokio::select! {
            _ = self.cancel.cancelled() => return Ok(paused(task)),
            sent = timeout(self.timeout, request.send()) => match sent {
                Err(_) => {
                    return Err(Failure::transport(format!(
                        "no response within {:?}",
                        self.timeout
                    )))
                }
                Ok(Err(e)) => return Err(Failure::new(classify_request_error(&e), e.to_string())),
                Ok(Ok(response)) => response,
            },
        };

        let status = response.status();
        match status {
            StatusCode::PARTIAL_CONTENT => {
                let start = content_range(&response).and_then(parse_content_range_start);
                if start.unwrap_or(0) != offset {
                    return Err(Failure::integrity(format!(
                        "server resumed at byte {:?} instead of {}",
                        start, offset
                    ))
                    .with_status(status));
                }
            }
            StatusCode::OK if offset > 0 => {
                task.range_fallbacks += 1;
                if task.range_fallbacks > 1 {
                    return Err(Failure::integrity("server keeps ignoring range requests")
                        .with_status(status));
                }
                warn!(
                    "{} ignored the range request, restarting {} from the first byte",
                    lease.host(),
                    task.destination.display()
                );
                file = open_at(task, 0).await?;
                forget_marker(task).await;
                offset = 0;
                task.bytes_downloaded = 0;
            }
            StatusCode::RANGE_NOT_SATISFIABLE => {
                let total = content_range(&response).and_then(parse_content_range_total);
                let expected_ok = task.expected_size.map_or(true, |size| size == offset);
                if offset > 0 && total == Some(offset) && expected_ok {
                    debug!("{} was already complete", task.destination.display());
                    task.total_size = Some(offset);
                    return Ok(self.complete(task).await);
                }
                return Err(Failure::integrity(format!(
                    "range from byte {} is not satisfiable",
                    offset
                ))
                .with_status(status));
            }
            _ => {
                if let Some(failure) = status_failure(status) {
                    return Err(failure);
                }
            }
        }

        let server_total = total_size(&response, offset);
        if let (Some(expected), Some(total)) = (task.expected_size, server_total) {
            if expected != total {
                return Err(Failure::integrity(format!(
                    "server reports {} bytes, expected {}",
                    total, expected
                )));
            }
        }
        if server_total.is_some() {
            task.total_size = server_total;
        }
        self.report(task, 0.0, None);

        debug!("Retrieving chunks...");
        let mut stream = response.bytes_stream();
        let mut pending = Vec::with_capacity(self.chunk_size.min(64 * 1024));
        let mut speed = SpeedEstimator::new(Instant::now());

        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.commit(task, &mut file, &mut pending, &mut speed).await?;
                    return Ok(paused(task));
                }
                next = timeout(self.timeout, stream.next()) => next,
            };

            match next {
                Ok(Some(Ok(bytes))) => {
                    let received = task.bytes_downloaded + (pending.len() + bytes.len()) as u64;
                    if let Some(known) = task.known_size() {
                        if received > known {
                            self.commit(task, &mut file, &mut pending, &mut speed).await?;
                            return Err(Failure::integrity(format!(
                                "body runs past the expected {} bytes",
                                known
                            )));
                        }
                    }
                    pending.extend_from_slice(&bytes);
                    if pending.len() >= self.chunk_size {
                        self.commit(task, &mut file, &mut pending, &mut speed).await?;
                    }
                }
                Ok(Some(Err(e))) => {
                    self.commit(task, &mut file, &mut pending, &mut speed).await?;
                    return Err(Failure::new(classify_body_error(&e), e.to_string()));
                }
                Ok(None) => break,
                Err(_) => {
                    self.commit(task, &mut file, &mut pending, &mut speed).await?;
                    return Err(Failure::transport(format!(
                        "no data for {:?} after byte {}",
                        self.timeout, task.bytes_downloaded
                    )));
                }
            }
        }
        self.commit(task, &mut file, &mut pending, &mut speed).await?;

        if let Some(known) = task.known_size() {
            if task.bytes_downloaded != known {
                return Err(Failure::integrity(format!(
                    "received {} of {} bytes",
                    task.bytes_downloaded, known
                )));
            }
        }
        Ok(self.complete(task).await)
    }

    /// Where the next request starts. Anything unusable restarts from zero.
    async fn resume_offset(&self, task: &mut DownloadTask) -> u64 {
        if task.discard_partial {
            task.discard_partial = false;
            return 0;
        }

        let marker = match ResumeMarker::load(&task.destination).await {
            Ok(Some(marker)) => marker,
            Ok(None) => return 0,
            Err(e) => {
                warn!(
                    "Ignoring unreadable resume marker for {}: {}",
                    task.destination.display(),
                    e
                );
                return 0;
            }
        };

        if marker.source != task.source.as_str() {
            debug!(
                "Resume marker for {} belongs to {}, starting over",
                task.destination.display(),
                marker.source
            );
            return 0;
        }
        let on_disk = fs::metadata(&task.destination)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        if on_disk < marker.bytes_written {
            warn!(
                "{} holds {} bytes but its marker records {}, starting over",
                task.destination.display(),
                on_disk,
                marker.bytes_written
            );
            return 0;
        }
        if task
            .expected_size
            .is_some_and(|size| marker.bytes_written > size)
        {
            return 0;
        }

        if task.total_size.is_none() {
            task.total_size = marker.total_size;
        }
        marker.bytes_written
    }

    /// Make `pending` durable and record it.
    async fn commit(
        &self,
        task: &mut DownloadTask,
        file: &mut File,
        pending: &mut Vec<u8>,
        speed: &mut SpeedEstimator,
    ) -> Step<()> {
        if pending.is_empty() {
            return Ok(());
        }

        let written = async {
            file.write_all(pending.as_slice()).await?;
            file.flush().await?;
            file.sync_data().await
        };
        written.await.map_err(|e| {
            Failure::fatal(format!("cannot write {}: {}", task.destination.display(), e))
        })?;

        let bytes = task.bytes_downloaded + pending.len() as u64;
        ResumeMarker::new(task.source.as_str(), bytes, task.total_size)
            .store(&task.destination)
            .await
            .map_err(|e| {
                Failure::fatal(format!(
                    "cannot record progress for {}: {}",
                    task.destination.display(),
                    e
                ))
            })?;

        task.bytes_downloaded = bytes;
        let rate = speed.record(pending.len() as u64, Instant::now());
        pending.clear();
        trace!("{} at byte {}", task.id, bytes);

        let eta = task.remaining().and_then(|remaining| speed.eta(remaining));
        self.report(task, rate, eta);
        Ok(())
    }

    async fn complete(&self, task: &mut DownloadTask) -> AttemptOutcome {
        if let Err(e) = ResumeMarker::remove(&task.destination).await {
            warn!(
                "Could not remove resume marker for {}: {}",
                task.destination.display(),
                e
            );
        }
        task.total_size.get_or_insert(task.bytes_downloaded);
        AttemptOutcome::Completed {
            bytes: task.bytes_downloaded,
        }
    }

    fn report(&self, task: &DownloadTask, speed: f64, eta: Option<Duration>) {
        self.progress.report(ProgressSnapshot {
            task_id: task.id,
            state: TaskState::InProgress,
            bytes_downloaded: task.bytes_downloaded,
            total_bytes: task.known_size(),
            speed,
            eta,
        });
    }
}

fn paused(task: &DownloadTask) -> AttemptOutcome {
    AttemptOutcome::Paused {
        bytes: task.bytes_downloaded,
    }
}

/// Open the destination, cut it to `offset` and position the cursor there.
async fn open_at(task: &DownloadTask, offset: u64) -> Step<File> {
    let opened = async {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&task.destination)
            .await?;
        file.set_len(offset).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        Ok::<_, std::io::Error>(file)
    };
    opened
        .await
        .map_err(|e| Failure::fatal(format!("cannot open {}: {}", task.destination.display(), e)))
}

async fn forget_marker(task: &DownloadTask) {
    if let Err(e) = ResumeMarker::remove(&task.destination).await {
        warn!(
            "Could not remove resume marker for {}: {}",
            task.destination.display(),
            e
        );
    }
}
