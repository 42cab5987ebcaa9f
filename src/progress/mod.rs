//! Progress tracking for running downloads.
//!
//! # Overview
//!
//! - [`aggregator`] - Latest snapshot per task, merged totals and a
//!   bounded broadcast stream of updates
//! - [`speed`] - Smoothed per-task transfer rate and ETA
//! - `display` - indicatif bars fed from the update stream
//! - `style` - Progress bar styling options and templates
//!
//! # Examples
//!
//! ## Watching progress while a batch runs
//!
//! ```rust,no_run
//! use haul::{Download, DownloaderBuilder};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let downloader = DownloaderBuilder::hidden().build();
//! let mut updates = downloader.subscribe();
//! tokio::spawn(async move {
//!     while let Some(update) = updates.recv().await {
//!         println!("{} {}/{:?}", update.task_id, update.bytes_downloaded, update.total_bytes);
//!     }
//! });
//!
//! let download = Download::try_from("https://example.com/file.zip")?;
//! downloader.download(&[download]).await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom Progress Bar Styling
//!
//! ```rust
//! use haul::progress::{ProgressBarOpts, StyleOptions};
//! use haul::DownloaderBuilder;
//!
//! let downloader = DownloaderBuilder::new()
//!     .style_options(StyleOptions::new(
//!         ProgressBarOpts::default(),
//!         ProgressBarOpts::with_task_style(),
//!     ))
//!     .build();
//! ```

pub mod aggregator;
pub(crate) mod display;
pub mod speed;
pub(crate) mod style;

pub use aggregator::{OverallProgress, ProgressAggregator, ProgressReceiver, ProgressSnapshot};
pub use display::ProgressDisplay;
pub use speed::SpeedEstimator;
pub use style::{ProgressBarOpts, StyleOptions};
