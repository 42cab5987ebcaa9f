//! Dispatching downloads: the [`Downloader`], its builder and the worker
//! that runs individual attempts.
//!
//! # Overview
//!
//! - `downloader` - Admission, bounded scheduling, retries and outcomes
//! - [`worker`] - One resumable transfer attempt for one task
//! - `builder` - [`DownloaderBuilder`] for configuring a [`Downloader`]
//! - `config` - Configuration structures and callback types
//!
//! # Examples
//!
//! ```rust
//! use haul::{Download, DownloaderBuilder};
//! use std::path::PathBuf;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let downloader = DownloaderBuilder::new()
//!     .directory(PathBuf::from("./downloads"))
//!     .concurrent_downloads(5)
//!     .retries(3)
//!     .on_complete(|summary| {
//!         println!("{}: {:?}", summary.path().display(), summary.state());
//!     })
//!     .build();
//!
//! let downloads = vec![
//!     Download::try_from("https://example.com/file1.zip")?,
//!     Download::try_from("https://example.com/file2.pdf")?,
//! ];
//! let batch = downloader.download(&downloads).await;
//! assert_eq!(batch.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod downloader;
pub mod worker;

pub use builder::DownloaderBuilder;
pub use config::{DownloadCallback, DownloaderConfig};
pub use downloader::Downloader;
pub use worker::Worker;
