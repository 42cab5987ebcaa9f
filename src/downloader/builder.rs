//! Builder pattern implementation for creating Downloader instances.
//!
//! # Examples
//!
//! ## Basic Builder Usage
//!
//! ```rust
//! use haul::DownloaderBuilder;
//! use std::path::PathBuf;
//! use std::time::Duration;
//!
//! let downloader = DownloaderBuilder::new()
//!     .directory(PathBuf::from("./downloads"))
//!     .concurrent_downloads(5)
//!     .retries(3)
//!     .timeout(Duration::from_secs(10))
//!     .build();
//! assert_eq!(downloader.concurrent_downloads(), 5);
//! ```
//!
//! ## From Loaded Settings
//!
//! ```rust
//! use haul::{DownloaderBuilder, Settings};
//!
//! # fn example() -> Result<(), haul::Error> {
//! let settings: Settings = serde_json::from_str(r#"{ "max_retries": 3, "verify_ssl": false }"#)?;
//! let downloader = DownloaderBuilder::from_settings(&settings)?.build();
//! assert_eq!(downloader.retry_policy().max_attempts, 3);
//! # Ok(())
//! # }
//! ```

use super::config::{DownloaderConfig, CONCURRENCY_RANGE};
use super::downloader::Downloader;
use crate::config::Settings;
use crate::download::Summary;
use crate::error::Result;
use crate::http::RotationPolicy;
use crate::progress::StyleOptions;
use crate::retry::RetryPolicy;

use reqwest::header::{HeaderMap, HeaderValue, IntoHeaderName};
use reqwest::Proxy;
use std::time::Duration;
use std::{path::PathBuf, sync::Arc};
use tokio_util::sync::CancellationToken;

/// A builder used to create a [`Downloader`].
///
/// ```rust
/// use haul::DownloaderBuilder;
///
/// let d = DownloaderBuilder::new().retries(5).directory("downloads".into()).build();
/// ```
#[derive(Default)]
pub struct DownloaderBuilder {
    config: DownloaderConfig,
    cancel: Option<CancellationToken>,
}

impl DownloaderBuilder {
    /// Creates a builder with the default options.
    pub fn new() -> Self {
        DownloaderBuilder::default()
    }

    /// Convenience function to hide the progress bars.
    pub fn hidden() -> Self {
        DownloaderBuilder::default().style_options(StyleOptions::hidden())
    }

    /// Start from validated [`Settings`].
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        settings.validate()?;
        let mut builder = DownloaderBuilder::default();
        builder.config.retry_policy = settings.retry_policy();
        builder.config.session = settings.session_config();
        builder.config.concurrent_downloads = settings.max_concurrent_downloads;
        Ok(builder)
    }

    /// Sets the directory against which relative destinations are resolved.
    pub fn directory(mut self, directory: PathBuf) -> Self {
        self.config.directory = directory;
        self
    }

    /// Maximum attempts per download, the first one included.
    pub fn retries(mut self, retries: u32) -> Self {
        self.config.retry_policy.max_attempts = retries.max(1);
        self
    }

    /// Replace the whole retry policy.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry_policy = policy;
        self
    }

    /// Set the number of concurrent downloads, clamped to 1..=10.
    pub fn concurrent_downloads(mut self, concurrent_downloads: usize) -> Self {
        self.config.concurrent_downloads =
            concurrent_downloads.clamp(*CONCURRENCY_RANGE.start(), *CONCURRENCY_RANGE.end());
        self
    }

    /// Limit simultaneous connections to one host.
    pub fn max_connections_per_host(mut self, max: usize) -> Self {
        self.config.session.max_connections_per_host = max.max(1);
        self
    }

    /// Connect and per-read timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.session.timeout = timeout;
        self
    }

    /// Validate TLS certificates. Enabled by default.
    pub fn verify_ssl(mut self, verify_ssl: bool) -> Self {
        self.config.session.verify_ssl = verify_ssl;
        self
    }

    /// Replace the user agent pool.
    pub fn user_agents<I, S>(mut self, user_agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.session.user_agents = user_agents.into_iter().map(Into::into).collect();
        self
    }

    pub fn rotate_user_agents(mut self, rotate: bool) -> Self {
        self.config.session.rotate_user_agents = rotate;
        self
    }

    pub fn rotation_policy(mut self, rotation: RotationPolicy) -> Self {
        self.config.session.rotation = rotation;
        self
    }

    pub fn proxy(mut self, proxy: Proxy) -> Self {
        self.config.session.proxy = Some(proxy);
        self
    }

    /// Bytes buffered in memory before each write to disk.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.config.chunk_size = chunk_size.max(1);
        self
    }

    /// Progress updates kept for a subscriber that falls behind.
    pub fn progress_capacity(mut self, capacity: usize) -> Self {
        self.config.progress_capacity = capacity.max(1);
        self
    }

    /// Set the downloader style options.
    pub fn style_options(mut self, style_options: StyleOptions) -> Self {
        self.config.style_options = style_options;
        self
    }

    /// Hide the main progress bar when downloading a single file.
    pub fn single_file_progress(mut self, single_file: bool) -> Self {
        self.config.single_file_progress = single_file;
        self
    }

    /// Set callback for when each download reaches a final state.
    ///
    /// The callback runs as soon as each task finishes, regardless of whether
    /// other downloads are still in progress.
    ///
    /// ```rust
    /// use haul::{DownloaderBuilder, TaskState};
    ///
    /// let downloader = DownloaderBuilder::new()
    ///     .on_complete(|summary| match summary.state() {
    ///         TaskState::Completed => println!("[Success] {}", summary.path().display()),
    ///         TaskState::Failed => println!("[Failed] {}", summary.path().display()),
    ///         _ => {}
    ///     })
    ///     .build();
    /// ```
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Summary) + Send + Sync + 'static,
    {
        self.config.on_complete = Some(Arc::new(Box::new(callback)));
        self
    }

    /// Resume partial files from their marker. Enabled by default.
    pub fn resumable(mut self, resumable: bool) -> Self {
        self.config.resumable = resumable;
        self
    }

    /// Set whether to overwrite existing files.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.config.overwrite = overwrite;
        self
    }

    /// Stop the batch when `token` is cancelled.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn new_header(&self) -> HeaderMap {
        match self.config.session.headers {
            Some(ref h) => h.to_owned(),
            _ => HeaderMap::new(),
        }
    }

    /// Add the http headers.
    ///
    /// You can call `.headers()` multiple times and all `HeaderMap` will be
    /// merged into a single one.
    ///
    /// ```
    /// use reqwest::header::{self, HeaderMap, HeaderValue};
    /// use haul::DownloaderBuilder;
    ///
    /// let accept = HeaderValue::from_static("*/*");
    ///
    /// let downloader = DownloaderBuilder::new()
    ///     .headers(HeaderMap::from_iter([(header::ACCEPT, accept)]))
    ///     .build();
    /// ```
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        let mut new = self.new_header();
        new.extend(headers);

        self.config.session.headers = Some(new);
        self
    }

    /// Add a single http header.
    ///
    /// A `User-Agent` set here is overridden by the rotated one unless
    /// rotation is disabled.
    pub fn header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        let mut new = self.new_header();

        new.insert(name, value);

        self.config.session.headers = Some(new);
        self
    }

    /// Create the [`Downloader`] with the specified options.
    pub fn build(self) -> Downloader {
        Downloader::new(self.config, self.cancel.unwrap_or_default())
    }
}
