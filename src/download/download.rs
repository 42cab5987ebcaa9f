//! The input side of the engine: what to fetch and where to put it.
//!
//! A [`Download`] is produced by an external resolver. The engine never turns
//! titles into URLs; it only receives the concrete locator, the destination
//! path and, when the resolver knows it, the expected size.
//!
//! # Examples
//!
//! ```rust
//! use haul::download::Download;
//! use std::convert::TryFrom;
//!
//! // The destination file name is taken from the URL.
//! let download = Download::try_from("https://example.com/media/episode-01.mp4")?;
//! assert_eq!(download.destination.to_str(), Some("episode-01.mp4"));
//!
//! let download = download.with_expected_size(1_000).with_quality("1080p");
//! assert_eq!(download.expected_size, Some(1_000));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::error::Error;

use reqwest::header::{HeaderMap, HeaderValue, IntoHeaderName};
use reqwest::Url;
use std::convert::TryFrom;
use std::path::PathBuf;

/// Represents a file to be downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    /// URL of the file to download.
    pub url: Url,
    /// Where the file is written. Relative paths are resolved against the
    /// downloader's directory.
    pub destination: PathBuf,
    /// Size announced by the resolver, if any.
    pub expected_size: Option<u64>,
    /// Quality label chosen by the resolver. Carried through untouched.
    pub quality: Option<String>,
    /// Headers sent with every request for this file only, e.g. a Referer
    /// or cookie the source requires. They override session-wide headers.
    pub headers: Option<HeaderMap>,
}

impl Download {
    /// Creates a new [`Download`].
    ///
    /// When using the [`Download::try_from`] method, the destination file name
    /// is automatically extracted from the URL.
    pub fn new(url: &Url, destination: impl Into<PathBuf>) -> Self {
        Self {
            url: url.clone(),
            destination: destination.into(),
            expected_size: None,
            quality: None,
            headers: None,
        }
    }

    /// Set the size the transfer must end at.
    pub fn with_expected_size(self, expected_size: u64) -> Self {
        Self {
            expected_size: Some(expected_size),
            ..self
        }
    }

    /// Attach the quality label picked by the resolver.
    pub fn with_quality(self, quality: impl Into<String>) -> Self {
        Self {
            quality: Some(quality.into()),
            ..self
        }
    }

    /// Replace the per-file request headers.
    pub fn with_headers(self, headers: HeaderMap) -> Self {
        Self {
            headers: Some(headers),
            ..self
        }
    }

    /// Add one per-file request header.
    pub fn with_header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        self.headers
            .get_or_insert_with(HeaderMap::new)
            .insert(name, value);
        self
    }

    /// Host part of the URL, used to key connection leases.
    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }
}

impl TryFrom<&Url> for Download {
    type Error = crate::error::Error;

    fn try_from(value: &Url) -> Result<Self, Self::Error> {
        value
            .path_segments()
            .ok_or_else(|| {
                Error::InvalidUrl(format!(
                    "The url \"{}\" does not contain a valid path",
                    value
                ))
            })?
            .next_back()
            .filter(|segment| !segment.is_empty())
            .map(|segment| {
                form_urlencoded::parse(segment.as_bytes())
                    .map(|(key, val)| [key, val].concat())
                    .collect::<String>()
            })
            .map(|filename| Download::new(value, filename))
            .ok_or_else(|| {
                Error::InvalidUrl(format!("The url \"{}\" does not contain a filename", value))
            })
    }
}

impl TryFrom<&str> for Download {
    type Error = crate::error::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Url::parse(value)
            .map_err(|e| {
                Error::InvalidUrl(format!("The url \"{}\" cannot be parsed: {}", value, e))
            })
            .and_then(|u| Download::try_from(&u))
    }
}
