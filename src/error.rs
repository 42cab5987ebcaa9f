//! Error handling for the haul library.
//!
//! Two layers live here. [`Error`] is the crate error returned by fallible
//! setup operations (building the session pool, validating settings, reading
//! resume markers). [`Failure`] and [`FailureKind`] classify what went wrong
//! during a transfer attempt; they are data carried by task outcomes rather
//! than errors propagated with `?`.

use reqwest::StatusCode;
use std::fmt;
use std::io;
use thiserror::Error;

/// Errors that can happen when using haul.
#[derive(Error, Debug)]
pub enum Error {
    /// Error from an underlying system.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Error from the underlying URL parser or the expected URL format.
    ///
    /// This variant is returned when a provided URL cannot be parsed or doesn't
    /// conform to the expected format for HTTP/HTTPS downloads.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A configuration value is outside its accepted range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O Error.
    #[error("I/O error")]
    IOError {
        #[from]
        source: io::Error,
    },

    /// Error from the Reqwest library.
    #[error("Reqwest Error")]
    Reqwest {
        #[from]
        source: reqwest::Error,
    },

    /// Error raised by the middleware stack wrapping the HTTP client.
    #[error("Middleware Error")]
    Middleware {
        #[from]
        source: reqwest_middleware::Error,
    },

    /// A resume marker could not be encoded or decoded.
    #[error("Resume marker error")]
    Marker {
        #[from]
        source: serde_json::Error,
    },
}

/// Result type alias for operations that can fail with a haul error.
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of a failed transfer attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Connection reset, timeout, DNS failure. Retryable.
    Transport,
    /// HTTP 5xx or 429. Retryable with backoff.
    Server,
    /// HTTP 4xx other than 429. Never retried.
    Client,
    /// Size mismatch, unsatisfiable range, or a server that keeps ignoring
    /// range requests. Retried once through a full re-download.
    Integrity,
    /// Invalid destination or permission problem. Surfaced with zero attempts.
    FatalConfig,
}

impl FailureKind {
    /// Whether the retry controller may schedule another attempt with backoff.
    pub fn is_retryable(self) -> bool {
        matches!(self, FailureKind::Transport | FailureKind::Server)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Transport => "transport error",
            FailureKind::Server => "server error",
            FailureKind::Client => "client error",
            FailureKind::Integrity => "integrity error",
            FailureKind::FatalConfig => "fatal configuration error",
        };
        f.write_str(name)
    }
}

/// A classified failure with a human readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// What kind of failure this is.
    pub kind: FailureKind,
    /// Details suitable for logs and outcome records.
    pub message: String,
    /// HTTP status that caused the failure, when there was one.
    pub status: Option<StatusCode>,
}

impl Failure {
    /// Create a failure without an HTTP status.
    pub fn new(kind: FailureKind, message: impl fmt::Display) -> Self {
        Self {
            kind,
            message: message.to_string(),
            status: None,
        }
    }

    pub fn transport(message: impl fmt::Display) -> Self {
        Self::new(FailureKind::Transport, message)
    }

    pub fn integrity(message: impl fmt::Display) -> Self {
        Self::new(FailureKind::Integrity, message)
    }

    pub fn fatal(message: impl fmt::Display) -> Self {
        Self::new(FailureKind::FatalConfig, message)
    }

    /// Attach the HTTP status that produced this failure.
    pub fn with_status(self, status: StatusCode) -> Self {
        Self {
            status: Some(status),
            ..self
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}
