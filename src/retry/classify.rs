//! Map HTTP statuses and client errors onto [`FailureKind`]s.

use crate::error::{Failure, FailureKind};

use reqwest::StatusCode;
use reqwest_retry::{default_on_request_failure, Retryable};

/// Classify a response status. Success statuses yield `None`.
pub fn classify_status(status: StatusCode) -> Option<FailureKind> {
    if status.is_success() {
        None
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Some(FailureKind::Server)
    } else {
        // 4xx, plus redirects the client refused to follow and stray 1xx.
        Some(FailureKind::Client)
    }
}

/// Failure for a non-success response.
pub fn status_failure(status: StatusCode) -> Option<Failure> {
    classify_status(status)
        .map(|kind| Failure::new(kind, format!("HTTP {}", status)).with_status(status))
}

/// Classify an error raised while sending a request.
///
/// Timeouts, refused or reset connections and TLS handshake failures are
/// transient for the middleware's own strategy and map to
/// [`FailureKind::Transport`]. A request that could not even be built is a
/// configuration problem.
pub fn classify_request_error(error: &reqwest_middleware::Error) -> FailureKind {
    if let reqwest_middleware::Error::Reqwest(e) = error {
        if e.is_builder() {
            return FailureKind::FatalConfig;
        }
        if e.is_redirect() {
            return FailureKind::Client;
        }
        if let Some(status) = e.status() {
            if let Some(kind) = classify_status(status) {
                return kind;
            }
        }
    }

    match default_on_request_failure(error) {
        // The request itself is unusable; repeating it cannot help.
        Some(Retryable::Fatal) => FailureKind::Client,
        Some(Retryable::Transient) | None => FailureKind::Transport,
    }
}

/// Classify an error raised while reading the response body.
///
/// Anything that breaks the stream mid-body is a transport failure and the
/// bytes received so far are kept. reqwest reports a connection closed short
/// of `Content-Length` as a decode error, so the error kind is not consulted;
/// whether the file is whole is decided by the size check once the stream
/// ends.
pub fn classify_body_error(_error: &reqwest::Error) -> FailureKind {
    FailureKind::Transport
}
