//! Content length extraction utilities.
//!
//! This module provides utilities for reading sizes and offsets out of HTTP
//! responses, supporting both Content-Range and Content-Length headers.

use reqwest::{header::CONTENT_RANGE, Response, StatusCode};

/// Parse Content-Range header to extract total size.
///
/// Content-Range header format: "bytes start-end/total"
/// This function extracts the total size from the header. An unknown total
/// (`*`) yields `None`.
///
/// # Example
///
/// ```rust
/// use haul::utils::parse_content_range_total;
///
/// let total = parse_content_range_total("bytes 0-1023/2048");
/// assert_eq!(total, Some(2048));
/// assert_eq!(parse_content_range_total("bytes */4096"), Some(4096));
/// assert_eq!(parse_content_range_total("bytes 0-1023/*"), None);
/// ```
pub fn parse_content_range_total(content_range: &str) -> Option<u64> {
    let (_, total) = content_range.split_once('/')?;
    total.trim().parse::<u64>().ok()
}

/// Parse Content-Range header to extract the first byte position.
///
/// # Example
///
/// ```rust
/// use haul::utils::parse_content_range_start;
///
/// assert_eq!(parse_content_range_start("bytes 400-999/1000"), Some(400));
/// assert_eq!(parse_content_range_start("bytes */1000"), None);
/// ```
pub fn parse_content_range_start(content_range: &str) -> Option<u64> {
    let range = content_range.trim().strip_prefix("bytes")?.trim_start();
    let (span, _) = range.split_once('/').unwrap_or((range, ""));
    let (start, _) = span.split_once('-')?;
    start.trim().parse::<u64>().ok()
}

/// The Content-Range header of `response`, if present and readable.
pub fn content_range(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(CONTENT_RANGE)
        .and_then(|value| value.to_str().ok())
}

/// Total size of the resource behind `response`.
///
/// A Content-Range total wins. Otherwise the Content-Length is used, shifted
/// by `offset` for partial responses.
pub fn total_size(response: &Response, offset: u64) -> Option<u64> {
    if let Some(total) = content_range(response).and_then(parse_content_range_total) {
        return Some(total);
    }
    let length = response.content_length()?;
    if response.status() == StatusCode::PARTIAL_CONTENT {
        Some(length.saturating_add(offset))
    } else {
        Some(length)
    }
}
