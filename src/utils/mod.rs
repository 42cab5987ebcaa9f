//! Shared utility functions.
//!
//! This module contains helpers used by the worker to interpret HTTP
//! responses.
//!
//! # Overview
//!
//! - [`content_length`] - Total size and range offsets from response headers
//!
//! # Examples
//!
//! ```rust
//! use haul::utils::{parse_content_range_start, parse_content_range_total};
//!
//! let header_value = "bytes 1024-2047/2048";
//! assert_eq!(parse_content_range_start(header_value), Some(1024));
//! assert_eq!(parse_content_range_total(header_value), Some(2048));
//! ```

pub mod content_length;

// Re-export commonly used utilities
pub use content_length::{
    content_range, parse_content_range_start, parse_content_range_total, total_size,
};
