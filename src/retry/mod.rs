//! Retry controller: failure classification, backoff and attempt budget.
//!
//! The worker reports every attempt as an [`AttemptOutcome`]. The
//! [`RetryController`] folds it into the task and returns a [`Decision`]:
//! finish the task, leave it paused, or run it again after a delay computed
//! by the [`RetryPolicy`].
//!
//! # Examples
//!
//! ```rust
//! use haul::retry::{classify_status, RetryPolicy};
//! use haul::FailureKind;
//! use reqwest::StatusCode;
//! use std::time::Duration;
//!
//! assert_eq!(classify_status(StatusCode::TOO_MANY_REQUESTS), Some(FailureKind::Server));
//! assert_eq!(classify_status(StatusCode::NOT_FOUND), Some(FailureKind::Client));
//!
//! let policy = RetryPolicy::default();
//! assert!(policy.backoff(2) >= policy.backoff(1));
//! assert!(policy.backoff(50) <= policy.max_delay);
//! ```

pub mod classify;
pub mod controller;
pub mod policy;

pub use classify::{classify_body_error, classify_request_error, classify_status, status_failure};
pub use controller::{AttemptOutcome, Decision, RetryController};
pub use policy::RetryPolicy;
