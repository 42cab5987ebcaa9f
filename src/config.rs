//! Settings supplied by an external configuration loader.
//!
//! [`Settings`] mirrors the values a user edits in a settings file. Reading
//! that file is left to the caller; anything serde can deserialize works.
//!
//! ```rust
//! use haul::Settings;
//!
//! let settings: Settings = serde_json::from_str(r#"{ "max_concurrent_downloads": 5 }"#).unwrap();
//! assert_eq!(settings.max_concurrent_downloads, 5);
//! assert_eq!(settings.max_retries, 5);
//! assert!(settings.validate().is_ok());
//! ```

use crate::error::{Error, Result};
use crate::http::{SessionConfig, DEFAULT_USER_AGENTS};
use crate::retry::RetryPolicy;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Accepted range for [`Settings::max_retries`].
pub const MAX_RETRIES_RANGE: std::ops::RangeInclusive<u32> = 1..=20;
/// Accepted range for [`Settings::max_concurrent_downloads`].
pub const MAX_CONCURRENT_RANGE: std::ops::RangeInclusive<usize> = 1..=10;

/// Longest wait between two attempts, whatever the base delay.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// User-facing download settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Attempts per download, the first one included.
    pub max_retries: u32,
    /// Connect and read timeout, in seconds.
    pub timeout: u64,
    /// Delay after the first failed attempt, in seconds. Later delays double.
    pub delay_between_retries: f64,
    pub max_concurrent_downloads: usize,
    pub verify_ssl: bool,
    pub rotate_user_agents: bool,
    pub user_agents: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_retries: 5,
            timeout: 30,
            delay_between_retries: 2.0,
            max_concurrent_downloads: 3,
            verify_ssl: true,
            rotate_user_agents: true,
            user_agents: DEFAULT_USER_AGENTS.iter().map(|ua| ua.to_string()).collect(),
        }
    }
}

impl Settings {
    /// Reject values outside their accepted range.
    pub fn validate(&self) -> Result<()> {
        if !MAX_RETRIES_RANGE.contains(&self.max_retries) {
            return Err(Error::InvalidConfig(format!(
                "max_retries must be between {} and {}, got {}",
                MAX_RETRIES_RANGE.start(),
                MAX_RETRIES_RANGE.end(),
                self.max_retries
            )));
        }
        if self.timeout == 0 {
            return Err(Error::InvalidConfig("timeout must be positive".into()));
        }
        if !self.delay_between_retries.is_finite() || self.delay_between_retries < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "delay_between_retries must be a non-negative number of seconds, got {}",
                self.delay_between_retries
            )));
        }
        if !MAX_CONCURRENT_RANGE.contains(&self.max_concurrent_downloads) {
            return Err(Error::InvalidConfig(format!(
                "max_concurrent_downloads must be between {} and {}, got {}",
                MAX_CONCURRENT_RANGE.start(),
                MAX_CONCURRENT_RANGE.end(),
                self.max_concurrent_downloads
            )));
        }
        if self.rotate_user_agents && self.user_agents.is_empty() {
            return Err(Error::InvalidConfig(
                "user agent rotation needs at least one user agent".into(),
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let base_delay = Duration::try_from_secs_f64(self.delay_between_retries)
            .unwrap_or(Duration::ZERO)
            .min(MAX_RETRY_DELAY);
        RetryPolicy {
            max_attempts: self.max_retries,
            base_delay,
            multiplier: 2.0,
            max_delay: MAX_RETRY_DELAY,
            jitter_fraction: 0.1,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            verify_ssl: self.verify_ssl,
            timeout: Duration::from_secs(self.timeout),
            user_agents: self.user_agents.clone(),
            rotate_user_agents: self.rotate_user_agents,
            ..SessionConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert!(settings.verify_ssl);
        assert_eq!(settings.user_agents.len(), 4);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let cases = [
            Settings { max_retries: 0, ..Settings::default() },
            Settings { max_retries: 21, ..Settings::default() },
            Settings { timeout: 0, ..Settings::default() },
            Settings { delay_between_retries: -1.0, ..Settings::default() },
            Settings { delay_between_retries: f64::NAN, ..Settings::default() },
            Settings { max_concurrent_downloads: 0, ..Settings::default() },
            Settings { max_concurrent_downloads: 11, ..Settings::default() },
            Settings { user_agents: Vec::new(), ..Settings::default() },
        ];
        for settings in cases {
            assert!(
                matches!(settings.validate(), Err(Error::InvalidConfig(_))),
                "{settings:?} should be rejected"
            );
        }
    }

    #[test]
    fn empty_pool_is_fine_without_rotation() {
        let settings = Settings {
            rotate_user_agents: false,
            user_agents: Vec::new(),
            ..Settings::default()
        };
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn retry_policy_follows_settings() {
        let settings = Settings {
            max_retries: 4,
            delay_between_retries: 1.5,
            ..Settings::default()
        };
        let policy = settings.retry_policy();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.base_delay, Duration::from_millis(1500));
        assert_eq!(policy.multiplier, 2.0);
        assert_eq!(policy.max_delay, Duration::from_secs(60));
    }

    #[test]
    fn partial_documents_fill_in_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{ "verify_ssl": false, "timeout": 5 }"#).unwrap();
        assert!(!settings.verify_ssl);
        assert_eq!(settings.session_config().timeout, Duration::from_secs(5));
        assert_eq!(settings.max_retries, 5);
    }
}
