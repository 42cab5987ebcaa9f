//! HTTP client setup and middleware configuration.
//!
//! This module builds the single client shared by every download attempt.
//! The client carries tracing middleware, optional proxy support, default
//! headers, the TLS verification policy and the connect timeout.
//!
//! Retries are not handled here: each attempt is counted and scheduled by
//! [`RetryController`](crate::retry::RetryController), so the client sends
//! every request exactly once.
//!
//! # Examples
//!
//! ## Basic Client Creation
//!
//! ```rust
//! use haul::http::{create_http_client, SessionConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SessionConfig::default();
//! let client = create_http_client(&config)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Client with Proxy and Custom Headers
//!
//! ```rust,no_run
//! use haul::http::{create_http_client, SessionConfig};
//! use reqwest::header::{HeaderMap, ACCEPT};
//! use reqwest::Proxy;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut headers = HeaderMap::new();
//! headers.insert(ACCEPT, "*/*".parse()?);
//!
//! let config = SessionConfig {
//!     proxy: Some(Proxy::http("http://proxy.example.com:8080")?),
//!     headers: Some(headers),
//!     ..SessionConfig::default()
//! };
//!
//! let client = create_http_client(&config)?;
//! # Ok(())
//! # }
//! ```

use reqwest::{header::HeaderMap, Proxy};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_tracing::TracingMiddleware;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// User agent sent when rotation is disabled.
pub const DEFAULT_USER_AGENT: &str = concat!("haul/", env!("CARGO_PKG_VERSION"));

/// Browser user agents rotated through by default.
pub const DEFAULT_USER_AGENTS: [&str; 4] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

/// How the next user agent is picked from the pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationPolicy {
    /// Walk the pool in order, wrapping around.
    #[default]
    RoundRobin,
    /// Pick uniformly at random for every request.
    Random,
}

/// Configuration for the shared HTTP session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Validate TLS certificates.
    pub verify_ssl: bool,
    /// Upper bound for establishing a connection and for every body read.
    pub timeout: Duration,
    /// User agents to rotate through.
    pub user_agents: Vec<String>,
    /// Rotate user agents. When false, [`DEFAULT_USER_AGENT`] is sent.
    pub rotate_user_agents: bool,
    /// Order in which rotated user agents are used.
    pub rotation: RotationPolicy,
    /// Maximum simultaneous connections to a single host.
    pub max_connections_per_host: usize,
    /// Optional proxy configuration.
    pub proxy: Option<Proxy>,
    /// Default headers to include with all requests.
    pub headers: Option<HeaderMap>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            verify_ssl: true,
            timeout: Duration::from_secs(30),
            user_agents: DEFAULT_USER_AGENTS.iter().map(|ua| ua.to_string()).collect(),
            rotate_user_agents: true,
            rotation: RotationPolicy::default(),
            max_connections_per_host: 10,
            proxy: None,
            headers: None,
        }
    }
}

/// Creates the shared HTTP client.
///
/// This function sets up a reqwest client with:
/// - Tracing middleware for request/response logging
/// - A connect timeout and a per-host idle pool bound
/// - Optional proxy support
/// - Optional default headers
///
/// Disabling `verify_ssl` accepts any certificate and is logged at WARN.
pub fn create_http_client(config: &SessionConfig) -> Result<ClientWithMiddleware, reqwest::Error> {
    let mut inner_client_builder = reqwest::Client::builder()
        .connect_timeout(config.timeout)
        .pool_max_idle_per_host(config.max_connections_per_host);

    if !config.verify_ssl {
        warn!("TLS certificate verification is disabled");
        inner_client_builder = inner_client_builder.danger_accept_invalid_certs(true);
    }

    // Configure proxy if provided
    if let Some(proxy) = config.proxy.clone() {
        inner_client_builder = inner_client_builder.proxy(proxy);
    }

    // Configure default headers if provided
    if let Some(headers) = config.headers.clone() {
        inner_client_builder = inner_client_builder.default_headers(headers);
    }

    let inner_client = inner_client_builder.build()?;

    let client = ClientBuilder::new(inner_client)
        // Trace HTTP requests. See the tracing crate to make use of these traces.
        .with(TracingMiddleware::default())
        .build();

    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderValue, ACCEPT};

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert!(config.verify_ssl);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.user_agents.len(), 4);
        assert!(config.rotate_user_agents);
        assert_eq!(config.rotation, RotationPolicy::RoundRobin);
        assert!(config.proxy.is_none());
        assert!(config.headers.is_none());
    }

    #[test]
    fn test_create_http_client_default() {
        assert!(create_http_client(&SessionConfig::default()).is_ok());
    }

    #[test]
    fn test_create_http_client_without_tls_verification() {
        let config = SessionConfig {
            verify_ssl: false,
            ..SessionConfig::default()
        };
        assert!(create_http_client(&config).is_ok());
    }

    #[test]
    fn test_create_http_client_with_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));

        let config = SessionConfig {
            headers: Some(headers),
            ..SessionConfig::default()
        };
        assert!(create_http_client(&config).is_ok());
    }

    #[test]
    fn rotation_policy_uses_snake_case() {
        let policy: RotationPolicy = serde_json::from_str("\"round_robin\"").unwrap();
        assert_eq!(policy, RotationPolicy::RoundRobin);
        let policy: RotationPolicy = serde_json::from_str("\"random\"").unwrap();
        assert_eq!(policy, RotationPolicy::Random);
    }
}
