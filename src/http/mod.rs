//! HTTP session shared by all download workers.
//!
//! # Overview
//!
//! - [`client`] - Client creation, TLS policy, timeouts and middleware
//! - [`pool`] - [`SessionPool`] handing out scoped [`Lease`]s with global and
//!   per-host bounds and user-agent rotation
//!
//! # Examples
//!
//! ```rust
//! use haul::http::{SessionConfig, SessionPool};
//! use reqwest::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = SessionPool::new(SessionConfig::default(), 3)?;
//! let url = Url::parse("https://example.com/file.bin")?;
//! let lease = pool.acquire(&url).await?;
//! let response = lease.get(url).send().await?;
//! println!("status: {}", response.status());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod pool;

pub use client::{
    create_http_client, RotationPolicy, SessionConfig, DEFAULT_USER_AGENT, DEFAULT_USER_AGENTS,
};
pub use pool::{Lease, SessionPool};
