//! Shared session with bounded, scoped connection leases.

use super::client::{create_http_client, RotationPolicy, SessionConfig, DEFAULT_USER_AGENT};
use crate::error::{Error, Result};

use rand::Rng;
use reqwest::header::{HeaderValue, USER_AGENT};
use reqwest::Url;
use reqwest_middleware::{ClientWithMiddleware, RequestBuilder};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// Picks the user agent for each request.
#[derive(Debug)]
struct UserAgents {
    agents: Vec<HeaderValue>,
    rotation: Option<RotationPolicy>,
    next: AtomicUsize,
}

impl UserAgents {
    fn new(config: &SessionConfig) -> Result<Self> {
        let rotate = config.rotate_user_agents && !config.user_agents.is_empty();
        let agents = if rotate {
            config
                .user_agents
                .iter()
                .map(|ua| {
                    HeaderValue::from_str(ua)
                        .map_err(|_| Error::InvalidConfig(format!("invalid user agent: {ua:?}")))
                })
                .collect::<Result<Vec<_>>>()?
        } else {
            vec![HeaderValue::from_static(DEFAULT_USER_AGENT)]
        };
        Ok(Self {
            agents,
            rotation: rotate.then_some(config.rotation),
            next: AtomicUsize::new(0),
        })
    }

    fn pick(&self) -> HeaderValue {
        let index = match self.rotation {
            None => 0,
            Some(RotationPolicy::RoundRobin) => {
                self.next.fetch_add(1, Ordering::Relaxed) % self.agents.len()
            }
            Some(RotationPolicy::Random) => rand::rng().random_range(0..self.agents.len()),
        };
        self.agents[index].clone()
    }
}

/// One HTTP client shared by every worker, with global and per-host bounds.
///
/// Connections are only used through a [`Lease`], which holds one global
/// permit and one permit for the target host until it is dropped.
#[derive(Debug)]
pub struct SessionPool {
    client: ClientWithMiddleware,
    config: SessionConfig,
    global: Arc<Semaphore>,
    hosts: Mutex<HashMap<String, Arc<Semaphore>>>,
    user_agents: UserAgents,
    active: Arc<AtomicUsize>,
}

impl SessionPool {
    /// Build the pool for at most `concurrency` simultaneous leases.
    pub fn new(config: SessionConfig, concurrency: usize) -> Result<Self> {
        if config.timeout.is_zero() {
            return Err(Error::InvalidConfig("timeout must be positive".into()));
        }
        let user_agents = UserAgents::new(&config)?;
        let client = create_http_client(&config)?;
        Ok(Self {
            client,
            global: Arc::new(Semaphore::new(concurrency.max(1))),
            hosts: Mutex::new(HashMap::new()),
            user_agents,
            active: Arc::new(AtomicUsize::new(0)),
            config,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Number of leases currently held.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Wait for a free slot towards `url`'s host and borrow the client.
    pub async fn acquire(&self, url: &Url) -> Result<Lease> {
        let host = host_key(url);
        let host_permit = self
            .host_semaphore(&host)?
            .acquire_owned()
            .await
            .map_err(|_| Error::Internal("session pool closed".into()))?;
        let global_permit = self
            .global
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::Internal("session pool closed".into()))?;

        let user_agent = self.user_agents.pick();
        let held = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Leased connection to {} ({} active)", host, held);

        Ok(Lease {
            client: self.client.clone(),
            user_agent,
            host,
            active: Arc::clone(&self.active),
            _permits: (host_permit, global_permit),
        })
    }

    fn host_semaphore(&self, host: &str) -> Result<Arc<Semaphore>> {
        let mut hosts = self
            .hosts
            .lock()
            .map_err(|_| Error::Internal("session pool lock poisoned".into()))?;
        let limit = self.config.max_connections_per_host.max(1);
        Ok(Arc::clone(
            hosts
                .entry(host.to_string())
                .or_insert_with(|| Arc::new(Semaphore::new(limit))),
        ))
    }
}

fn host_key(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port_or_known_default() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

/// A scoped borrow of a connection slot.
///
/// Both permits are released when the lease is dropped, whatever the exit
/// path of the attempt that holds it.
#[derive(Debug)]
pub struct Lease {
    client: ClientWithMiddleware,
    user_agent: HeaderValue,
    host: String,
    active: Arc<AtomicUsize>,
    _permits: (OwnedSemaphorePermit, OwnedSemaphorePermit),
}

impl Lease {
    /// A GET request carrying this lease's user agent.
    pub fn get(&self, url: Url) -> RequestBuilder {
        self.client
            .get(url)
            .header(USER_AGENT, self.user_agent.clone())
    }

    pub fn user_agent(&self) -> &HeaderValue {
        &self.user_agent
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}
