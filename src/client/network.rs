//! Connection pool: one reusable HTTP client with connection limits, keep-alive and timeouts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::{Error, Result};

/// Connection pool configuration, read once at startup.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Upper bound on concurrently checked-out connections.
    pub max_connections: usize,
    /// Idle connections kept alive per host.
    pub max_keep_alive: usize,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub idle_timeout: Duration,
    pub tcp_keepalive: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 100,
            max_keep_alive: 20,
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(90),
            tcp_keepalive: Some(Duration::from_secs(60)),
        }
    }
}

impl PoolConfig {
    pub fn minimal() -> Self {
        Self {
            max_connections: 4,
            max_keep_alive: 2,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(30),
            tcp_keepalive: None,
        }
    }

    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max.max(1);
        self
    }

    pub fn max_keep_alive(mut self, max: usize) -> Self {
        self.max_keep_alive = max;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    fn apply_to_builder(&self, builder: reqwest::ClientBuilder) -> reqwest::ClientBuilder {
        let builder = builder
            .connect_timeout(self.connect_timeout)
            .read_timeout(self.read_timeout)
            .pool_idle_timeout(self.idle_timeout)
            .pool_max_idle_per_host(self.max_keep_alive);

        match self.tcp_keepalive {
            Some(keepalive) => builder.tcp_keepalive(keepalive),
            None => builder,
        }
    }
}

/// The single HTTP transport shared by every engine call.
///
/// Checking out a connection takes one of `max_connections` permits; the
/// permit travels with the [`PooledClient`] and is returned when it drops.
/// Request bodies are never serialized by the pool.
pub struct ConnectionPool {
    http: RwLock<Option<reqwest::Client>>,
    permits: Arc<Semaphore>,
    config: PoolConfig,
    closed: AtomicBool,
}

impl ConnectionPool {
    pub fn new(config: PoolConfig) -> Result<Self> {
        let builder = reqwest::Client::builder()
            .user_agent(concat!("meilisearch-mcp/", env!("CARGO_PKG_VERSION")));
        let http = config
            .apply_to_builder(builder)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        tracing::debug!(
            max_connections = config.max_connections,
            max_keep_alive = config.max_keep_alive,
            connect_timeout_ms = config.connect_timeout.as_millis() as u64,
            read_timeout_ms = config.read_timeout.as_millis() as u64,
            "Connection pool created"
        );

        Ok(Self {
            http: RwLock::new(Some(http)),
            permits: Arc::new(Semaphore::new(config.max_connections.max(1))),
            config,
            closed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Check out a live client. Waits while all connections are in use.
    pub async fn acquire(&self) -> Result<PooledClient> {
        if self.is_closed() {
            return Err(pool_closed());
        }
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| pool_closed())?;
        let http = self
            .http
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(pool_closed)?;

        Ok(PooledClient {
            http,
            _permit: permit,
        })
    }

    /// Release every held connection. Safe to call more than once.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.permits.close();
        let dropped = self
            .http
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(dropped);
        tracing::info!("Connection pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Connections that can be checked out right now.
    pub fn available(&self) -> usize {
        if self.is_closed() {
            0
        } else {
            self.permits.available_permits()
        }
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("config", &self.config)
            .field("available", &self.available())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn pool_closed() -> Error {
    Error::EngineUnavailable("connection pool is closed".into())
}

/// A client checked out of the [`ConnectionPool`].
///
/// Holds one connection slot until dropped.
pub struct PooledClient {
    http: reqwest::Client,
    _permit: OwnedSemaphorePermit,
}

impl PooledClient {
    pub fn request(&self, method: reqwest::Method, url: url::Url) -> reqwest::RequestBuilder {
        self.http.request(method, url)
    }
}
