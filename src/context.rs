//! Shared state handed to every operation.
//!
//! The context owns the connection settings and, once first needed, the
//! connection pool plus one engine client and one chat client built from
//! those settings. A settings change retires the current clients; the next
//! access builds fresh ones. Settings and client handles sit behind a single
//! lock, so readers always see either the old pair or the new pair.

use std::fmt;
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tokio::sync::RwLock;
use url::Url;

use crate::client::{ChatClient, ClientOptions, ConnectionPool, MeilisearchClient, PoolConfig};
use crate::config::ServerConfig;
use crate::security::{display_url, mask_secret, redact_message, validate_url};
use crate::{Error, Result};

/// Engine base URL and optional API key.
#[derive(Clone)]
pub struct ConnectionSettings {
    url: Url,
    api_key: Option<SecretString>,
}

impl ConnectionSettings {
    pub fn new(url: Url, api_key: Option<SecretString>) -> Self {
        let api_key = api_key.filter(|k| !k.expose_secret().trim().is_empty());
        Self { url, api_key }
    }

    pub fn parse(url: &str, api_key: Option<&str>) -> Result<Self> {
        let url = validate_url(url).map_err(|e| Error::invalid_arguments(format!("Invalid URL: {}", e)))?;
        Ok(Self::new(
            url,
            api_key.map(|k| SecretString::from(k.trim().to_string())),
        ))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn api_key(&self) -> Option<&SecretString> {
        self.api_key.as_ref()
    }

    pub fn redacted(&self) -> RedactedSettings {
        RedactedSettings {
            url: display_url(&self.url),
            api_key: mask_secret(self.api_key.as_ref()),
        }
    }
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("url", &display_url(&self.url))
            .field("api_key", &mask_secret(self.api_key.as_ref()))
            .finish()
    }
}

/// Connection settings safe to show: the key is masked, URL credentials stripped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedactedSettings {
    pub url: String,
    pub api_key: &'static str,
}

impl fmt::Display for RedactedSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "URL: {}\nAPI Key: {}", self.url, self.api_key)
    }
}

/// A runtime change to the connection settings.
///
/// `None` leaves a field as it is. An empty `api_key` clears the key.
#[derive(Debug, Clone, Default)]
pub struct ConnectionUpdate {
    pub url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Default)]
struct Clients {
    pool: Option<Arc<ConnectionPool>>,
    engine: Option<Arc<MeilisearchClient>>,
    chat: Option<Arc<ChatClient>>,
}

impl Clients {
    fn pool(&mut self, config: &PoolConfig) -> Result<Arc<ConnectionPool>> {
        match &self.pool {
            Some(pool) if !pool.is_closed() => Ok(Arc::clone(pool)),
            _ => {
                let pool = Arc::new(ConnectionPool::new(config.clone())?);
                self.pool = Some(Arc::clone(&pool));
                Ok(pool)
            }
        }
    }

    /// Stop every handle from starting new requests and forget them.
    fn retire(&mut self) {
        if let Some(engine) = self.engine.take() {
            engine.close();
        }
        if let Some(chat) = self.chat.take() {
            chat.close();
        }
        if let Some(pool) = self.pool.take() {
            pool.close();
        }
    }
}

struct ContextState {
    settings: ConnectionSettings,
    clients: Clients,
}

/// The shared context: the only place engine clients are constructed.
pub struct ServerContext {
    state: RwLock<ContextState>,
    pool_config: PoolConfig,
    options: ClientOptions,
}

impl ServerContext {
    pub fn new(settings: ConnectionSettings, pool_config: PoolConfig, options: ClientOptions) -> Self {
        Self {
            state: RwLock::new(ContextState {
                settings,
                clients: Clients::default(),
            }),
            pool_config,
            options,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            config.connection_settings(),
            config.pool_config(),
            config.client_options(),
        )
    }

    pub fn client_options(&self) -> &ClientOptions {
        &self.options
    }

    /// The engine client for the current settings, built on first access.
    pub async fn engine_client(&self) -> Result<Arc<MeilisearchClient>> {
        {
            let state = self.state.read().await;
            if let Some(engine) = &state.clients.engine {
                return Ok(Arc::clone(engine));
            }
        }

        let mut state = self.state.write().await;
        if let Some(engine) = &state.clients.engine {
            return Ok(Arc::clone(engine));
        }
        let pool = state.clients.pool(&self.pool_config)?;
        let engine = Arc::new(MeilisearchClient::new(
            state.settings.url.clone(),
            state.settings.api_key.clone(),
            pool,
            self.options.clone(),
        ));
        tracing::info!(url = %display_url(&state.settings.url), "Engine client created");
        state.clients.engine = Some(Arc::clone(&engine));
        Ok(engine)
    }

    /// The chat client for the current settings, built on first access.
    pub async fn chat_client(&self) -> Result<Arc<ChatClient>> {
        {
            let state = self.state.read().await;
            if let Some(chat) = &state.clients.chat {
                return Ok(Arc::clone(chat));
            }
        }

        let mut state = self.state.write().await;
        if let Some(chat) = &state.clients.chat {
            return Ok(Arc::clone(chat));
        }
        let pool = state.clients.pool(&self.pool_config)?;
        let chat = Arc::new(ChatClient::new(
            state.settings.url.clone(),
            state.settings.api_key.clone(),
            pool,
            &self.options,
        ));
        tracing::info!(url = %display_url(&state.settings.url), "Chat client created");
        state.clients.chat = Some(Arc::clone(&chat));
        Ok(chat)
    }

    pub async fn connection_settings(&self) -> RedactedSettings {
        self.state.read().await.settings.redacted()
    }

    /// Replace the connection settings.
    ///
    /// The URL is validated before anything changes; on failure the current
    /// settings and clients stay in effect. On success the current clients
    /// are retired. Requests already in flight on them run to completion.
    pub async fn update_connection_settings(&self, update: ConnectionUpdate) -> Result<RedactedSettings> {
        let url = match update.url.as_deref() {
            Some(raw) => Some(
                validate_url(raw).map_err(|e| Error::invalid_arguments(format!("Invalid URL: {}", e)))?,
            ),
            None => None,
        };

        let mut state = self.state.write().await;
        let mut settings = state.settings.clone();
        if let Some(url) = url {
            settings.url = url;
        }
        if let Some(key) = update.api_key {
            settings.api_key = Some(SecretString::from(key.trim().to_string()))
                .filter(|k| !k.expose_secret().is_empty());
        }

        state.clients.retire();
        state.settings = settings;
        let redacted = state.settings.redacted();
        tracing::info!(
            url = %redacted.url,
            has_api_key = state.settings.api_key.is_some(),
            "Connection settings updated"
        );
        Ok(redacted)
    }

    /// Close every client and the pool. The next access rebuilds them.
    pub async fn shutdown(&self) {
        let mut state = self.state.write().await;
        let had_clients = state.clients.pool.is_some();
        state.clients.retire();
        if had_clients {
            tracing::info!("Server context shut down");
        }
    }

    pub async fn is_initialized(&self) -> bool {
        self.state.read().await.clients.engine.is_some()
    }

    /// Scrub the current API key and any other credentials from `message`.
    pub async fn redact(&self, message: &str) -> String {
        let state = self.state.read().await;
        redact_message(message, state.settings.api_key.as_ref())
    }
}

impl fmt::Debug for ServerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerContext")
            .field("pool_config", &self.pool_config)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(url: &str, key: Option<&str>) -> ServerContext {
        ServerContext::new(
            ConnectionSettings::parse(url, key).unwrap(),
            PoolConfig::minimal(),
            ClientOptions::default(),
        )
    }

    #[tokio::test]
    async fn test_clients_are_built_lazily_and_reused() {
        let ctx = context("http://localhost:7700", None);
        assert!(!ctx.is_initialized().await);

        let first = ctx.engine_client().await.unwrap();
        let second = ctx.engine_client().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(ctx.is_initialized().await);
    }

    #[tokio::test]
    async fn test_settings_are_redacted() {
        let ctx = context("http://localhost:7700", Some("super-secret"));
        let shown = ctx.connection_settings().await;
        assert_eq!(shown.api_key, "********");
        assert_eq!(shown.to_string(), "URL: http://localhost:7700/\nAPI Key: ********");
        assert!(!format!("{:?}", ctx).contains("super-secret"));
    }

    #[tokio::test]
    async fn test_invalid_update_keeps_old_settings() {
        let ctx = context("http://localhost:7700", Some("key"));
        let engine = ctx.engine_client().await.unwrap();

        let err = ctx
            .update_connection_settings(ConnectionUpdate {
                url: Some("ftp://elsewhere:21".into()),
                api_key: Some("other".into()),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidArguments);

        let still = ctx.engine_client().await.unwrap();
        assert!(Arc::ptr_eq(&engine, &still));
        assert_eq!(ctx.connection_settings().await.url, "http://localhost:7700/");
    }

    #[tokio::test]
    async fn test_update_retires_clients() {
        let ctx = context("http://localhost:7700", Some("key"));
        let old = ctx.engine_client().await.unwrap();

        let shown = ctx
            .update_connection_settings(ConnectionUpdate {
                url: Some("http://127.0.0.1:7701".into()),
                api_key: Some("".into()),
            })
            .await
            .unwrap();
        assert_eq!(shown.api_key, "Not set");
        assert!(old.is_closed());

        let new = ctx.engine_client().await.unwrap();
        assert!(!Arc::ptr_eq(&old, &new));
        assert_eq!(new.base_url().as_str(), "http://127.0.0.1:7701/");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_readers_see_old_or_new_settings() {
        let ctx = Arc::new(context("http://127.0.0.1:7700", None));

        for round in 0..20u16 {
            let old = format!("http://127.0.0.1:{}/", 7700 + round);
            let new = format!("http://127.0.0.1:{}/", 7701 + round);

            let readers: Vec<_> = (0..4)
                .map(|_| {
                    let ctx = Arc::clone(&ctx);
                    tokio::spawn(async move {
                        let engine = ctx.engine_client().await.unwrap();
                        engine.base_url().to_string()
                    })
                })
                .collect();
            ctx.update_connection_settings(ConnectionUpdate {
                url: Some(new.clone()),
                api_key: None,
            })
            .await
            .unwrap();

            for reader in readers {
                let seen = reader.await.unwrap();
                assert!(seen == old || seen == new, "round {}: saw {}", round, seen);
            }

            let current = ctx.engine_client().await.unwrap();
            assert!(!current.is_closed());
            assert_eq!(current.base_url().as_str(), new);
            assert_eq!(ctx.connection_settings().await.url, new);
        }
    }

    #[tokio::test]
    async fn test_shutdown_then_rebuild() {
        let ctx = context("http://localhost:7700", None);
        let engine = ctx.engine_client().await.unwrap();
        let chat = ctx.chat_client().await.unwrap();

        ctx.shutdown().await;
        ctx.shutdown().await;
        assert!(engine.is_closed());
        assert!(chat.is_closed());
        assert!(!ctx.is_initialized().await);

        let rebuilt = ctx.engine_client().await.unwrap();
        assert!(!rebuilt.is_closed());
    }

    #[tokio::test]
    async fn test_redact_uses_current_key() {
        let ctx = context("http://localhost:7700", Some("k3y-value"));
        let scrubbed = ctx.redact("request failed with k3y-value").await;
        assert_eq!(scrubbed, "request failed with ********");
    }
}
