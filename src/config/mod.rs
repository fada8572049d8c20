//! Server configuration, read once at startup.
//!
//! ```rust,no_run
//! use meilisearch_mcp::ServerConfig;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::from_env()?;
//! println!("engine at {}", config.url);
//! # Ok(())
//! # }
//! ```

pub mod env;

pub use env::EnvSource;

use std::ops::RangeInclusive;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::client::{ClientOptions, PoolConfig};
use crate::context::ConnectionSettings;
use crate::security::validate_url;

pub const DEFAULT_URL: &str = "http://localhost:7700";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Errors that can occur while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Engine URL rejected
    #[error("{message}")]
    InvalidUrl { message: String },

    /// Environment variable error
    #[error("Environment error: {0}")]
    Env(#[from] std::env::VarError),

    /// Multiple validation errors
    #[error("{0}")]
    ValidationErrors(ValidationErrors),
}

#[derive(Debug)]
pub struct ValidationErrors(pub Vec<ConfigError>);

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Validation failed: ")?;
        let msgs: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", msgs.join("; "))
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Everything the server reads from its environment.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub url: Url,
    pub api_key: Option<SecretString>,
    pub max_connections: usize,
    pub max_keep_alive: usize,
    pub connect_timeout: Duration,
    /// Read timeout between bytes of a response.
    pub http_timeout: Duration,
    /// Bound on one engine call, and on each index during a fan-out.
    pub request_timeout: Duration,
    pub health_check_timeout: Duration,
    pub fanout_limit: usize,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let pool = PoolConfig::default();
        let options = ClientOptions::default();
        Self {
            url: Url::parse(DEFAULT_URL).unwrap_or_else(|_| unreachable!("default URL parses")),
            api_key: None,
            max_connections: pool.max_connections,
            max_keep_alive: pool.max_keep_alive,
            connect_timeout: pool.connect_timeout,
            http_timeout: pool.read_timeout,
            request_timeout: options.request_timeout,
            health_check_timeout: options.health_check_timeout,
            fanout_limit: options.fanout_limit,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

const MAX_CONNECTIONS_RANGE: RangeInclusive<usize> = 1..=10_000;
const FANOUT_RANGE: RangeInclusive<usize> = 1..=256;
const CONNECT_TIMEOUT_RANGE: RangeInclusive<f64> = 0.1..=600.0;
const HTTP_TIMEOUT_RANGE: RangeInclusive<f64> = 0.1..=600.0;
const REQUEST_TIMEOUT_RANGE: RangeInclusive<f64> = 1.0..=3600.0;
const HEALTH_TIMEOUT_RANGE: RangeInclusive<f64> = 0.1..=30.0;

impl ServerConfig {
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_source(&EnvSource::new())
    }

    /// Load from `source`, collecting every problem before failing.
    pub fn from_source(source: &EnvSource) -> ConfigResult<Self> {
        let mut config = Self::default();
        let mut errors = Vec::new();

        if let Some(raw) = source.get("MEILI_HTTP_ADDR")? {
            match validate_url(&raw) {
                Ok(url) => config.url = url,
                Err(message) => errors.push(ConfigError::InvalidUrl {
                    message: format!("MEILI_HTTP_ADDR: {}", message),
                }),
            }
        }
        config.api_key = source
            .get("MEILI_MASTER_KEY")?
            .map(|key| SecretString::from(key.trim().to_string()));

        let mut count = |key: &str, target: &mut usize| -> ConfigResult<()> {
            if let Some(raw) = source.get(key)? {
                match raw.trim().parse::<usize>() {
                    Ok(v) => *target = v,
                    Err(e) => errors.push(invalid(key, format!("'{}' is not an integer: {}", raw, e))),
                }
            }
            Ok(())
        };
        count("HTTP_MAX_CONNECTIONS", &mut config.max_connections)?;
        count("HTTP_MAX_KEEPALIVE", &mut config.max_keep_alive)?;
        count("SEARCH_FANOUT_LIMIT", &mut config.fanout_limit)?;

        let mut seconds = |key: &str, range: &RangeInclusive<f64>, target: &mut Duration| -> ConfigResult<()> {
            if let Some(raw) = source.get(key)? {
                match raw.trim().parse::<f64>() {
                    Ok(v) if range.contains(&v) => *target = Duration::from_secs_f64(v),
                    Ok(v) => errors.push(invalid(
                        key,
                        format!("{} seconds is outside {}..={}", v, range.start(), range.end()),
                    )),
                    Err(e) => errors.push(invalid(key, format!("'{}' is not a number: {}", raw, e))),
                }
            }
            Ok(())
        };
        seconds("HTTP_CONNECT_TIMEOUT", &CONNECT_TIMEOUT_RANGE, &mut config.connect_timeout)?;
        seconds("HTTP_TIMEOUT", &HTTP_TIMEOUT_RANGE, &mut config.http_timeout)?;
        seconds("REQUEST_TIMEOUT", &REQUEST_TIMEOUT_RANGE, &mut config.request_timeout)?;
        seconds("HEALTH_CHECK_TIMEOUT", &HEALTH_TIMEOUT_RANGE, &mut config.health_check_timeout)?;

        if let Some(level) = source.get("LOG_LEVEL")? {
            config.log_level = level.trim().to_lowercase();
        }

        errors.extend(config.range_errors());
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(ConfigError::ValidationErrors(ValidationErrors(errors)))
        }
    }

    /// Override the engine URL, e.g. from a command-line flag.
    pub fn with_url(mut self, raw: &str) -> ConfigResult<Self> {
        self.url = validate_url(raw).map_err(|message| ConfigError::InvalidUrl { message })?;
        Ok(self)
    }

    /// Override the API key. A blank key clears it.
    pub fn with_api_key(mut self, key: &str) -> Self {
        let key = key.trim();
        self.api_key = (!key.is_empty()).then(|| SecretString::from(key.to_string()));
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let errors = self.range_errors();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationErrors(ValidationErrors(errors)))
        }
    }

    fn range_errors(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        if !MAX_CONNECTIONS_RANGE.contains(&self.max_connections) {
            errors.push(invalid(
                "HTTP_MAX_CONNECTIONS",
                format!("{} is outside 1..=10000", self.max_connections),
            ));
        }
        if self.max_keep_alive < 1 {
            errors.push(invalid("HTTP_MAX_KEEPALIVE", "must be at least 1"));
        } else if self.max_keep_alive > self.max_connections {
            errors.push(invalid(
                "HTTP_MAX_KEEPALIVE",
                format!(
                    "{} cannot exceed HTTP_MAX_CONNECTIONS ({})",
                    self.max_keep_alive, self.max_connections
                ),
            ));
        }
        if !FANOUT_RANGE.contains(&self.fanout_limit) {
            errors.push(invalid(
                "SEARCH_FANOUT_LIMIT",
                format!("{} is outside 1..=256", self.fanout_limit),
            ));
        }
        errors
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::default()
            .max_connections(self.max_connections)
            .max_keep_alive(self.max_keep_alive)
            .connect_timeout(self.connect_timeout)
            .read_timeout(self.http_timeout)
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            request_timeout: self.request_timeout,
            health_check_timeout: self.health_check_timeout,
            fanout_limit: self.fanout_limit,
        }
    }

    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings::new(self.url.clone(), self.api_key.clone())
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}
