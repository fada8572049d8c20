//! # meilisearch-mcp
//!
//! Exposes Meilisearch administration and search to tool-calling hosts through
//! a fixed catalogue of named operations.
//!
//! The core is made of four pieces:
//!
//! - [`client::ConnectionPool`]: one limit-bounded HTTP transport shared by every engine call.
//! - [`client::MeilisearchClient`] and [`client::ChatClient`]: typed engine interfaces.
//! - [`ServerContext`]: lazily builds the clients and swaps them when the
//!   connection settings change.
//! - [`Router`]: validates an [`OperationRequest`] against the operation table
//!   and turns the engine result into an [`OperationResult`].
//!
//! ```rust,no_run
//! use meilisearch_mcp::{OperationRequest, Router, ServerConfig, ServerContext};
//! use serde_json::json;
//!
//! # async fn example() -> meilisearch_mcp::Result<()> {
//! let config = ServerConfig::from_env()?;
//! let ctx = ServerContext::from_config(&config);
//! let router = Router::new();
//!
//! let result = router
//!     .dispatch(&ctx, OperationRequest::new("search", json!({ "query": "shoe" })))
//!     .await;
//! println!("{}", result.text());
//! ctx.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod client;
pub mod config;
pub mod context;
pub mod security;
pub mod server;
pub mod tools;

use std::time::Duration;

use serde::Serialize;

pub use client::{
    ChatClient, ChatMessage, ClientOptions, ConnectionPool, CreateKeyRequest, HybridOptions,
    IndexUid, MeilisearchClient, Pagination, PoolConfig, PooledClient, SearchRequest, TaskFilter,
};
pub use config::{ConfigError, EnvSource, ServerConfig};
pub use context::{ConnectionSettings, ConnectionUpdate, RedactedSettings, ServerContext};
pub use server::McpServer;
pub use tools::{
    ArgType, Arguments, ErrorDescriptor, FieldSpec, IndexTarget, OperationPayload,
    OperationRegistry, OperationRequest, OperationResult, OperationSpec, Router,
    SearchAggregator, SearchOutcome, SearchResponse, ToolDefinition,
};

/// Error type for every layer of the server.
///
/// Each variant maps onto one of the eight [`ErrorKind`]s reported to the host.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The operation name is not in the catalogue.
    #[error("Unsupported operation: {name}")]
    UnsupportedOperation { name: String },

    /// Arguments failed validation before any engine call.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The engine reported a missing resource.
    #[error("Not found: {message}")]
    NotFound {
        message: String,
        code: Option<String>,
    },

    /// The engine rejected the credential.
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// The engine rejected the request as malformed.
    #[error("Bad request: {message}")]
    BadRequest {
        message: String,
        code: Option<String>,
    },

    /// No connection could be established within the connect timeout.
    #[error("Connection timed out after {:.1}s", .0.as_secs_f64())]
    ConnectionTimeout(Duration),

    /// The engine could not be reached or stopped answering.
    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),

    /// A request was sent but no answer arrived in time.
    #[error("Request timed out after {:.1}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// Invalid configuration or connection settings.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The engine answered with something that is not JSON.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Anything the engine or the server could not classify.
    #[error("{0}")]
    Unknown(String),
}

/// The error taxonomy exposed to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    UnsupportedOperation,
    InvalidArguments,
    NotFound,
    Unauthorized,
    BadRequest,
    ConnectionTimeout,
    EngineUnavailable,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnsupportedOperation => "UnsupportedOperation",
            ErrorKind::InvalidArguments => "InvalidArguments",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::ConnectionTimeout => "ConnectionTimeout",
            ErrorKind::EngineUnavailable => "EngineUnavailable",
            ErrorKind::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Error::InvalidArguments(message.into())
    }

    pub fn unsupported(name: impl Into<String>) -> Self {
        Error::UnsupportedOperation { name: name.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnsupportedOperation { .. } => ErrorKind::UnsupportedOperation,
            Error::InvalidArguments(_) => ErrorKind::InvalidArguments,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Unauthorized { .. } => ErrorKind::Unauthorized,
            Error::BadRequest { .. } => ErrorKind::BadRequest,
            Error::ConnectionTimeout(_) => ErrorKind::ConnectionTimeout,
            Error::EngineUnavailable(_) | Error::Timeout(_) => ErrorKind::EngineUnavailable,
            Error::Config(_) | Error::Json(_) | Error::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Validation failures are detected before any network call.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::UnsupportedOperation | ErrorKind::InvalidArguments
        )
    }

    pub fn is_transport_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ConnectionTimeout | ErrorKind::EngineUnavailable
        )
    }

    /// The same error with `f` applied to its message text.
    pub fn map_message(self, f: impl FnOnce(&str) -> String) -> Self {
        match self {
            Error::InvalidArguments(m) => Error::InvalidArguments(f(&m)),
            Error::NotFound { message, code } => Error::NotFound { message: f(&message), code },
            Error::Unauthorized { message } => Error::Unauthorized { message: f(&message) },
            Error::BadRequest { message, code } => Error::BadRequest { message: f(&message), code },
            Error::EngineUnavailable(m) => Error::EngineUnavailable(f(&m)),
            Error::Config(m) => Error::Config(f(&m)),
            Error::Unknown(m) => Error::Unknown(f(&m)),
            other => other,
        }
    }

    pub fn engine_code(&self) -> Option<&str> {
        match self {
            Error::NotFound { code, .. } | Error::BadRequest { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        match err {
            config::ConfigError::InvalidValue { key, message } => {
                Error::Config(format!("Invalid value for {}: {}", key, message))
            }
            config::ConfigError::InvalidUrl { message } => Error::Config(message),
            config::ConfigError::Env(e) => Error::Config(e.to_string()),
            config::ConfigError::ValidationErrors(errors) => Error::Config(errors.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(
            Error::unsupported("drop-database").kind(),
            ErrorKind::UnsupportedOperation
        );
        assert_eq!(
            Error::Config("failed to build HTTP client".into()).kind(),
            ErrorKind::Unknown
        );
        assert_eq!(
            Error::Timeout(Duration::from_secs(3)).kind(),
            ErrorKind::EngineUnavailable
        );
        assert_eq!(
            Error::ConnectionTimeout(Duration::from_secs(10)).kind(),
            ErrorKind::ConnectionTimeout
        );
        assert_eq!(Error::Unknown("boom".into()).kind(), ErrorKind::Unknown);
    }

    #[test]
    fn test_error_display() {
        let err = Error::NotFound {
            message: "Index `movies` not found.".into(),
            code: Some("index_not_found".into()),
        };
        assert!(err.to_string().contains("movies"));
        assert_eq!(err.engine_code(), Some("index_not_found"));

        let timeout = Error::ConnectionTimeout(Duration::from_millis(1500));
        assert_eq!(timeout.to_string(), "Connection timed out after 1.5s");
    }

    #[test]
    fn test_validation_and_transport_predicates() {
        assert!(Error::invalid_arguments("missing query").is_validation_error());
        assert!(!Error::EngineUnavailable("refused".into()).is_validation_error());
        assert!(Error::EngineUnavailable("refused".into()).is_transport_error());
        assert!(!Error::Unauthorized { message: "nope".into() }.is_transport_error());
    }

    #[test]
    fn test_map_message_keeps_kind() {
        let err = Error::NotFound {
            message: "API key `abc` not found.".into(),
            code: Some("api_key_not_found".into()),
        }
        .map_message(|m| m.replace("abc", "***"));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.engine_code(), Some("api_key_not_found"));
        assert_eq!(err.to_string(), "Not found: API key `***` not found.");
    }

    #[test]
    fn test_config_error_conversion() {
        let err: Error = config::ConfigError::InvalidUrl {
            message: "MEILI_HTTP_ADDR must use http or https scheme".into(),
        }
        .into();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert!(!err.is_validation_error());
    }

    #[test]
    fn test_error_kind_serializes_as_name() {
        let value = serde_json::to_value(ErrorKind::EngineUnavailable).unwrap();
        assert_eq!(value, serde_json::json!("EngineUnavailable"));
    }
}
