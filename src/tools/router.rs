//! Operation dispatch.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;

use super::args::Arguments;
use super::registry::{OperationPayload, OperationRegistry, ToolDefinition};
use crate::context::ServerContext;
use crate::security::summarize;
use crate::{Error, ErrorKind};

/// A named operation and its raw arguments, as sent by the host.
#[derive(Debug, Clone)]
pub struct OperationRequest {
    pub name: String,
    pub arguments: Value,
}

impl OperationRequest {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Failure reported to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorDescriptor {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorDescriptor {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<&Error> for ErrorDescriptor {
    fn from(err: &Error) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OperationResult {
    Success(OperationPayload),
    Failure(ErrorDescriptor),
}

impl OperationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, OperationResult::Success(_))
    }

    pub fn text(&self) -> String {
        match self {
            OperationResult::Success(payload) => payload.text(),
            OperationResult::Failure(err) => format!("Error ({}): {}", err.kind, err.message),
        }
    }

    /// Structured form: the engine value on success, `{kind, message}` on failure.
    pub fn structured(&self) -> Value {
        match self {
            OperationResult::Success(payload) => payload.data.clone(),
            OperationResult::Failure(err) => serde_json::to_value(err).unwrap_or(Value::Null),
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            OperationResult::Failure(err) => Some(err.kind),
            OperationResult::Success(_) => None,
        }
    }
}

/// Maps operation names onto handlers. Holds nothing but the operation table.
#[derive(Debug, Default)]
pub struct Router {
    registry: OperationRegistry,
}

impl Router {
    pub fn new() -> Self {
        Self {
            registry: OperationRegistry::new(),
        }
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }

    /// Validate and run one operation.
    ///
    /// Unknown names and invalid arguments fail before the engine is touched.
    /// Failure messages are scrubbed of credentials.
    pub async fn dispatch(&self, ctx: &ServerContext, request: OperationRequest) -> OperationResult {
        let Some(spec) = self.registry.get(&request.name) else {
            tracing::warn!(op = %request.name, "Unsupported operation");
            return self.fail(ctx, &request.name, Error::unsupported(&request.name)).await;
        };

        tracing::debug!(op = spec.name, args = %summarize(&request.arguments), "Dispatching operation");

        let args = match Arguments::validate(spec.fields, request.arguments) {
            Ok(args) => args,
            Err(e) => return self.fail(ctx, spec.name, e).await,
        };

        let outcome = AssertUnwindSafe((spec.handler)(ctx, args))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(payload)) => {
                tracing::debug!(op = spec.name, "Operation succeeded");
                OperationResult::Success(payload)
            }
            Ok(Err(e)) => self.fail(ctx, spec.name, e).await,
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "handler panicked".to_string());
                self.fail(ctx, spec.name, Error::Unknown(detail)).await
            }
        }
    }

    async fn fail(&self, ctx: &ServerContext, op: &str, err: Error) -> OperationResult {
        let message = ctx.redact(&err.to_string()).await;
        if err.is_validation_error() {
            tracing::debug!(op, kind = %err.kind(), "{}", message);
        } else {
            tracing::warn!(op, kind = %err.kind(), "{}", message);
        }
        OperationResult::Failure(ErrorDescriptor::new(err.kind(), message))
    }
}
