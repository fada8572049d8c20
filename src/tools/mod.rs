//! The operation catalogue exposed to MCP clients, and the router that runs it.

mod args;
mod chat;
mod connection;
mod documents;
mod indexes;
mod keys;
mod monitoring;
mod registry;
mod router;
mod search;
mod settings;
mod tasks;

pub use args::{ArgType, Arguments, FieldSpec};
pub use registry::{
    Handler, HandlerFuture, OperationPayload, OperationRegistry, OperationSpec, ToolDefinition,
};
pub use router::{ErrorDescriptor, OperationRequest, OperationResult, Router};
pub use search::{IndexTarget, SearchAggregator, SearchOutcome, SearchResponse};
