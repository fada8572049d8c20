//! Line-delimited JSON-RPC server speaking MCP over stdio.

pub mod protocol;

use std::sync::Arc;

use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};

use crate::context::ServerContext;
use crate::tools::{OperationRequest, Router};
use protocol::{
    Content, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, JSONRPC_VERSION, JsonRpcRequest, JsonRpcResponse,
    METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION, ToolCallParams, ToolCallResult,
};

pub const SERVER_NAME: &str = "meilisearch-mcp";

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ServerResult<T> = std::result::Result<T, ServerError>;

pub struct McpServer {
    ctx: Arc<ServerContext>,
    router: Router,
}

impl McpServer {
    pub fn new(ctx: Arc<ServerContext>, router: Router) -> Self {
        Self { ctx, router }
    }

    pub fn context(&self) -> &Arc<ServerContext> {
        &self.ctx
    }

    pub async fn run_stdio(&self) -> ServerResult<()> {
        let reader = BufReader::new(tokio::io::stdin());
        let writer = BufWriter::new(tokio::io::stdout());
        self.run(reader, writer).await
    }

    /// Serve requests until the reader reaches end of input, then release
    /// the engine connections.
    pub async fn run<R, W>(&self, mut reader: R, mut writer: W) -> ServerResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        tracing::info!(operations = self.router.registry().len(), "MCP server ready");
        let mut line = String::new();
        let outcome = loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => break Ok(()),
                Ok(_) => {}
                Err(e) => break Err(ServerError::from(e)),
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if let Some(response) = self.handle_line(trimmed).await
                && let Err(e) = write_response(&mut writer, &response).await
            {
                break Err(e);
            }
        };

        self.ctx.shutdown().await;
        tracing::info!("MCP server stopped");
        outcome
    }

    /// Handle one raw message. Notifications produce no response.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(error = %e, "Unparseable message");
                return Some(JsonRpcResponse::error(
                    None,
                    PARSE_ERROR,
                    format!("Parse error: {}", e),
                ));
            }
        };

        if request.is_notification() {
            tracing::debug!(method = %request.method, "Notification ignored");
            return None;
        }

        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::error(
                request.id,
                INVALID_REQUEST,
                "Invalid request: jsonrpc must be \"2.0\"",
            ));
        }

        Some(self.handle_request(request).await)
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(request.id, initialize_result()),
            "ping" => JsonRpcResponse::success(request.id, json!({})),
            "tools/list" => JsonRpcResponse::success(
                request.id,
                json!({ "tools": self.router.definitions() }),
            ),
            "tools/call" => self.handle_tools_call(request).await,
            _ => JsonRpcResponse::error(
                request.id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", request.method),
            ),
        }
    }

    async fn handle_tools_call(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let params: ToolCallParams = match serde_json::from_value(request.params) {
            Ok(p) => p,
            Err(e) => {
                return JsonRpcResponse::error(
                    request.id,
                    INVALID_PARAMS,
                    format!("Invalid params: {}", e),
                );
            }
        };

        let result = self
            .router
            .dispatch(&self.ctx, OperationRequest::new(params.name, params.arguments))
            .await;

        let structured = result.structured();
        let call = ToolCallResult {
            content: vec![Content::Text { text: result.text() }],
            structured_content: structured.is_object().then_some(structured),
            is_error: !result.is_success(),
        };
        match serde_json::to_value(call) {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(e) => JsonRpcResponse::error(request.id, INTERNAL_ERROR, e.to_string()),
        }
    }
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": {} },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        }
    })
}

async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &JsonRpcResponse,
) -> ServerResult<()> {
    let json = serde_json::to_string(response)?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
