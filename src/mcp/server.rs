//! Line-delimited JSON-RPC over stdio
//!
//! One message per line in, one response per line out. Notifications get no
//! response. Logging goes to stderr; stdout carries only protocol messages.

use anyhow::Result;
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use super::ToolError;
use super::p2p::P2pTools;
use super::protocol::{
    Implementation, JSONRPC_VERSION, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, MCP_VERSION, ServerCapabilities, ToolCapabilities, tool_result,
};
use super::tools::p2p_tools;

pub struct McpServer {
    tools: P2pTools,
}

impl McpServer {
    pub fn new(tools: P2pTools) -> Self {
        Self { tools }
    }

    /// Handle one raw line; `None` for notifications
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        match serde_json::from_str::<JsonRpcMessage>(line) {
            Ok(JsonRpcMessage::Request(request)) => Some(self.handle_request(request).await),
            Ok(JsonRpcMessage::Notification(notification)) => {
                self.handle_notification(notification);
                None
            }
            Err(e) => Some(match serde_json::from_str::<Value>(line) {
                // Well-formed JSON that is not a JSON-RPC message
                Ok(value) => JsonRpcResponse::invalid_request(
                    value.get("id").cloned().unwrap_or(Value::Null),
                ),
                Err(_) => JsonRpcResponse::parse_error(&e.to_string()),
            }),
        }
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        if request.jsonrpc != JSONRPC_VERSION {
            return JsonRpcResponse::invalid_request(request.id);
        }

        match request.method.as_str() {
            "initialize" => self.handle_initialize(request.id),
            "tools/list" => self.handle_tools_list(request.id),
            "tools/call" => self.handle_tools_call(request).await,
            "ping" => JsonRpcResponse::ok(request.id, json!({})),
            other => {
                let method = other.to_string();
                JsonRpcResponse::method_not_found(request.id, &method)
            }
        }
    }

    fn handle_notification(&self, notification: JsonRpcNotification) {
        tracing::debug!(method = %notification.method, "notification received");
    }

    fn handle_initialize(&self, id: Value) -> JsonRpcResponse {
        JsonRpcResponse::ok(
            id,
            json!({
                "protocolVersion": MCP_VERSION,
                "serverInfo": Implementation {
                    name: "hera-p2p".to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                },
                "capabilities": ServerCapabilities {
                    tools: ToolCapabilities { list_changed: false },
                },
                "instructions": format!(
                    "Procure-to-pay tools over the universal tables ({} engine)",
                    self.tools.engine_name()
                ),
            }),
        )
    }

    fn handle_tools_list(&self, id: Value) -> JsonRpcResponse {
        JsonRpcResponse::ok(id, json!({ "tools": p2p_tools() }))
    }

    async fn handle_tools_call(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let Some(params) = &request.params else {
            return JsonRpcResponse::invalid_params(request.id, "Missing params");
        };
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return JsonRpcResponse::invalid_params(request.id, "Missing tool name");
        };
        let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

        match self.tools.call(name, arguments).await {
            Ok(payload) => JsonRpcResponse::ok(request.id, tool_result(&payload, false)),
            Err(ToolError::InvalidParams(details)) => {
                JsonRpcResponse::invalid_params(request.id, &details)
            }
            Err(ToolError::UnknownTool(tool)) => JsonRpcResponse::method_not_found(request.id, &tool),
            Err(ToolError::Rejected(message)) => {
                tracing::info!(tool = name, %message, "tool call rejected");
                JsonRpcResponse::ok(request.id, tool_result(&json!({ "error": message }), true))
            }
            Err(e) => {
                tracing::error!(tool = name, error = %e, "tool call failed");
                JsonRpcResponse::ok(
                    request.id,
                    tool_result(&json!({ "error": e.to_string() }), true),
                )
            }
        }
    }

    /// Serve until the reader reaches end of input
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(response) = self.handle_line(&line).await {
                let mut out = serde_json::to_string(&response)?;
                out.push('\n');
                writer.write_all(out.as_bytes()).await?;
                writer.flush().await?;
            }
        }
        Ok(())
    }

    /// Serve on stdin/stdout
    pub async fn run_stdio(&self) -> Result<()> {
        tracing::info!("MCP server ready on stdio");
        self.run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }
}
