//! Stdio Tool Server
//!
//! Newline-delimited JSON-RPC 2.0 over stdin/stdout exposing one role's
//! tools. Supports `initialize`, `ping`, `tools/list` and `tools/call`.
//! Every call goes through a `DelegationRouter`, so authorization and
//! auditing are identical to in-process dispatch.
//!
//! The output stream carries protocol frames only. Diagnostics belong on
//! stderr (see `utils::telemetry`).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use rca_cascade_core::{CoreError, CoreResult, DatasetScope, Role};
use rca_cascade_tools::{
    AuditSink, DelegationRouter, ToolArguments, ToolCallRequest, ToolHandler, ToolRegistry,
};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

/// Incoming JSON-RPC message. `id` is absent for notifications.
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    #[serde(default)]
    jsonrpc: Option<String>,
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
}

#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

impl JsonRpcResponse {
    fn ok(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn err(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Serves the tools of one role.
pub struct StdioToolServer {
    role: Role,
    router: DelegationRouter,
}

impl StdioToolServer {
    pub fn new(
        role: Role,
        scope: DatasetScope,
        registry: Arc<ToolRegistry>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let session_id = format!("serve-{}", uuid::Uuid::new_v4());
        Self {
            role,
            router: DelegationRouter::new(session_id, scope, registry, audit),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Process requests until the reader reaches EOF.
    pub async fn serve_io<R, W>(&self, reader: R, mut writer: W) -> CoreResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        tracing::info!(role = %self.role, "Tool server ready");

        while let Some(line) = lines.next_line().await? {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(response) = self.handle_line(trimmed).await {
                let mut frame = serde_json::to_vec(&response)?;
                frame.push(b'\n');
                writer.write_all(&frame).await?;
                writer.flush().await?;
            }
        }

        tracing::info!(role = %self.role, "Tool server input closed");
        Ok(())
    }

    async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(error = %e, "Unparseable request");
                return Some(JsonRpcResponse::err(
                    Value::Null,
                    PARSE_ERROR,
                    format!("Parse error: {}", e),
                ));
            }
        };

        // Notifications get no response
        let id = request.id?;
        let Some(method) = request.method else {
            return Some(JsonRpcResponse::err(id, INVALID_REQUEST, "Missing method"));
        };
        if request.jsonrpc.as_deref() != Some("2.0") {
            return Some(JsonRpcResponse::err(
                id,
                INVALID_REQUEST,
                "jsonrpc must be \"2.0\"",
            ));
        }

        tracing::debug!(method = %method, "Request received");
        let response = match method.as_str() {
            "initialize" => JsonRpcResponse::ok(id, self.initialize_result()),
            "ping" => JsonRpcResponse::ok(id, serde_json::json!({})),
            "tools/list" => JsonRpcResponse::ok(id, self.list_result()),
            "tools/call" => match self.call(request.params).await {
                Ok(result) => JsonRpcResponse::ok(id, result),
                Err(e) => JsonRpcResponse::err(id, INVALID_PARAMS, e.to_string()),
            },
            other => JsonRpcResponse::err(
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            ),
        };
        Some(response)
    }

    fn initialize_result(&self) -> Value {
        serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {"tools": {}},
            "serverInfo": {
                "name": format!("rca-cascade-{}", self.role.id()),
                "version": env!("CARGO_PKG_VERSION"),
            }
        })
    }

    fn list_result(&self) -> Value {
        let registry = self.router.registry();
        let tools: Vec<Value> = registry
            .tools_for_role(self.role)
            .into_iter()
            .filter_map(|name| registry.resolve(&name).ok().map(|handler| (name, handler)))
            .map(|(name, handler)| {
                serde_json::json!({
                    "name": name,
                    "description": handler.description(),
                    "inputSchema": handler.parameters_schema(),
                })
            })
            .collect();
        serde_json::json!({ "tools": tools })
    }

    /// `tools/call`. Dispatch failures become `isError` results, not
    /// protocol errors; only malformed params are protocol errors.
    async fn call(&self, params: Option<Value>) -> CoreResult<Value> {
        let params = params.unwrap_or(Value::Null);
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::validation("tools/call requires a string 'name'"))?;
        let arguments = match params.get("arguments") {
            None | Some(Value::Null) => ToolArguments::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                return Err(CoreError::validation(
                    "tools/call 'arguments' must be an object",
                ))
            }
        };

        // The canonical value travels as JSON text so the client's
        // normalization yields the same value, strings included
        let request = ToolCallRequest::new(self.role, name, arguments);
        let (text, is_error) = match self.router.dispatch(request).await {
            Ok(value) => (value.to_string(), false),
            Err(e) => (e.to_string(), true),
        };

        Ok(serde_json::json!({
            "content": [{"type": "text", "text": text}],
            "isError": is_error,
        }))
    }
}

/// Serve on the process's stdin and stdout.
pub async fn serve(server: &StdioToolServer) -> CoreResult<()> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    server.serve_io(stdin, stdout).await
}
