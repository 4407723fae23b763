//! Stdio Tool Client
//!
//! JSON-RPC 2.0 client for a tool server spawned as a child process and
//! spoken to over newline-delimited stdin/stdout. Each remote tool can be
//! wrapped as a `ToolHandler` (`RemoteTool`) and registered like a local
//! one; its `tools/call` result is handed back unmodified as a
//! `RawToolResult` so the normalizer sees the real wire shape.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use rca_cascade_core::{CoreError, CoreResult, Role, ToolContext};
use rca_cascade_tools::{RawToolResult, ToolArguments, ToolHandler, ToolRegistry};

use super::stdio_server::PROTOCOL_VERSION;

const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

/// A tool advertised by the remote server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default = "default_schema")]
    pub input_schema: Value,
}

fn default_schema() -> Value {
    serde_json::json!({"type": "object"})
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

struct StdioTransport {
    process: Child,
    stdin: ChildStdin,
    stdout_reader: BufReader<ChildStdout>,
}

/// Client for one spawned tool server.
pub struct StdioToolClient {
    name: String,
    transport: Mutex<StdioTransport>,
    server_info: Value,
    request_id: AtomicU64,
    response_timeout: Duration,
}

impl StdioToolClient {
    /// Spawn `command` and perform the `initialize` handshake.
    pub async fn connect(
        name: &str,
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> CoreResult<Self> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        for (key, value) in env {
            cmd.env(key, value);
        }

        let mut process = cmd.spawn().map_err(|e| {
            CoreError::command(format!(
                "Failed to spawn tool server '{}' (command: {}): {}",
                name, command, e
            ))
        })?;
        let stdin = process.stdin.take().ok_or_else(|| {
            CoreError::command(format!("Failed to capture stdin for tool server '{}'", name))
        })?;
        let stdout = process.stdout.take().ok_or_else(|| {
            CoreError::command(format!("Failed to capture stdout for tool server '{}'", name))
        })?;

        let mut client = Self {
            name: name.to_string(),
            transport: Mutex::new(StdioTransport {
                process,
                stdin,
                stdout_reader: BufReader::new(stdout),
            }),
            server_info: Value::Null,
            request_id: AtomicU64::new(1),
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        };
        client.server_info = client.initialize().await?;
        tracing::info!(server = %name, "Connected to tool server");
        Ok(client)
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The `serverInfo` object from the handshake.
    pub fn server_info(&self) -> &Value {
        &self.server_info
    }

    async fn initialize(&self) -> CoreResult<Value> {
        let result = self
            .request(
                "initialize",
                Some(serde_json::json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": "rca-cascade",
                        "version": env!("CARGO_PKG_VERSION")
                    }
                })),
            )
            .await
            .map_err(|e| {
                CoreError::protocol(format!(
                    "Tool server '{}' initialization failed: {}",
                    self.name, e
                ))
            })?;

        self.notify("notifications/initialized").await?;
        Ok(result.get("serverInfo").cloned().unwrap_or(Value::Null))
    }

    /// List the tools the server exposes.
    pub async fn list_tools(&self) -> CoreResult<Vec<RemoteToolInfo>> {
        let result = self.request("tools/list", None).await?;
        let tools = result.get("tools").cloned().unwrap_or(Value::Array(vec![]));
        serde_json::from_value(tools)
            .map_err(|e| CoreError::protocol(format!("Malformed tools/list result: {}", e)))
    }

    /// Invoke a remote tool. The result is returned in its wire shape.
    ///
    /// A JSON-RPC error is a failure. An `isError` envelope is returned
    /// as-is and classified by the router.
    pub async fn call_tool(&self, name: &str, arguments: ToolArguments) -> CoreResult<RawToolResult> {
        let result = self
            .request(
                "tools/call",
                Some(serde_json::json!({
                    "name": name,
                    "arguments": arguments,
                })),
            )
            .await?;
        Ok(RawToolResult::from_wire(result))
    }

    /// Close stdin and stop the server process.
    pub async fn disconnect(&self) -> CoreResult<()> {
        let mut transport = self.transport.lock().await;
        let _ = transport.stdin.shutdown().await;
        let _ = transport.process.kill().await;
        Ok(())
    }

    /// Register every remote tool under `role`, returning the names added.
    pub async fn register_tools(
        client: &Arc<Self>,
        registry: &mut ToolRegistry,
        role: Role,
    ) -> CoreResult<Vec<String>> {
        let mut names = Vec::new();
        for info in client.list_tools().await? {
            let name = info.name.clone();
            registry.register(
                name.clone(),
                Arc::new(RemoteTool {
                    client: client.clone(),
                    info,
                }),
                [role],
            )?;
            names.push(name);
        }
        tracing::info!(
            server = %client.name,
            role = %role,
            count = names.len(),
            "Registered remote tools"
        );
        Ok(names)
    }

    /// Send a request and wait for the response with the same id.
    async fn request(&self, method: &str, params: Option<Value>) -> CoreResult<Value> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        let frame = serde_json::to_string(&request)?;

        // One outstanding request per channel
        let mut transport = self.transport.lock().await;
        Self::write_frame(&mut transport.stdin, &frame).await?;
        let response = self
            .read_response(&mut transport.stdout_reader, id)
            .await?;

        if let Some(error) = response.error {
            return Err(CoreError::command(format!(
                "{} failed: [{}] {}",
                method, error.code, error.message
            )));
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    async fn notify(&self, method: &str) -> CoreResult<()> {
        let frame = serde_json::json!({"jsonrpc": "2.0", "method": method, "params": {}}).to_string();
        let mut transport = self.transport.lock().await;
        Self::write_frame(&mut transport.stdin, &frame).await
    }

    async fn write_frame(stdin: &mut ChildStdin, frame: &str) -> CoreResult<()> {
        let mut bytes = Vec::with_capacity(frame.len() + 1);
        bytes.extend_from_slice(frame.as_bytes());
        bytes.push(b'\n');
        stdin
            .write_all(&bytes)
            .await
            .map_err(|e| CoreError::command(format!("Failed to write to tool server stdin: {}", e)))?;
        stdin
            .flush()
            .await
            .map_err(|e| CoreError::command(format!("Failed to flush stdin: {}", e)))?;
        Ok(())
    }

    /// Read lines until the response for `id` arrives. Blank lines, non-JSON
    /// lines, notifications, and stale responses are skipped.
    async fn read_response(
        &self,
        reader: &mut BufReader<ChildStdout>,
        id: u64,
    ) -> CoreResult<JsonRpcResponse> {
        let mut line = String::new();
        loop {
            line.clear();
            let bytes_read = tokio::time::timeout(self.response_timeout, reader.read_line(&mut line))
                .await
                .map_err(|_| CoreError::command("Timeout waiting for tool server response"))?
                .map_err(|e| {
                    CoreError::command(format!("Failed to read from tool server stdout: {}", e))
                })?;

            if bytes_read == 0 {
                return Err(CoreError::command(
                    "Tool server closed stdout (process may have crashed)",
                ));
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let Ok(response) = serde_json::from_str::<JsonRpcResponse>(trimmed) else {
                tracing::debug!(server = %self.name, "Skipping non-JSON line from tool server");
                continue;
            };
            match response.id.as_ref().and_then(Value::as_u64) {
                Some(response_id) if response_id == id => return Ok(response),
                _ => {
                    tracing::debug!(server = %self.name, expected = id, "Skipping unrelated message");
                }
            }
        }
    }
}

/// A remote tool exposed through the local registry.
pub struct RemoteTool {
    client: Arc<StdioToolClient>,
    info: RemoteToolInfo,
}

#[async_trait]
impl ToolHandler for RemoteTool {
    fn description(&self) -> &str {
        &self.info.description
    }

    fn parameters_schema(&self) -> Value {
        self.info.input_schema.clone()
    }

    async fn invoke(&self, ctx: &ToolContext, args: ToolArguments) -> CoreResult<RawToolResult> {
        tracing::debug!(
            server = %self.client.name(),
            tool = %self.info.name,
            tool_call_id = %ctx.tool_call_id(),
            "Forwarding tool call"
        );
        self.client.call_tool(&self.info.name, args).await
    }
}
