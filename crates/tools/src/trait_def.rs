//! Tool Handler Trait
//!
//! The only contract a tool backend has to satisfy: accept named arguments,
//! return a `RawToolResult` or a failure. Query engines, file discovery, and
//! remote tool servers are all implementations of `ToolHandler`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use rca_cascade_core::{CoreError, CoreResult, ToolContext};

use crate::result::{RawToolResult, ToolArguments};

/// Invocation handler for a registered tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Human-readable description of what this tool does.
    fn description(&self) -> &str {
        ""
    }

    /// JSON schema describing the tool's input parameters.
    fn parameters_schema(&self) -> Value {
        serde_json::json!({"type": "object"})
    }

    /// Execute the tool.
    ///
    /// An `Err` here is a handler-level failure; the router wraps it as a
    /// `ToolExecutionError` outcome.
    async fn invoke(&self, ctx: &ToolContext, args: ToolArguments) -> CoreResult<RawToolResult>;
}

type BoxedHandlerFuture = Pin<Box<dyn Future<Output = CoreResult<RawToolResult>> + Send>>;
type HandlerFn = dyn Fn(ToolContext, ToolArguments) -> BoxedHandlerFuture + Send + Sync;

/// Closure-based tool handler.
///
/// ```ignore
/// let tool = FunctionTool::new("Echo the arguments", |_ctx, args| async move {
///     Ok(RawToolResult::Other(serde_json::Value::Object(args)))
/// });
/// ```
pub struct FunctionTool {
    description: String,
    schema: Value,
    func: Arc<HandlerFn>,
}

impl FunctionTool {
    pub fn new<F, Fut>(description: impl Into<String>, func: F) -> Self
    where
        F: Fn(ToolContext, ToolArguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CoreResult<RawToolResult>> + Send + 'static,
    {
        Self {
            description: description.into(),
            schema: serde_json::json!({"type": "object"}),
            func: Arc::new(move |ctx, args| Box::pin(func(ctx, args))),
        }
    }

    /// Set the parameters schema.
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = schema;
        self
    }
}

#[async_trait]
impl ToolHandler for FunctionTool {
    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.schema.clone()
    }

    async fn invoke(&self, ctx: &ToolContext, args: ToolArguments) -> CoreResult<RawToolResult> {
        (self.func)(ctx.clone(), args).await
    }
}

/// Read a required string argument.
pub fn required_str<'a>(args: &'a ToolArguments, key: &str) -> CoreResult<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| CoreError::validation(format!("missing string argument '{}'", key)))
}
