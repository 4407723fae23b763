//! Delegation Router
//!
//! Authorizes a role's tool call against the registry, invokes the handler,
//! and normalizes the raw result. Rejections and handler failures come back
//! as `DispatchError` values so the calling loop can keep investigating.
//!
//! Every dispatch is recorded in the audit sink, including rejected ones.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use rca_cascade_core::{DatasetScope, Role, ToolContext};

use crate::audit::{arguments_digest, AuditEntry, AuditOutcome, AuditSink};
use crate::normalizer::normalize;
use crate::registry::ToolRegistry;
use crate::result::{CanonicalResult, RawToolResult, ToolArguments};

/// A role's request to invoke a tool. Consumed once by the router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub role: Role,
    pub tool_name: String,
    #[serde(default)]
    pub arguments: ToolArguments,
}

impl ToolCallRequest {
    pub fn new(role: Role, tool_name: impl Into<String>, arguments: ToolArguments) -> Self {
        Self {
            role,
            tool_name: tool_name.into(),
            arguments,
        }
    }

    /// Request with no arguments.
    pub fn bare(role: Role, tool_name: impl Into<String>) -> Self {
        Self::new(role, tool_name, ToolArguments::new())
    }

    /// Add one argument.
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }
}

/// A handler-level failure, wrapped with the tool it came from.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("Tool '{tool_name}' failed: {cause}")]
pub struct ToolExecutionError {
    pub tool_name: String,
    pub cause: String,
}

/// Typed failure outcome of a dispatch.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DispatchError {
    /// The role is not in the tool's permitted set
    #[error("Permission denied: {role} role may not invoke '{tool_name}'")]
    PermissionDenied { role: Role, tool_name: String },

    /// No tool registered under that name
    #[error("Unknown tool: '{tool_name}'")]
    UnknownTool { tool_name: String },

    /// The handler ran and failed
    #[error(transparent)]
    ToolExecution(#[from] ToolExecutionError),
}

impl DispatchError {
    pub fn audit_outcome(&self) -> AuditOutcome {
        match self {
            DispatchError::PermissionDenied { .. } => AuditOutcome::PermissionDenied,
            DispatchError::UnknownTool { .. } => AuditOutcome::UnknownTool,
            DispatchError::ToolExecution(_) => AuditOutcome::ToolExecutionError,
        }
    }
}

/// Result of a dispatch.
pub type DispatchResult = Result<CanonicalResult, DispatchError>;

/// Routes tool calls for one session.
pub struct DelegationRouter {
    session_id: String,
    scope: DatasetScope,
    registry: Arc<ToolRegistry>,
    audit: Arc<dyn AuditSink>,
}

impl DelegationRouter {
    pub fn new(
        session_id: impl Into<String>,
        scope: DatasetScope,
        registry: Arc<ToolRegistry>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            scope,
            registry,
            audit,
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn scope(&self) -> &DatasetScope {
        &self.scope
    }

    /// Authorize, invoke, and normalize one tool call.
    ///
    /// The handler is never invoked for unknown tools or unauthorized roles.
    pub async fn dispatch(&self, request: ToolCallRequest) -> DispatchResult {
        let tool_call_id = uuid::Uuid::new_v4().to_string();
        let digest = arguments_digest(&request.arguments);
        let started = Instant::now();

        let outcome = self.dispatch_inner(&tool_call_id, request.clone()).await;

        let detail = outcome.as_ref().err().map(ToString::to_string);
        let audit_outcome = match &outcome {
            Ok(_) => AuditOutcome::Success,
            Err(e) => e.audit_outcome(),
        };
        self.audit.record(&AuditEntry {
            at: Utc::now(),
            session_id: self.session_id.clone(),
            tool_call_id,
            role: request.role,
            tool_name: request.tool_name.clone(),
            arguments_digest: digest,
            outcome: audit_outcome,
            detail,
        });

        match &outcome {
            Ok(_) => tracing::debug!(
                role = %request.role,
                tool = %request.tool_name,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Tool call completed"
            ),
            Err(e) => tracing::info!(
                role = %request.role,
                tool = %request.tool_name,
                error = %e,
                "Tool call rejected or failed"
            ),
        }

        outcome
    }

    async fn dispatch_inner(&self, tool_call_id: &str, request: ToolCallRequest) -> DispatchResult {
        let Some(entry) = self.registry.entry(&request.tool_name) else {
            return Err(DispatchError::UnknownTool {
                tool_name: request.tool_name,
            });
        };
        if !self.registry.authorize(request.role, &request.tool_name) {
            return Err(DispatchError::PermissionDenied {
                role: request.role,
                tool_name: request.tool_name,
            });
        }

        let ctx = ToolContext::new(
            self.session_id.clone(),
            request.role,
            tool_call_id,
            self.scope.clone(),
        );
        let raw = entry
            .handler()
            .invoke(&ctx, request.arguments)
            .await
            .map_err(|e| ToolExecutionError {
                tool_name: request.tool_name.clone(),
                cause: e.to_string(),
            })?;

        if let RawToolResult::Envelope(envelope) = &raw {
            if envelope.is_error {
                let cause = normalize(&raw);
                return Err(ToolExecutionError {
                    tool_name: request.tool_name,
                    cause: match cause {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    },
                }
                .into());
            }
        }

        Ok(normalize(&raw))
    }
}
