//! Reasoning-Layer Boundary
//!
//! Both roles are driven by an `ActionProposer`: given the current directive
//! and a summary of the investigation, it returns the next action. How it
//! decides (prompting, model calls, a replay script) is its own business.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use rca_cascade_core::{CoreError, CoreResult, Role};
use rca_cascade_tools::{CanonicalResult, ToolArguments, ToolCallRequest};

use crate::models::workflow::{Directive, Finding, StateSummary};

/// Everything a proposer sees when asked for its next action.
#[derive(Debug, Clone, Serialize)]
pub struct ProposalInput {
    pub role: Role,
    pub directive: Directive,
    pub summary: StateSummary,
    pub last_finding: Option<Finding>,
    /// Why the previous action was refused, if it was
    pub last_rejection: Option<String>,
    /// Planning's instruction to the Analysis role
    pub instruction: Option<String>,
}

/// A tool call without a role; the session stamps the proposing role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool_name: String,
    #[serde(default)]
    pub arguments: ToolArguments,
}

impl ToolCall {
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments: ToolArguments::new(),
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    pub fn into_request(self, role: Role) -> ToolCallRequest {
        ToolCallRequest::new(role, self.tool_name, self.arguments)
    }
}

/// Planning's conclusion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminationSignal {
    #[serde(default)]
    pub candidate: Option<String>,
    #[serde(default)]
    pub rationale: Option<String>,
}

/// Next action proposed by a role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ProposedAction {
    /// Invoke a tool as the proposing role
    Call(ToolCall),
    /// Planning hands a data question to the Analysis role
    Delegate {
        instruction: String,
        #[serde(default)]
        candidate: Option<String>,
    },
    /// Planning concludes the deep dive
    Terminate(TerminationSignal),
}

/// Pluggable reasoning layer for one role.
#[async_trait]
pub trait ActionProposer: Send + Sync {
    /// Propose the next action. An `Err` ends the session as incomplete.
    async fn propose(&self, input: &ProposalInput) -> CoreResult<ProposedAction>;

    /// Summarize a successful Analysis result for the Planning role.
    fn summarize(&self, request: &ToolCallRequest, result: &CanonicalResult) -> String {
        let rendered = match result {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let mut preview: String = rendered.chars().take(200).collect();
        if preview.len() < rendered.len() {
            preview.push_str("...");
        }
        format!("{} -> {}", request.tool_name, preview)
    }
}

// ============================================================================
// ScriptedProposer
// ============================================================================

/// Replay script: one queue of actions per role.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProposalScript {
    #[serde(default)]
    pub planning: Vec<ProposedAction>,
    #[serde(default)]
    pub analysis: Vec<ProposedAction>,
}

/// Proposer that replays a fixed script.
///
/// Each role pops from its own queue; an exhausted queue is an error.
pub struct ScriptedProposer {
    planning: Mutex<VecDeque<ProposedAction>>,
    analysis: Mutex<VecDeque<ProposedAction>>,
}

impl ScriptedProposer {
    pub fn new(script: ProposalScript) -> Self {
        Self {
            planning: Mutex::new(script.planning.into()),
            analysis: Mutex::new(script.analysis.into()),
        }
    }

    /// Load a JSON script.
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CoreError::config(format!("Failed to read script {}: {}", path.display(), e))
        })?;
        let script: ProposalScript = serde_json::from_str(&text)
            .map_err(|e| CoreError::config(format!("Invalid script {}: {}", path.display(), e)))?;
        Ok(Self::new(script))
    }

    /// Actions still queued for a role.
    pub fn remaining(&self, role: Role) -> usize {
        self.queue(role)
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    fn queue(&self, role: Role) -> &Mutex<VecDeque<ProposedAction>> {
        match role {
            Role::Planning => &self.planning,
            Role::Analysis => &self.analysis,
        }
    }
}

#[async_trait]
impl ActionProposer for ScriptedProposer {
    async fn propose(&self, input: &ProposalInput) -> CoreResult<ProposedAction> {
        self.queue(input.role)
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .ok_or_else(|| {
                CoreError::not_found(format!(
                    "Script exhausted for the {} role at step {}",
                    input.role, input.directive.step
                ))
            })
    }
}
