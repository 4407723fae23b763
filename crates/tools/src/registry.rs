//! Role-Gated Tool Registry
//!
//! Maps tool names to handlers and records which role may invoke each tool.
//! The role sets are validated eagerly at registration:
//!
//! - a tool must be owned by exactly one role
//! - re-registering a name under a different role is a configuration error
//! - re-registering under the same role replaces the handler
//!
//! The registry is built once and then shared read-only behind an `Arc`.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde_json::Value;

use rca_cascade_core::{CoreError, CoreResult, Role};

use crate::trait_def::ToolHandler;

/// A registered tool: handler plus its permitted roles.
#[derive(Clone)]
pub struct ToolEntry {
    handler: Arc<dyn ToolHandler>,
    allowed_roles: BTreeSet<Role>,
}

impl ToolEntry {
    pub fn handler(&self) -> &Arc<dyn ToolHandler> {
        &self.handler
    }

    pub fn allowed_roles(&self) -> &BTreeSet<Role> {
        &self.allowed_roles
    }
}

/// Registry of tools and their role ownership.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolEntry>,
    /// Insertion order for deterministic iteration
    order: Vec<String>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool for the given roles.
    ///
    /// Fails with `CoreError::Config` if the role set is empty, claims both
    /// roles, or differs from an earlier registration of the same name.
    pub fn register(
        &mut self,
        tool_name: impl Into<String>,
        handler: Arc<dyn ToolHandler>,
        allowed_roles: impl IntoIterator<Item = Role>,
    ) -> CoreResult<()> {
        let tool_name = tool_name.into();
        let allowed_roles: BTreeSet<Role> = allowed_roles.into_iter().collect();

        if tool_name.trim().is_empty() {
            return Err(CoreError::config("tool name must not be empty"));
        }
        if allowed_roles.is_empty() {
            return Err(CoreError::config(format!(
                "tool '{}' registered without any permitted role",
                tool_name
            )));
        }
        if allowed_roles.len() > 1 {
            return Err(CoreError::config(format!(
                "tool '{}' claimed by both Planning and Analysis; role tool sets must be disjoint",
                tool_name
            )));
        }

        if let Some(existing) = self.tools.get(&tool_name) {
            if existing.allowed_roles != allowed_roles {
                return Err(CoreError::config(format!(
                    "tool '{}' already registered for {}; cannot re-register for {}",
                    tool_name,
                    describe_roles(&existing.allowed_roles),
                    describe_roles(&allowed_roles)
                )));
            }
            tracing::warn!(tool = %tool_name, "Replacing handler for already registered tool");
        } else {
            self.order.push(tool_name.clone());
        }

        self.tools.insert(
            tool_name,
            ToolEntry {
                handler,
                allowed_roles,
            },
        );
        Ok(())
    }

    /// Whether `role` may invoke `tool_name`. Unknown tools are never authorized.
    pub fn authorize(&self, role: Role, tool_name: &str) -> bool {
        self.tools
            .get(tool_name)
            .is_some_and(|entry| entry.allowed_roles.contains(&role))
    }

    /// Look up a tool handler by exact, case-sensitive name.
    pub fn resolve(&self, tool_name: &str) -> CoreResult<Arc<dyn ToolHandler>> {
        self.tools
            .get(tool_name)
            .map(|entry| entry.handler.clone())
            .ok_or_else(|| CoreError::not_found(format!("Tool not found: {}", tool_name)))
    }

    /// Look up the full entry.
    pub fn entry(&self, tool_name: &str) -> Option<&ToolEntry> {
        self.tools.get(tool_name)
    }

    /// Check if a tool is registered.
    pub fn contains(&self, tool_name: &str) -> bool {
        self.tools.contains_key(tool_name)
    }

    /// Names of tools a role may invoke, in registration order.
    pub fn tools_for_role(&self, role: Role) -> Vec<String> {
        self.order
            .iter()
            .filter(|name| self.authorize(role, name))
            .cloned()
            .collect()
    }

    /// Get all tool names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Fail unless every role owns at least one tool.
    pub fn ensure_roles_covered(&self) -> CoreResult<()> {
        for role in Role::ALL {
            if self.tools_for_role(role).is_empty() {
                return Err(CoreError::config(format!(
                    "no tools registered for the {} role",
                    role
                )));
            }
        }
        Ok(())
    }

    /// Tool definitions as JSON values in registration order.
    pub fn definitions(&self) -> Vec<Value> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name).map(|entry| (name, entry)))
            .map(|(name, entry)| {
                serde_json::json!({
                    "name": name,
                    "description": entry.handler.description(),
                    "inputSchema": entry.handler.parameters_schema(),
                    "roles": entry.allowed_roles.iter().map(Role::id).collect::<Vec<_>>(),
                })
            })
            .collect()
    }
}

fn describe_roles(roles: &BTreeSet<Role>) -> String {
    roles
        .iter()
        .map(Role::display_name)
        .collect::<Vec<_>>()
        .join("+")
}
