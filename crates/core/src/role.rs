//! Investigation Roles
//!
//! The two cooperating responsibilities of an investigation session.
//! Each role owns a disjoint set of tool names in the tool registry.

use serde::{Deserialize, Serialize};

/// A role that may issue tool calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Step decomposition and plan management; may only use plan tooling
    Planning,
    /// Data discovery and querying; may only use data-query tooling
    Analysis,
}

impl Role {
    /// All roles, in a stable order.
    pub const ALL: [Role; 2] = [Role::Planning, Role::Analysis];

    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Planning => "Planning",
            Role::Analysis => "Analysis",
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Role::Planning => "planning",
            Role::Analysis => "analysis",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
