//! Tool Context
//!
//! Defines the context handed to every tool invocation:
//!
//! 1. `DatasetScope` - the explicit, validated directory data tools may read
//! 2. `ToolContext` - per-call identity (session, role, call id) plus the scope
//!
//! The scope is always supplied by the caller. There is no fallback to the
//! process working directory.

use std::path::{Component, Path, PathBuf};

use crate::error::{CoreError, CoreResult};
use crate::role::Role;

// ============================================================================
// DatasetScope
// ============================================================================

/// The dataset directory an investigation is confined to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetScope {
    root: PathBuf,
}

impl DatasetScope {
    /// Validate and create a scope.
    ///
    /// Fails with `CoreError::Config` if the path is empty, does not exist,
    /// or is not a directory.
    pub fn new(root: impl Into<PathBuf>) -> CoreResult<Self> {
        let root = root.into();
        if root.as_os_str().is_empty() {
            return Err(CoreError::config(
                "dataset scope is required; pass an explicit directory",
            ));
        }
        if !root.is_dir() {
            return Err(CoreError::config(format!(
                "dataset scope '{}' is not a directory",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    /// Root directory of this scope.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a caller-supplied relative path inside the scope.
    ///
    /// Absolute paths and `..` components are rejected so a tool cannot be
    /// pointed outside the dataset. `"."` and `""` resolve to the root.
    pub fn resolve(&self, relative: &str) -> CoreResult<PathBuf> {
        let candidate = Path::new(relative);
        if candidate.is_absolute() {
            return Err(CoreError::validation(format!(
                "path '{}' must be relative to the dataset scope",
                relative
            )));
        }
        let mut resolved = self.root.clone();
        for component in candidate.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => {
                    return Err(CoreError::validation(format!(
                        "path '{}' escapes the dataset scope",
                        relative
                    )))
                }
            }
        }
        Ok(resolved)
    }
}

// ============================================================================
// ToolContext
// ============================================================================

/// Context for a single tool invocation.
///
/// Tools receive a `ToolContext` and cannot mutate workflow state; they only
/// see who is calling and which dataset they may touch.
#[derive(Debug, Clone)]
pub struct ToolContext {
    session_id: String,
    role: Role,
    tool_call_id: String,
    scope: DatasetScope,
}

impl ToolContext {
    /// Create a new ToolContext.
    pub fn new(
        session_id: impl Into<String>,
        role: Role,
        tool_call_id: impl Into<String>,
        scope: DatasetScope,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            role,
            tool_call_id: tool_call_id.into(),
            scope,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Role that issued the call.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns the unique tool call identifier.
    pub fn tool_call_id(&self) -> &str {
        &self.tool_call_id
    }

    pub fn scope(&self) -> &DatasetScope {
        &self.scope
    }
}
