//! Built-in Tools and Tool Transport
//!
//! Data-query tools for the Analysis role, plan tools for the Planning
//! role, and the stdio JSON-RPC server/client that carry tool calls
//! between processes.

pub mod discovery;
pub mod plan_tools;
pub mod query_engine;
pub mod sql_guard;
pub mod stdio_client;
pub mod stdio_server;

use std::sync::Arc;

use rca_cascade_core::{CoreResult, Role};
use rca_cascade_tools::ToolRegistry;

use crate::models::settings::ToolSettings;

pub use discovery::{find_tables, ListTablesTool, TableFile};
pub use plan_tools::{record_hypothesis_tool, update_plan_tool};
pub use query_engine::{apply_row_cap, GetSchemaTool, QueryEngine, QueryParquetFilesTool};
pub use stdio_client::{RemoteTool, RemoteToolInfo, StdioToolClient};
pub use stdio_server::{serve, StdioToolServer};

/// Data-query tools owned by the Analysis role.
pub const ANALYSIS_TOOLS: [&str; 3] = ["list_tables_in_directory", "get_schema", "query_parquet_files"];

/// Plan-management tools owned by the Planning role.
pub const PLANNING_TOOLS: [&str; 2] = ["update_plan", "record_hypothesis"];

/// Register only the Analysis data tools.
pub fn register_data_tools(registry: &mut ToolRegistry, settings: &ToolSettings) -> CoreResult<()> {
    let engine = Arc::new(QueryEngine::from_settings(settings));
    registry.register("list_tables_in_directory", Arc::new(ListTablesTool), [Role::Analysis])?;
    registry.register(
        "get_schema",
        Arc::new(GetSchemaTool::new(engine.clone())),
        [Role::Analysis],
    )?;
    registry.register(
        "query_parquet_files",
        Arc::new(QueryParquetFilesTool::new(engine)),
        [Role::Analysis],
    )?;
    Ok(())
}

/// Register only the Planning plan tools.
pub fn register_plan_tools(registry: &mut ToolRegistry) -> CoreResult<()> {
    registry.register("update_plan", Arc::new(update_plan_tool()), [Role::Planning])?;
    registry.register(
        "record_hypothesis",
        Arc::new(record_hypothesis_tool()),
        [Role::Planning],
    )?;
    Ok(())
}

/// Registry with every built-in tool.
pub fn builtin_registry(settings: &ToolSettings) -> CoreResult<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    register_data_tools(&mut registry, settings)?;
    register_plan_tools(&mut registry)?;
    registry.ensure_roles_covered()?;
    Ok(registry)
}
