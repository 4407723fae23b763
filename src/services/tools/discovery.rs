//! Table Discovery
//!
//! `list_tables_in_directory`: finds the parquet files in a directory under
//! the dataset scope. Each file is one table named after its file stem.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use rca_cascade_core::{CoreError, CoreResult, ToolContext};
use rca_cascade_tools::{RawToolResult, ToolArguments, ToolHandler};

/// A parquet file exposed as a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableFile {
    pub name: String,
    #[serde(skip)]
    pub path: PathBuf,
    pub file: String,
    pub size_bytes: u64,
}

/// Parquet tables directly inside `dir`, sorted by name.
pub fn find_tables(dir: &Path) -> CoreResult<Vec<TableFile>> {
    if !dir.is_dir() {
        return Err(CoreError::not_found(format!(
            "Directory not found: {}",
            dir.display()
        )));
    }

    let pattern = format!(
        "{}/*.parquet",
        glob::Pattern::escape(&dir.to_string_lossy())
    );
    let paths = glob::glob(&pattern)
        .map_err(|e| CoreError::validation(format!("Invalid glob pattern: {}", e)))?;

    let mut tables: Vec<TableFile> = paths
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .filter_map(|path| {
            let name = path.file_stem()?.to_string_lossy().to_string();
            let file = path.file_name()?.to_string_lossy().to_string();
            let size_bytes = path.metadata().map(|m| m.len()).unwrap_or(0);
            Some(TableFile {
                name,
                path,
                file,
                size_bytes,
            })
        })
        .collect();
    tables.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(tables)
}

/// Read the optional `directory` argument and resolve it inside the scope.
pub(crate) fn resolve_directory(ctx: &ToolContext, args: &ToolArguments) -> CoreResult<PathBuf> {
    let directory = args
        .get("directory")
        .and_then(Value::as_str)
        .unwrap_or(".");
    ctx.scope().resolve(directory)
}

/// Lists parquet tables available for querying.
pub struct ListTablesTool;

#[async_trait]
impl ToolHandler for ListTablesTool {
    fn description(&self) -> &str {
        "List the parquet tables in a directory of the dataset. Returns table names, file names and sizes."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "directory": {
                    "type": "string",
                    "description": "Directory relative to the dataset scope (default '.')"
                }
            }
        })
    }

    async fn invoke(&self, ctx: &ToolContext, args: ToolArguments) -> CoreResult<RawToolResult> {
        let dir = resolve_directory(ctx, &args)?;
        let tables = find_tables(&dir)?;
        if tables.is_empty() {
            return Err(CoreError::not_found(format!(
                "No parquet files found in {}",
                dir.display()
            )));
        }

        tracing::debug!(dir = %dir.display(), count = tables.len(), "Listed tables");
        Ok(RawToolResult::text(serde_json::to_string(&tables)?))
    }
}
