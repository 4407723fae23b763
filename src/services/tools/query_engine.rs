//! Parquet Query Tools
//!
//! `query_parquet_files` and `get_schema` run SQL through an external
//! columnar engine (DuckDB-compatible CLI: `<engine> -json -c <script>`).
//! Every parquet file in the target directory is exposed as a view named
//! after its file stem, so queries can say `FROM abnormal_logs`.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use rca_cascade_core::{CoreError, CoreResult, ToolContext};
use rca_cascade_tools::{required_str, RawToolResult, ToolArguments, ToolHandler};

use super::discovery::{find_tables, resolve_directory, TableFile};
use super::sql_guard::check_query;
use crate::models::settings::ToolSettings;

/// External SQL engine invocation settings.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    command: String,
    max_rows: u32,
    timeout: Duration,
}

impl QueryEngine {
    pub fn new(command: impl Into<String>, max_rows: u32, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            max_rows,
            timeout,
        }
    }

    pub fn from_settings(settings: &ToolSettings) -> Self {
        Self::new(
            settings.query_engine.clone(),
            settings.max_rows,
            Duration::from_secs(settings.query_timeout_secs),
        )
    }

    pub fn max_rows(&self) -> u32 {
        self.max_rows
    }

    /// Run a capped query against the tables in `dir`.
    pub async fn query(&self, dir: &Path, sql: &str) -> CoreResult<Value> {
        let tables = find_tables(dir)?;
        let script = format!(
            "{}{};",
            view_prelude(&tables),
            apply_row_cap(sql, self.max_rows)
        );
        self.execute(dir, &script).await
    }

    /// Run a script as-is in `dir` and parse the engine's JSON output.
    pub async fn execute(&self, dir: &Path, script: &str) -> CoreResult<Value> {
        tracing::debug!(engine = %self.command, dir = %dir.display(), "Executing query");

        let mut cmd = Command::new(&self.command);
        cmd.arg("-json")
            .arg("-c")
            .arg(script)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            CoreError::command(format!(
                "Failed to spawn query engine '{}': {}",
                self.command, e
            ))
        })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                CoreError::command(format!(
                    "Query timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| CoreError::command(format!("Query engine failed: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CoreError::command(format!(
                "Query failed (exit code {}): {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        parse_engine_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// `CREATE VIEW` statements exposing each table file by name.
fn view_prelude(tables: &[TableFile]) -> String {
    tables
        .iter()
        .map(|t| {
            format!(
                "CREATE OR REPLACE VIEW {} AS SELECT * FROM read_parquet({});\n",
                quote_ident(&t.name),
                quote_literal(&t.file)
            )
        })
        .collect()
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Wrap a single query so at most `max_rows` rows come back, whatever
/// LIMIT or trailing comment the query itself carries.
pub fn apply_row_cap(sql: &str, max_rows: u32) -> String {
    let trimmed = sql.trim().trim_end_matches(';').trim_end();
    format!("SELECT * FROM (\n{}\n) LIMIT {}", trimmed, max_rows)
}

/// The engine prints one JSON array per result set. Keep the last one.
fn parse_engine_output(stdout: &str) -> CoreResult<Value> {
    let text = stdout.trim();
    if text.is_empty() {
        return Ok(Value::Array(vec![]));
    }
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Ok(value);
    }

    let mut last = None;
    for value in serde_json::Deserializer::from_str(text).into_iter::<Value>() {
        last = Some(value.map_err(|e| {
            CoreError::command(format!("Query engine produced invalid JSON: {}", e))
        })?);
    }
    Ok(last.unwrap_or(Value::Array(vec![])))
}

fn rows_to_result(rows: Value) -> CoreResult<RawToolResult> {
    Ok(RawToolResult::text(serde_json::to_string(&rows)?))
}

// ============================================================================
// Tools
// ============================================================================

/// Runs SQL over the parquet tables of a directory.
pub struct QueryParquetFilesTool {
    engine: Arc<QueryEngine>,
}

impl QueryParquetFilesTool {
    pub fn new(engine: Arc<QueryEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl ToolHandler for QueryParquetFilesTool {
    fn description(&self) -> &str {
        "Run a SQL query over the parquet tables in a directory. Each file is available as a table named after its file stem. Results are capped at a fixed row count."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "sql": {"type": "string", "description": "SQL query to execute"},
                "directory": {
                    "type": "string",
                    "description": "Directory relative to the dataset scope (default '.')"
                }
            },
            "required": ["sql"]
        })
    }

    async fn invoke(&self, ctx: &ToolContext, args: ToolArguments) -> CoreResult<RawToolResult> {
        let sql = required_str(&args, "sql")?;
        check_query(sql)?;
        let dir = resolve_directory(ctx, &args)?;
        let rows = self.engine.query(&dir, sql).await?;

        if rows.as_array().is_some_and(|rows| rows.is_empty()) {
            return Err(CoreError::command("Query returned no rows"));
        }
        rows_to_result(rows)
    }
}

/// Describes the columns and row count of one table.
pub struct GetSchemaTool {
    engine: Arc<QueryEngine>,
}

impl GetSchemaTool {
    pub fn new(engine: Arc<QueryEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl ToolHandler for GetSchemaTool {
    fn description(&self) -> &str {
        "Show the column names, types and row count of a parquet table."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "table": {"type": "string", "description": "Table name (file stem)"},
                "directory": {
                    "type": "string",
                    "description": "Directory relative to the dataset scope (default '.')"
                }
            },
            "required": ["table"]
        })
    }

    async fn invoke(&self, ctx: &ToolContext, args: ToolArguments) -> CoreResult<RawToolResult> {
        let table = required_str(&args, "table")?;
        let table = table.strip_suffix(".parquet").unwrap_or(table);
        let dir = resolve_directory(ctx, &args)?;

        let file = find_tables(&dir)?
            .into_iter()
            .find(|t| t.name == table)
            .ok_or_else(|| CoreError::not_found(format!("Table not found: {}", table)))?;

        let source = format!("read_parquet({})", quote_literal(&file.file));
        let columns = self
            .engine
            .execute(&dir, &format!("DESCRIBE SELECT * FROM {};", source))
            .await?;
        let count = self
            .engine
            .execute(&dir, &format!("SELECT COUNT(*) AS row_count FROM {};", source))
            .await?;
        let row_count = count
            .get(0)
            .and_then(|row| row.get("row_count"))
            .cloned()
            .unwrap_or(Value::Null);

        rows_to_result(serde_json::json!({
            "table": file.name,
            "file": file.file,
            "columns": columns,
            "row_count": row_count,
        }))
    }
}
