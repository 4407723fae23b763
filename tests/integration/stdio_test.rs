//! Stdio Transport Integration Tests
//!
//! Spawns the `rca-cascade serve` binary and talks to it through
//! `StdioToolClient`, so tool calls cross a real process boundary.

use std::collections::HashMap;
use std::sync::Arc;

use tempfile::TempDir;

use rca_cascade::services::tools::{register_plan_tools, StdioToolClient, ANALYSIS_TOOLS};
use rca_cascade::{DatasetScope, Role};
use rca_cascade_tools::{
    normalize, AuditOutcome, DelegationRouter, DispatchError, MemoryAuditLog, RawToolResult,
    ToolArguments, ToolCallRequest, ToolRegistry,
};

fn make_dataset() -> TempDir {
    let dir = TempDir::new().unwrap();
    for name in ["abnormal_metrics", "normal_metrics"] {
        std::fs::write(dir.path().join(format!("{}.parquet", name)), b"PAR1").unwrap();
    }
    dir
}

async fn connect(dir: &TempDir, role: &str) -> StdioToolClient {
    let args = vec![
        "serve".to_string(),
        "--scope".to_string(),
        dir.path().display().to_string(),
        "--role".to_string(),
        role.to_string(),
    ];
    StdioToolClient::connect(
        "dataset",
        env!("CARGO_BIN_EXE_rca-cascade"),
        &args,
        &HashMap::new(),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_handshake_and_tool_listing() {
    let dir = make_dataset();
    let client = connect(&dir, "analysis").await;

    assert_eq!(client.server_info()["name"], "rca-cascade-analysis");
    let names: Vec<String> = client
        .list_tools()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    let mut expected: Vec<String> = ANALYSIS_TOOLS.iter().map(|s| s.to_string()).collect();
    expected.sort();
    let mut names_sorted = names.clone();
    names_sorted.sort();
    assert_eq!(names_sorted, expected);

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_remote_call_normalizes_like_local() {
    let dir = make_dataset();
    let client = connect(&dir, "analysis").await;

    let raw = client
        .call_tool("list_tables_in_directory", ToolArguments::new())
        .await
        .unwrap();
    assert!(matches!(raw, RawToolResult::Envelope(ref e) if !e.is_error));

    let result = normalize(&raw);
    assert_eq!(result[0]["name"], "abnormal_metrics");
    assert_eq!(result[1]["name"], "normal_metrics");

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_remote_tools_behind_local_router() {
    let dir = make_dataset();
    let client = Arc::new(connect(&dir, "analysis").await);

    let mut registry = ToolRegistry::new();
    let registered = StdioToolClient::register_tools(&client, &mut registry, Role::Analysis)
        .await
        .unwrap();
    assert_eq!(registered.len(), ANALYSIS_TOOLS.len());
    register_plan_tools(&mut registry).unwrap();
    registry.ensure_roles_covered().unwrap();

    let audit = Arc::new(MemoryAuditLog::new());
    let router = DelegationRouter::new(
        "remote",
        DatasetScope::new(dir.path()).unwrap(),
        Arc::new(registry),
        audit.clone(),
    );

    let tables = router
        .dispatch(ToolCallRequest::bare(Role::Analysis, "list_tables_in_directory"))
        .await
        .unwrap();
    assert_eq!(tables.as_array().map(Vec::len), Some(2));

    // Planning is still gated locally, before anything is sent to the server
    let denied = router
        .dispatch(ToolCallRequest::bare(Role::Planning, "list_tables_in_directory"))
        .await
        .unwrap_err();
    assert!(matches!(denied, DispatchError::PermissionDenied { .. }));

    // A remote failure arrives as an isError envelope
    let failed = router
        .dispatch(
            ToolCallRequest::bare(Role::Analysis, "get_schema").with_arg("table", "no_such_table"),
        )
        .await
        .unwrap_err();
    match failed {
        DispatchError::ToolExecution(e) => assert!(e.cause.contains("no_such_table")),
        other => panic!("unexpected error: {:?}", other),
    }

    let outcomes: Vec<AuditOutcome> = audit.entries().iter().map(|e| e.outcome).collect();
    assert_eq!(
        outcomes,
        vec![
            AuditOutcome::Success,
            AuditOutcome::PermissionDenied,
            AuditOutcome::ToolExecutionError
        ]
    );

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_server_refuses_other_role_tools() {
    let dir = make_dataset();
    let client = connect(&dir, "analysis").await;

    let mut args = ToolArguments::new();
    args.insert("note".to_string(), serde_json::json!("try anyway"));
    let raw = client.call_tool("update_plan", args).await.unwrap();

    match raw {
        RawToolResult::Envelope(envelope) => {
            assert!(envelope.is_error);
            assert!(normalize(&RawToolResult::Envelope(envelope))
                .as_str()
                .is_some_and(|s| s.contains("Permission denied")));
        }
        other => panic!("unexpected result: {:?}", other),
    }

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_connect_to_missing_binary_fails() {
    let result = StdioToolClient::connect(
        "missing",
        "/nonexistent/rca-cascade-server",
        &[],
        &HashMap::new(),
    )
    .await;
    assert!(result.is_err());
}
