//! Delegation Router Integration Tests
//!
//! Drives the built-in registry through `DelegationRouter` against a real
//! dataset directory:
//! - discovery output reaches the caller normalized
//! - role gating and unknown tools are rejected before any handler runs
//! - handler failures come back as execution errors, never panics

use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use rca_cascade::models::settings::ToolSettings;
use rca_cascade::{builtin_registry, DatasetScope, Role};
use rca_cascade_tools::{
    AuditOutcome, ContentBlock, DelegationRouter, DispatchError, FunctionTool, MemoryAuditLog,
    RawToolResult, ToolCallRequest, ToolRegistry,
};

fn make_dataset() -> TempDir {
    let dir = TempDir::new().unwrap();
    for name in ["abnormal_logs", "abnormal_traces", "normal_logs"] {
        std::fs::write(dir.path().join(format!("{}.parquet", name)), b"PAR1").unwrap();
    }
    std::fs::write(dir.path().join("README.txt"), "not a table").unwrap();
    dir
}

fn make_router(dir: &TempDir, audit: Arc<MemoryAuditLog>) -> DelegationRouter {
    let registry = builtin_registry(&ToolSettings::default()).unwrap();
    DelegationRouter::new(
        "router-test",
        DatasetScope::new(dir.path()).unwrap(),
        Arc::new(registry),
        audit,
    )
}

#[tokio::test]
async fn test_list_tables_is_normalized() {
    let dir = make_dataset();
    let audit = Arc::new(MemoryAuditLog::new());
    let router = make_router(&dir, audit.clone());

    let result = router
        .dispatch(ToolCallRequest::bare(Role::Analysis, "list_tables_in_directory"))
        .await
        .unwrap();

    let names: Vec<&str> = result
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["abnormal_logs", "abnormal_traces", "normal_logs"]);
    assert_eq!(result[0]["file"], "abnormal_logs.parquet");

    let entries = audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].outcome, AuditOutcome::Success);
    assert_eq!(entries[0].session_id, "router-test");
}

#[tokio::test]
async fn test_planning_denied_data_tool() {
    let dir = make_dataset();
    let audit = Arc::new(MemoryAuditLog::new());
    let router = make_router(&dir, audit.clone());

    let err = router
        .dispatch(ToolCallRequest::bare(Role::Planning, "list_tables_in_directory"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        DispatchError::PermissionDenied {
            role: Role::Planning,
            tool_name: "list_tables_in_directory".to_string()
        }
    );
    assert_eq!(audit.with_outcome(AuditOutcome::PermissionDenied).len(), 1);
}

#[tokio::test]
async fn test_unknown_tool() {
    let dir = make_dataset();
    let audit = Arc::new(MemoryAuditLog::new());
    let router = make_router(&dir, audit.clone());

    let err = router
        .dispatch(ToolCallRequest::bare(Role::Analysis, "drop_table"))
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::UnknownTool { .. }));
    assert_eq!(audit.with_outcome(AuditOutcome::UnknownTool).len(), 1);
}

#[tokio::test]
async fn test_scope_escape_is_execution_error() {
    let dir = make_dataset();
    let audit = Arc::new(MemoryAuditLog::new());
    let router = make_router(&dir, audit.clone());

    let err = router
        .dispatch(
            ToolCallRequest::bare(Role::Analysis, "list_tables_in_directory")
                .with_arg("directory", "../.."),
        )
        .await
        .unwrap_err();

    match err {
        DispatchError::ToolExecution(e) => assert_eq!(e.tool_name, "list_tables_in_directory"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(audit.with_outcome(AuditOutcome::ToolExecutionError).len(), 1);
}

#[tokio::test]
async fn test_missing_required_argument_is_execution_error() {
    let dir = make_dataset();
    let router = make_router(&dir, Arc::new(MemoryAuditLog::new()));

    let err = router
        .dispatch(ToolCallRequest::bare(Role::Analysis, "query_parquet_files"))
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::ToolExecution(_)));
    assert!(err.to_string().contains("sql"));
}

#[tokio::test]
async fn test_plan_tool_round_trip() {
    let dir = make_dataset();
    let router = make_router(&dir, Arc::new(MemoryAuditLog::new()));

    let result = router
        .dispatch(
            ToolCallRequest::bare(Role::Planning, "record_hypothesis")
                .with_arg("service", "ts-route-service")
                .with_arg("evidence", "p99 latency x40"),
        )
        .await
        .unwrap();

    assert_eq!(
        result,
        json!({"candidate": "ts-route-service", "evidence": "p99 latency x40"})
    );
}

#[tokio::test]
async fn test_result_shapes_normalize_through_router() {
    let dir = make_dataset();
    let mut registry = ToolRegistry::new();
    registry
        .register(
            "blocks",
            Arc::new(FunctionTool::new("Block sequence", |_ctx, _args| async move {
                Ok(RawToolResult::Blocks(vec![
                    ContentBlock::text("```json\n{\"rows\": 3,}\n```"),
                    ContentBlock::text("ignored"),
                ]))
            })),
            [Role::Analysis],
        )
        .unwrap();
    registry
        .register(
            "plain",
            Arc::new(FunctionTool::new("Plain text", |_ctx, _args| async move {
                Ok(RawToolResult::text("ts-auth-service looks healthy"))
            })),
            [Role::Analysis],
        )
        .unwrap();
    registry
        .register(
            "empty",
            Arc::new(FunctionTool::new("Empty blocks", |_ctx, _args| async move {
                Ok(RawToolResult::Blocks(Vec::new()))
            })),
            [Role::Planning],
        )
        .unwrap();

    let router = DelegationRouter::new(
        "shapes",
        DatasetScope::new(dir.path()).unwrap(),
        Arc::new(registry),
        Arc::new(MemoryAuditLog::new()),
    );

    let blocks = router
        .dispatch(ToolCallRequest::bare(Role::Analysis, "blocks"))
        .await
        .unwrap();
    assert_eq!(blocks, json!({"rows": 3}));

    let plain = router
        .dispatch(ToolCallRequest::bare(Role::Analysis, "plain"))
        .await
        .unwrap();
    assert_eq!(plain, json!("ts-auth-service looks healthy"));

    let empty = router
        .dispatch(ToolCallRequest::bare(Role::Planning, "empty"))
        .await
        .unwrap();
    assert_eq!(empty, json!("[]"));
}
