//! Session Integration Tests
//!
//! End-to-end runs of the two-role investigation over stub data tools:
//! - full walk to a terminated conclusion
//! - step ceiling, iteration cap, and timeout outcomes
//! - role enforcement and rejection feedback
//! - concurrent sessions sharing one registry and one audit file

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;

use rca_cascade::models::workflow::{StepId, TransitionReason};
use rca_cascade::services::session::{ActionProposer, ProposalInput, ProposedAction, ToolCall};
use rca_cascade::{
    ConclusionKind, CoreError, CoreResult, DatasetScope, IncompleteReason, Role, Session,
};
use rca_cascade_tools::{AuditEntry, AuditOutcome, JsonlAuditLog, MemoryAuditLog};

use crate::common::{scripted, stub_registry, HintAnalyst, RulePlanner, TABLES};

fn make_scope() -> (TempDir, DatasetScope) {
    let dir = TempDir::new().unwrap();
    let scope = DatasetScope::new(dir.path()).unwrap();
    (dir, scope)
}

fn rule_planner(rounds: usize) -> Arc<RulePlanner> {
    Arc::new(RulePlanner {
        deep_dive_rounds: rounds,
        candidate: "ts-travel-service".to_string(),
    })
}

// ============================================================================
// Successful Runs
// ============================================================================

#[tokio::test]
async fn test_six_findings_reach_root_cause() {
    let (_dir, scope) = make_scope();
    let (registry, counter) = stub_registry(None);
    let audit = Arc::new(MemoryAuditLog::new());

    let report = Session::builder()
        .session_id("full-walk")
        .scope(scope)
        .registry(Arc::new(registry))
        .audit(audit.clone())
        .planner(rule_planner(2))
        .analyst(Arc::new(HintAnalyst))
        .build()
        .unwrap()
        .run("Find the faulty service")
        .await
        .unwrap();

    assert_eq!(report.final_step, StepId::RootCauseDetermined);
    assert_eq!(report.conclusion, ConclusionKind::Terminated);
    assert!(report.confirmed);
    assert_eq!(report.findings.len(), 6);
    assert_eq!(report.transitions.len(), 6);
    assert_eq!(report.root_cause_candidate.as_deref(), Some("ts-travel-service"));
    assert_eq!(
        report.answer_line().as_deref(),
        Some("Root cause service: ts-travel-service")
    );

    let steps: Vec<StepId> = report.findings.iter().map(|f| f.step).collect();
    assert_eq!(
        steps,
        vec![
            StepId::Discover,
            StepId::Overview,
            StepId::AnomalyAnalysis,
            StepId::BaselineCompare,
            StepId::IterativeDeepDive,
            StepId::IterativeDeepDive,
        ]
    );
    let reasons: Vec<TransitionReason> = report.transitions.iter().map(|t| t.reason).collect();
    assert_eq!(reasons[4], TransitionReason::DeepDiveRound);
    assert_eq!(reasons[5], TransitionReason::TerminationSignal);

    for table in TABLES {
        assert!(report.discovered_tables.contains(table));
    }
    assert_eq!(counter.count(), 6);
    assert_eq!(audit.with_outcome(AuditOutcome::Success).len(), 6);
    assert!(audit.entries().iter().all(|e| e.role == Role::Analysis));
    assert_eq!(
        report.plan_notes,
        vec!["Error counts concentrate in one service".to_string()]
    );
}

#[tokio::test]
async fn test_scripted_run_with_plan_tools() {
    let (_dir, scope) = make_scope();
    let (registry, _counter) = stub_registry(None);
    let audit = Arc::new(MemoryAuditLog::new());

    let delegate = json!({"action": "delegate", "instruction": "next"});
    let query = json!({"action": "call", "tool_name": "query_parquet_files", "arguments": {"sql": "SELECT 1"}});
    let planner = scripted(json!({
        "planning": [
            {"action": "call", "tool_name": "update_plan", "arguments": {"note": "Start with discovery"}},
            delegate, delegate, delegate, delegate, delegate,
            {"action": "call", "tool_name": "record_hypothesis", "arguments": {"service": "ts-order-service"}},
            {"action": "terminate", "rationale": "Order service dominates errors"}
        ]
    }));
    let analyst = scripted(json!({
        "analysis": [
            {"action": "call", "tool_name": "list_tables_in_directory"},
            query, query, query, query
        ]
    }));

    let report = Session::builder()
        .scope(scope)
        .registry(Arc::new(registry))
        .audit(audit.clone())
        .planner(planner)
        .analyst(analyst)
        .build()
        .unwrap()
        .run("Find the faulty service")
        .await
        .unwrap();

    assert_eq!(report.conclusion, ConclusionKind::Terminated);
    assert_eq!(report.root_cause_candidate.as_deref(), Some("ts-order-service"));
    assert_eq!(report.findings.len(), 5);
    assert_eq!(report.steps_taken, 8);
    assert_eq!(
        report.plan_notes,
        vec![
            "Start with discovery".to_string(),
            "Order service dominates errors".to_string()
        ]
    );

    let planning_calls: Vec<AuditEntry> = audit
        .entries()
        .into_iter()
        .filter(|e| e.role == Role::Planning)
        .collect();
    assert_eq!(planning_calls.len(), 2);
    assert!(planning_calls
        .iter()
        .all(|e| e.outcome == AuditOutcome::Success));
}

// ============================================================================
// Early Stops
// ============================================================================

#[tokio::test]
async fn test_step_ceiling_keeps_partial_findings() {
    let (_dir, scope) = make_scope();
    let (registry, _counter) = stub_registry(None);

    let err = Session::builder()
        .scope(scope)
        .registry(Arc::new(registry))
        .planner(rule_planner(100))
        .analyst(Arc::new(HintAnalyst))
        .deep_dive_iteration_cap(100)
        .step_ceiling(7)
        .build()
        .unwrap()
        .run("Find the faulty service")
        .await
        .unwrap_err();

    assert_eq!(err.reason, IncompleteReason::StepCeiling { ceiling: 7 });
    let report = err.report;
    assert_eq!(report.conclusion, ConclusionKind::Incomplete);
    assert!(!report.confirmed);
    assert_eq!(report.final_step, StepId::IterativeDeepDive);
    assert_eq!(report.findings.len(), 7);
    assert_eq!(report.steps_taken, 7);
    assert_eq!(report.root_cause_candidate.as_deref(), Some("ts-travel-service"));
}

#[tokio::test]
async fn test_iteration_cap_forces_unconfirmed_conclusion() {
    let (_dir, scope) = make_scope();
    let (registry, counter) = stub_registry(None);

    let report = Session::builder()
        .scope(scope)
        .registry(Arc::new(registry))
        .planner(rule_planner(100))
        .analyst(Arc::new(HintAnalyst))
        .deep_dive_iteration_cap(2)
        .build()
        .unwrap()
        .run("Find the faulty service")
        .await
        .unwrap();

    assert_eq!(report.conclusion, ConclusionKind::ForcedAtCap);
    assert!(!report.confirmed);
    assert_eq!(report.final_step, StepId::RootCauseDetermined);
    assert_eq!(report.root_cause_candidate.as_deref(), Some("ts-travel-service"));
    assert_eq!(report.findings.len(), 6);
    assert_eq!(
        report.transitions.last().map(|t| t.reason),
        Some(TransitionReason::IterationCap)
    );
    // The capping delegation never reaches the Analysis role
    assert_eq!(counter.count(), 6);
}

#[tokio::test]
async fn test_termination_without_deep_dive_finding_is_rejected() {
    let (_dir, scope) = make_scope();
    let (registry, _counter) = stub_registry(None);

    let delegate = json!({"action": "delegate", "instruction": "next"});
    let query = json!({"action": "call", "tool_name": "query_parquet_files", "arguments": {"sql": "SELECT 1"}});
    let planner = scripted(json!({
        "planning": [
            delegate, delegate, delegate, delegate,
            {"action": "terminate", "candidate": "ts-food-service"}
        ]
    }));
    let analyst = scripted(json!({
        "analysis": [
            {"action": "call", "tool_name": "list_tables_in_directory"},
            query, query, query
        ]
    }));

    let err = Session::builder()
        .scope(scope)
        .registry(Arc::new(registry))
        .planner(planner)
        .analyst(analyst)
        .step_ceiling(5)
        .build()
        .unwrap()
        .run("Find the faulty service")
        .await
        .unwrap_err();

    assert_eq!(err.reason, IncompleteReason::StepCeiling { ceiling: 5 });
    assert_eq!(err.report.final_step, StepId::IterativeDeepDive);
    assert_eq!(err.report.transitions.len(), 4);
    assert_eq!(err.report.root_cause_candidate, None);
}

#[tokio::test]
async fn test_timeout_returns_partial_report() {
    let (_dir, scope) = make_scope();
    let (registry, _counter) = stub_registry(Some(Duration::from_secs(5)));

    let err = Session::builder()
        .scope(scope)
        .registry(Arc::new(registry))
        .planner(rule_planner(2))
        .analyst(Arc::new(HintAnalyst))
        .timeout(Duration::from_millis(300))
        .build()
        .unwrap()
        .run("Find the faulty service")
        .await
        .unwrap_err();

    assert_eq!(err.reason, IncompleteReason::Timeout { after_ms: 300 });
    // Discovery is fast; the first query is what stalls
    assert_eq!(err.report.findings.len(), 1);
    assert_eq!(err.report.final_step, StepId::Overview);
}

#[tokio::test]
async fn test_call_in_flight_at_timeout_finishes_in_background() {
    let (_dir, scope) = make_scope();
    let (registry, counter) = stub_registry(Some(Duration::from_millis(400)));
    let audit = Arc::new(MemoryAuditLog::new());

    let err = Session::builder()
        .session_id("late-call")
        .scope(scope)
        .registry(Arc::new(registry))
        .audit(audit.clone())
        .planner(scripted(json!({
            "planning": [{"action": "delegate", "instruction": "count errors"}]
        })))
        .analyst(scripted(json!({
            "analysis": [{
                "action": "call",
                "tool_name": "query_parquet_files",
                "arguments": {"sql": "SELECT service, COUNT(*) AS error_count FROM abnormal_logs GROUP BY 1"}
            }]
        })))
        .timeout(Duration::from_millis(100))
        .build()
        .unwrap()
        .run("Find the faulty service")
        .await
        .unwrap_err();

    assert_eq!(err.reason, IncompleteReason::Timeout { after_ms: 100 });
    assert!(err.report.findings.is_empty());
    assert_eq!(err.report.final_step, StepId::Discover);
    assert_eq!(counter.count(), 1);
    assert!(audit.entries().is_empty());

    // The call was not cancelled; it completes and is audited, but its
    // result never reaches the finished report
    tokio::time::sleep(Duration::from_millis(700)).await;
    let entries = audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].outcome, AuditOutcome::Success);
    assert_eq!(entries[0].tool_name, "query_parquet_files");
    assert_eq!(entries[0].session_id, "late-call");
    assert_eq!(counter.count(), 1);
    assert!(err.report.findings.is_empty());
}

#[tokio::test]
async fn test_proposer_failure_is_reasoning_failure() {
    let (_dir, scope) = make_scope();
    let (registry, _counter) = stub_registry(None);

    let err = Session::builder()
        .scope(scope)
        .registry(Arc::new(registry))
        .planner(scripted(json!({"planning": [{"action": "delegate", "instruction": "list"}]})))
        .analyst(Arc::new(HintAnalyst))
        .build()
        .unwrap()
        .run("Find the faulty service")
        .await
        .unwrap_err();

    match err.reason {
        IncompleteReason::ReasoningFailure { message } => {
            assert!(message.contains("Script exhausted"))
        }
        other => panic!("unexpected reason: {:?}", other),
    }
    assert_eq!(err.report.findings.len(), 1);
}

// ============================================================================
// Role Enforcement
// ============================================================================

/// Planning proposer that tries a data tool, then records what it was told.
struct TrespassingPlanner {
    rejections: Mutex<Vec<Option<String>>>,
}

#[async_trait]
impl ActionProposer for TrespassingPlanner {
    async fn propose(&self, input: &ProposalInput) -> CoreResult<ProposedAction> {
        self.rejections
            .lock()
            .unwrap()
            .push(input.last_rejection.clone());
        Ok(ProposedAction::Call(
            ToolCall::new("list_tables_in_directory").with_arg("directory", "."),
        ))
    }
}

#[tokio::test]
async fn test_planning_cannot_invoke_data_tools() {
    let (_dir, scope) = make_scope();
    let (registry, counter) = stub_registry(None);
    let audit = Arc::new(MemoryAuditLog::new());
    let planner = Arc::new(TrespassingPlanner {
        rejections: Mutex::new(Vec::new()),
    });

    let err = Session::builder()
        .scope(scope)
        .registry(Arc::new(registry))
        .audit(audit.clone())
        .planner(planner.clone())
        .analyst(Arc::new(HintAnalyst))
        .step_ceiling(2)
        .build()
        .unwrap()
        .run("Find the faulty service")
        .await
        .unwrap_err();

    assert_eq!(err.reason, IncompleteReason::StepCeiling { ceiling: 2 });
    assert_eq!(counter.count(), 0, "handler must not run for a denied call");

    let denied = audit.with_outcome(AuditOutcome::PermissionDenied);
    assert_eq!(denied.len(), 2);
    assert!(denied.iter().all(|e| e.role == Role::Planning));
    assert!(denied
        .iter()
        .all(|e| e.tool_name == "list_tables_in_directory"));

    let seen = planner.rejections.lock().unwrap().clone();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], None);
    assert!(seen[1]
        .as_deref()
        .is_some_and(|r| r.contains("Permission denied")));
}

#[tokio::test]
async fn test_single_denied_call_is_audited_once() {
    let (_dir, scope) = make_scope();
    let (registry, counter) = stub_registry(None);
    let audit = Arc::new(MemoryAuditLog::new());

    let err = Session::builder()
        .scope(scope)
        .registry(Arc::new(registry))
        .audit(audit.clone())
        .planner(scripted(json!({
            "planning": [{"action": "call", "tool_name": "list_tables_in_directory"}]
        })))
        .analyst(Arc::new(HintAnalyst))
        .step_ceiling(1)
        .build()
        .unwrap()
        .run("Find the faulty service")
        .await
        .unwrap_err();

    assert!(matches!(err.reason, IncompleteReason::StepCeiling { .. }));
    assert_eq!(counter.count(), 0);
    assert_eq!(audit.len(), 1);
    assert_eq!(audit.with_outcome(AuditOutcome::PermissionDenied).len(), 1);
}

#[tokio::test]
async fn test_analysis_cannot_invoke_plan_tools() {
    let (_dir, scope) = make_scope();
    let (registry, _counter) = stub_registry(None);
    let audit = Arc::new(MemoryAuditLog::new());

    let err = Session::builder()
        .scope(scope)
        .registry(Arc::new(registry))
        .audit(audit.clone())
        .planner(scripted(json!({
            "planning": [{"action": "delegate", "instruction": "list"}]
        })))
        .analyst(scripted(json!({
            "analysis": [{"action": "call", "tool_name": "record_hypothesis", "arguments": {"service": "x"}}]
        })))
        .step_ceiling(1)
        .build()
        .unwrap()
        .run("Find the faulty service")
        .await
        .unwrap_err();

    assert!(err.report.findings.is_empty());
    assert_eq!(err.report.root_cause_candidate, None);
    let denied = audit.with_outcome(AuditOutcome::PermissionDenied);
    assert_eq!(denied.len(), 1);
    assert_eq!(denied[0].role, Role::Analysis);
}

#[test]
fn test_builder_rejects_zero_ceiling() {
    let (_dir, scope) = make_scope();
    let (registry, _counter) = stub_registry(None);
    let result = Session::builder()
        .scope(scope)
        .registry(Arc::new(registry))
        .planner(rule_planner(1))
        .analyst(Arc::new(HintAnalyst))
        .step_ceiling(0)
        .build();
    assert!(matches!(result, Err(CoreError::Config(_))));
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test]
async fn test_concurrent_sessions_share_registry_and_audit_file() {
    let (dir, scope) = make_scope();
    let (registry, counter) = stub_registry(None);
    let registry = Arc::new(registry);
    let audit_path = dir.path().join("audit").join("calls.jsonl");
    let audit = Arc::new(JsonlAuditLog::open(&audit_path).unwrap());

    let sessions: Vec<Session> = ["session-a", "session-b", "session-c"]
        .iter()
        .map(|id| {
            Session::builder()
                .session_id(*id)
                .scope(scope.clone())
                .registry(registry.clone())
                .audit(audit.clone())
                .planner(rule_planner(2))
                .analyst(Arc::new(HintAnalyst))
                .build()
                .unwrap()
        })
        .collect();

    let handles: Vec<_> = sessions
        .into_iter()
        .map(|session| tokio::spawn(session.run("Find the faulty service")))
        .collect();
    for handle in handles {
        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.findings.len(), 6);
        assert_eq!(report.conclusion, ConclusionKind::Terminated);
    }

    assert_eq!(counter.count(), 18);
    let text = std::fs::read_to_string(&audit_path).unwrap();
    let entries: Vec<AuditEntry> = text
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(entries.len(), 18);
    for id in ["session-a", "session-b", "session-c"] {
        assert_eq!(entries.iter().filter(|e| e.session_id == id).count(), 6);
    }
}
