//! Shared fixtures for the integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use rca_cascade::models::workflow::StepId;
use rca_cascade::services::session::{
    ActionProposer, ProposalInput, ProposalScript, ProposedAction, ScriptedProposer,
    TerminationSignal, ToolCall,
};
use rca_cascade::services::tools::register_plan_tools;
use rca_cascade::{CoreResult, Role};
use rca_cascade_tools::{FunctionTool, RawToolResult, ToolRegistry};

pub const TABLES: [&str; 3] = ["abnormal_logs", "abnormal_traces", "normal_traces"];

/// Invocation counter shared with a stub tool.
#[derive(Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Registry with stub data tools for Analysis and the real plan tools for
/// Planning. `query_delay` slows every `query_parquet_files` call.
pub fn stub_registry(query_delay: Option<Duration>) -> (ToolRegistry, CallCounter) {
    let counter = CallCounter::default();
    let mut registry = ToolRegistry::new();

    let list_counter = counter.clone();
    registry
        .register(
            "list_tables_in_directory",
            Arc::new(FunctionTool::new("List tables", move |_ctx, _args| {
                let counter = list_counter.clone();
                async move {
                    counter.bump();
                    Ok(RawToolResult::text(json!(TABLES).to_string()))
                }
            })),
            [Role::Analysis],
        )
        .unwrap();

    let query_counter = counter.clone();
    registry
        .register(
            "query_parquet_files",
            Arc::new(FunctionTool::new("Run SQL", move |_ctx, args| {
                let counter = query_counter.clone();
                async move {
                    counter.bump();
                    if let Some(delay) = query_delay {
                        tokio::time::sleep(delay).await;
                    }
                    let sql = args.get("sql").and_then(Value::as_str).unwrap_or("");
                    Ok(RawToolResult::text(
                        json!([{"service": "ts-travel-service", "error_count": 42, "sql": sql}])
                            .to_string(),
                    ))
                }
            })),
            [Role::Analysis],
        )
        .unwrap();

    register_plan_tools(&mut registry).unwrap();
    (registry, counter)
}

pub fn scripted(script: Value) -> Arc<ScriptedProposer> {
    let script: ProposalScript = serde_json::from_value(script).unwrap();
    Arc::new(ScriptedProposer::new(script))
}

/// A Planning proposer that walks the workflow by rule: delegate once per
/// linear step, run `deep_dive_rounds` rounds, then terminate.
pub struct RulePlanner {
    pub deep_dive_rounds: usize,
    pub candidate: String,
}

#[async_trait]
impl ActionProposer for RulePlanner {
    async fn propose(&self, input: &ProposalInput) -> CoreResult<ProposedAction> {
        let step = input.directive.step;
        if step != StepId::IterativeDeepDive {
            return Ok(ProposedAction::Delegate {
                instruction: format!("Gather evidence for {}", step),
                candidate: None,
            });
        }

        let deep_dive_findings = input.summary.finding_count.saturating_sub(4);
        if deep_dive_findings >= self.deep_dive_rounds {
            return Ok(ProposedAction::Terminate(TerminationSignal {
                candidate: Some(self.candidate.clone()),
                rationale: Some("Error counts concentrate in one service".to_string()),
            }));
        }
        Ok(ProposedAction::Delegate {
            instruction: "Drill into the noisiest service".to_string(),
            candidate: Some(self.candidate.clone()),
        })
    }
}

/// An Analysis proposer that picks the hinted tool for the current step.
pub struct HintAnalyst;

#[async_trait]
impl ActionProposer for HintAnalyst {
    async fn propose(&self, input: &ProposalInput) -> CoreResult<ProposedAction> {
        let call = if input.directive.step == StepId::Discover {
            ToolCall::new("list_tables_in_directory").with_arg("directory", ".")
        } else {
            ToolCall::new("query_parquet_files").with_arg(
                "sql",
                "SELECT service, count(*) AS error_count FROM abnormal_logs GROUP BY service",
            )
        };
        Ok(ProposedAction::Call(call))
    }
}
