//! Planning Tools
//!
//! Plan-management tooling for the Planning role. These tools touch no
//! data; they echo a structured record that the session applies to the
//! workflow state (`note` becomes a plan note, `candidate` becomes the
//! root-cause candidate).

use serde_json::json;

use rca_cascade_core::{CoreError, CoreResult, ToolContext};
use rca_cascade_tools::{required_str, FunctionTool, RawToolResult, ToolArguments};

/// `update_plan`: record a plan note.
pub fn update_plan_tool() -> FunctionTool {
    FunctionTool::new(
        "Record a plan update or the reasoning behind the next step.",
        update_plan,
    )
    .with_schema(json!({
        "type": "object",
        "properties": {
            "note": {"type": "string", "description": "Plan update text"}
        },
        "required": ["note"]
    }))
}

/// `record_hypothesis`: name the current root-cause candidate.
pub fn record_hypothesis_tool() -> FunctionTool {
    FunctionTool::new(
        "Record the service currently believed to be the root cause.",
        record_hypothesis,
    )
    .with_schema(json!({
        "type": "object",
        "properties": {
            "service": {"type": "string", "description": "Suspected root-cause service"},
            "evidence": {"type": "string", "description": "Supporting evidence"}
        },
        "required": ["service"]
    }))
}

async fn update_plan(ctx: ToolContext, args: ToolArguments) -> CoreResult<RawToolResult> {
    let note = required_str(&args, "note")?.trim().to_string();
    if note.is_empty() {
        return Err(CoreError::validation("note must not be empty"));
    }
    tracing::debug!(session_id = %ctx.session_id(), "Plan updated");
    Ok(RawToolResult::text(
        json!({"note": note, "recorded": true}).to_string(),
    ))
}

async fn record_hypothesis(ctx: ToolContext, args: ToolArguments) -> CoreResult<RawToolResult> {
    let service = required_str(&args, "service")?.trim().to_string();
    if service.is_empty() {
        return Err(CoreError::validation("service must not be empty"));
    }
    let evidence = args
        .get("evidence")
        .and_then(|v| v.as_str())
        .map(str::to_string);
    tracing::debug!(
        session_id = %ctx.session_id(),
        candidate = %service,
        "Hypothesis recorded"
    );
    Ok(RawToolResult::text(
        json!({"candidate": service, "evidence": evidence}).to_string(),
    ))
}
