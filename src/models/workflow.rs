//! Investigation Workflow Models
//!
//! Step identifiers, findings, directives, and the per-session
//! `WorkflowState`. The state is owned by the workflow sequencer and only
//! changes through its transition functions.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use rca_cascade_tools::CanonicalResult;

// ============================================================================
// StepId
// ============================================================================

/// Fixed investigation steps, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    /// Find the available tables and their schemas
    Discover,
    /// Read the high-level problem description
    Overview,
    /// Extract anomalous data from the fault window
    AnomalyAnalysis,
    /// Compare against the normal window
    BaselineCompare,
    /// Repeated drill-down rounds until confident or capped
    IterativeDeepDive,
    /// Terminal state
    RootCauseDetermined,
}

impl StepId {
    /// All steps in workflow order.
    pub const ORDER: [StepId; 6] = [
        StepId::Discover,
        StepId::Overview,
        StepId::AnomalyAnalysis,
        StepId::BaselineCompare,
        StepId::IterativeDeepDive,
        StepId::RootCauseDetermined,
    ];

    /// The step a linear transition leads to. `None` for the terminal step.
    pub fn next(self) -> Option<StepId> {
        match self {
            StepId::Discover => Some(StepId::Overview),
            StepId::Overview => Some(StepId::AnomalyAnalysis),
            StepId::AnomalyAnalysis => Some(StepId::BaselineCompare),
            StepId::BaselineCompare => Some(StepId::IterativeDeepDive),
            StepId::IterativeDeepDive => Some(StepId::RootCauseDetermined),
            StepId::RootCauseDetermined => None,
        }
    }

    /// 1-based position in the workflow.
    pub fn number(self) -> usize {
        match self {
            StepId::Discover => 1,
            StepId::Overview => 2,
            StepId::AnomalyAnalysis => 3,
            StepId::BaselineCompare => 4,
            StepId::IterativeDeepDive => 5,
            StepId::RootCauseDetermined => 6,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, StepId::RootCauseDetermined)
    }

    /// Steps that advance as soon as a finding is recorded.
    pub fn is_linear(self) -> bool {
        !matches!(
            self,
            StepId::IterativeDeepDive | StepId::RootCauseDetermined
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            StepId::Discover => "Discover and understand data structure",
            StepId::Overview => "High-level problem overview",
            StepId::AnomalyAnalysis => "Analyze anomalous data",
            StepId::BaselineCompare => "Compare with normal data",
            StepId::IterativeDeepDive => "Iterative multi-round analysis",
            StepId::RootCauseDetermined => "Determine root cause",
        }
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepId::Discover => write!(f, "discover"),
            StepId::Overview => write!(f, "overview"),
            StepId::AnomalyAnalysis => write!(f, "anomaly_analysis"),
            StepId::BaselineCompare => write!(f, "baseline_compare"),
            StepId::IterativeDeepDive => write!(f, "iterative_deep_dive"),
            StepId::RootCauseDetermined => write!(f, "root_cause_determined"),
        }
    }
}

impl std::str::FromStr for StepId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "discover" => Ok(StepId::Discover),
            "overview" => Ok(StepId::Overview),
            "anomaly_analysis" => Ok(StepId::AnomalyAnalysis),
            "baseline_compare" => Ok(StepId::BaselineCompare),
            "iterative_deep_dive" => Ok(StepId::IterativeDeepDive),
            "root_cause_determined" => Ok(StepId::RootCauseDetermined),
            _ => Err(format!("Unknown workflow step: {}", s)),
        }
    }
}

// ============================================================================
// Finding / Directive / Transition
// ============================================================================

/// One recorded piece of evidence. Appended, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub step: StepId,
    pub summary: String,
    pub evidence: CanonicalResult,
}

impl Finding {
    pub fn new(step: StepId, summary: impl Into<String>, evidence: CanonicalResult) -> Self {
        Self {
            step,
            summary: summary.into(),
            evidence,
        }
    }
}

/// What the Planning role is asked to accomplish next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    pub step: StepId,
    /// Tool names expected to be useful for this step
    pub required_tool_hints: BTreeSet<String>,
}

/// Why a transition happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    /// A finding completed a linear step
    FindingRecorded,
    /// Planning asked for another deep-dive round
    DeepDiveRound,
    /// Planning signalled a confident conclusion
    TerminationSignal,
    /// The deep-dive iteration cap was reached
    IterationCap,
}

/// A recorded state change. Self-loops have `from == to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: StepId,
    pub to: StepId,
    pub reason: TransitionReason,
}

// ============================================================================
// WorkflowState
// ============================================================================

/// Mutable investigation state for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub(crate) current_step: StepId,
    pub(crate) discovered_tables: BTreeSet<String>,
    pub(crate) findings: Vec<Finding>,
    pub(crate) root_cause_candidate: Option<String>,
    pub(crate) plan_notes: Vec<String>,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self {
            current_step: StepId::Discover,
            discovered_tables: BTreeSet::new(),
            findings: Vec::new(),
            root_cause_candidate: None,
            plan_notes: Vec::new(),
        }
    }
}

impl WorkflowState {
    pub fn current_step(&self) -> StepId {
        self.current_step
    }

    pub fn discovered_tables(&self) -> &BTreeSet<String> {
        &self.discovered_tables
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn root_cause_candidate(&self) -> Option<&str> {
        self.root_cause_candidate.as_deref()
    }

    pub fn plan_notes(&self) -> &[String] {
        &self.plan_notes
    }

    pub fn last_finding(&self) -> Option<&Finding> {
        self.findings.last()
    }

    /// Compact view handed to the reasoning layer.
    pub fn summary(&self) -> StateSummary {
        StateSummary {
            current_step: self.current_step,
            discovered_tables: self.discovered_tables.iter().cloned().collect(),
            finding_count: self.findings.len(),
            finding_summaries: self.findings.iter().map(|f| f.summary.clone()).collect(),
            root_cause_candidate: self.root_cause_candidate.clone(),
            plan_notes: self.plan_notes.clone(),
        }
    }
}

/// Read-only summary of a `WorkflowState`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSummary {
    pub current_step: StepId,
    pub discovered_tables: Vec<String>,
    pub finding_count: usize,
    pub finding_summaries: Vec<String>,
    pub root_cause_candidate: Option<String>,
    pub plan_notes: Vec<String>,
}

/// Pull table names out of a discovery result.
///
/// Accepts a list of names, a list of objects with a `name` or `table`
/// field, or an object wrapping either under `tables`.
pub fn extract_table_names(evidence: &CanonicalResult) -> Vec<String> {
    use serde_json::Value;

    let items = match evidence {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("tables") {
            Some(Value::Array(items)) => items,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::String(name) => Some(name.clone()),
            Value::Object(obj) => obj
                .get("name")
                .or_else(|| obj.get("table"))
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        })
        .filter(|name| !name.is_empty())
        .collect()
}
