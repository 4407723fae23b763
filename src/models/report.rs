//! Investigation Reports
//!
//! `RootCauseReport` is what a session produces, complete or not.
//! `InvestigationIncomplete` wraps a partial report when the session stopped
//! before reaching a conclusion.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::workflow::{Finding, StepId, Transition};

/// How the investigation concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConclusionKind {
    /// Planning terminated the deep dive
    Terminated,
    /// The deep-dive iteration cap forced the conclusion
    ForcedAtCap,
    /// The session stopped before reaching the terminal step
    Incomplete,
}

/// Final (or partial) output of an investigation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootCauseReport {
    pub session_id: String,
    pub root_cause_candidate: Option<String>,
    /// True only when Planning terminated with a candidate
    pub confirmed: bool,
    pub conclusion: ConclusionKind,
    pub final_step: StepId,
    pub findings: Vec<Finding>,
    pub discovered_tables: BTreeSet<String>,
    pub plan_notes: Vec<String>,
    pub transitions: Vec<Transition>,
    pub steps_taken: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RootCauseReport {
    /// The answer line, if a candidate exists.
    pub fn answer_line(&self) -> Option<String> {
        self.root_cause_candidate
            .as_ref()
            .map(|service| format!("Root cause service: {}", service))
    }

    /// Plain-text rendering for terminal output.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Session: {}\n", self.session_id));
        out.push_str(&format!(
            "Conclusion: {} ({})\n",
            match self.conclusion {
                ConclusionKind::Terminated => "terminated by planning",
                ConclusionKind::ForcedAtCap => "forced at iteration cap",
                ConclusionKind::Incomplete => "incomplete",
            },
            if self.confirmed { "confirmed" } else { "unconfirmed" }
        ));
        out.push_str(&format!(
            "Steps taken: {}, transitions: {}, final step: {}\n",
            self.steps_taken,
            self.transitions.len(),
            self.final_step
        ));
        if !self.discovered_tables.is_empty() {
            let tables: Vec<&str> = self.discovered_tables.iter().map(String::as_str).collect();
            out.push_str(&format!("Tables: {}\n", tables.join(", ")));
        }

        out.push_str("\nFindings:\n");
        if self.findings.is_empty() {
            out.push_str("  (none)\n");
        }
        for (i, finding) in self.findings.iter().enumerate() {
            out.push_str(&format!(
                "  {}. [{}] {}\n",
                i + 1,
                finding.step,
                finding.summary
            ));
        }

        if let Some(line) = self.answer_line() {
            out.push('\n');
            out.push_str(&line);
            out.push('\n');
        }
        out
    }
}

/// Why a session stopped early.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IncompleteReason {
    #[error("step ceiling of {ceiling} exceeded")]
    StepCeiling { ceiling: u32 },

    #[error("session timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    #[error("reasoning layer failed: {message}")]
    ReasoningFailure { message: String },
}

/// A session that ended without reaching `RootCauseDetermined`.
///
/// Always carries the partial report with every finding gathered so far.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Investigation incomplete: {reason}")]
pub struct InvestigationIncomplete {
    pub reason: IncompleteReason,
    pub report: Box<RootCauseReport>,
}
