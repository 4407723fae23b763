//! Workflow Sequencer
//!
//! Drives the fixed investigation:
//!
//! ```text
//! Discover -> Overview -> AnomalyAnalysis -> BaselineCompare
//!          -> IterativeDeepDive (self-loop) -> RootCauseDetermined
//! ```
//!
//! Linear steps advance as soon as a finding is recorded for them. The
//! deep dive accumulates findings across rounds; Planning either starts
//! another round (a self-loop transition) or terminates. Reaching the
//! iteration cap forces `RootCauseDetermined` with the latest candidate.
//!
//! No transition leaves a step that has no finding since it was entered.
//! The sequencer never invokes tools.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::models::workflow::{
    extract_table_names, Directive, Finding, StepId, Transition, TransitionReason, WorkflowState,
};

/// Sequencer settings.
#[derive(Debug, Clone)]
pub struct SequencerConfig {
    /// Deep-dive rounds before the conclusion is forced
    pub deep_dive_iteration_cap: u32,
    /// Tool names suggested for each step
    pub tool_hints: BTreeMap<StepId, BTreeSet<String>>,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        let hints = |names: &[&str]| names.iter().map(|n| n.to_string()).collect::<BTreeSet<_>>();
        let mut tool_hints = BTreeMap::new();
        tool_hints.insert(
            StepId::Discover,
            hints(&["list_tables_in_directory", "get_schema"]),
        );
        tool_hints.insert(StepId::Overview, hints(&["query_parquet_files"]));
        tool_hints.insert(StepId::AnomalyAnalysis, hints(&["query_parquet_files"]));
        tool_hints.insert(StepId::BaselineCompare, hints(&["query_parquet_files"]));
        tool_hints.insert(StepId::IterativeDeepDive, hints(&["query_parquet_files"]));
        tool_hints.insert(StepId::RootCauseDetermined, BTreeSet::new());

        Self {
            deep_dive_iteration_cap: 5,
            tool_hints,
        }
    }
}

impl SequencerConfig {
    pub fn with_iteration_cap(mut self, cap: u32) -> Self {
        self.deep_dive_iteration_cap = cap;
        self
    }
}

/// Rejected sequencer operations. None of these change state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SequencerError {
    #[error("Cannot leave {step}: no finding recorded since entering it")]
    NoFindingsSinceEntry { step: StepId },

    #[error("Finding is for {found} but the current step is {expected}")]
    StepMismatch { expected: StepId, found: StepId },

    #[error("{operation} is only valid during the iterative deep dive (current step: {step})")]
    NotInDeepDive { operation: &'static str, step: StepId },

    #[error("Investigation already reached its root-cause determination")]
    AlreadyConcluded,
}

/// State machine over one `WorkflowState`.
#[derive(Debug, Clone)]
pub struct WorkflowSequencer {
    config: SequencerConfig,
    state: WorkflowState,
    transitions: Vec<Transition>,
    /// Findings recorded since the current step (or deep-dive round) began
    findings_since_entry: usize,
    /// Completed deep-dive rounds
    deep_dive_rounds: u32,
    /// Whether the cap, not Planning, ended the deep dive
    forced_at_cap: bool,
}

impl WorkflowSequencer {
    pub fn new(config: SequencerConfig) -> Self {
        Self {
            config,
            state: WorkflowState::default(),
            transitions: Vec::new(),
            findings_since_entry: 0,
            deep_dive_rounds: 0,
            forced_at_cap: false,
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn current_step(&self) -> StepId {
        self.state.current_step
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn findings_since_entry(&self) -> usize {
        self.findings_since_entry
    }

    pub fn deep_dive_rounds(&self) -> u32 {
        self.deep_dive_rounds
    }

    pub fn is_complete(&self) -> bool {
        self.state.current_step.is_terminal()
    }

    pub fn forced_at_cap(&self) -> bool {
        self.forced_at_cap
    }

    /// Next step plus the tools expected to help with it.
    pub fn directive(&self) -> Directive {
        let step = self.state.current_step;
        Directive {
            step,
            required_tool_hints: self
                .config
                .tool_hints
                .get(&step)
                .cloned()
                .unwrap_or_default(),
        }
    }

    /// Append a finding for the current step.
    ///
    /// On a linear step this completes the step and returns the transition.
    /// During the deep dive the finding is accumulated and `None` returned.
    pub fn record_finding(
        &mut self,
        finding: Finding,
    ) -> Result<Option<Transition>, SequencerError> {
        let step = self.state.current_step;
        if step.is_terminal() {
            return Err(SequencerError::AlreadyConcluded);
        }
        if finding.step != step {
            return Err(SequencerError::StepMismatch {
                expected: step,
                found: finding.step,
            });
        }

        if step == StepId::Discover {
            self.state
                .discovered_tables
                .extend(extract_table_names(&finding.evidence));
        }
        self.state.findings.push(finding);
        self.findings_since_entry += 1;

        tracing::debug!(
            step = %step,
            findings = self.state.findings.len(),
            "Finding recorded"
        );

        if step.is_linear() {
            let to = step.next().unwrap_or(StepId::RootCauseDetermined);
            return Ok(Some(self.transition(to, TransitionReason::FindingRecorded)));
        }
        Ok(None)
    }

    /// Close the current deep-dive round and start another.
    ///
    /// Returns the self-loop transition, or the forced transition to
    /// `RootCauseDetermined` when this round reaches the iteration cap.
    pub fn begin_next_round(&mut self) -> Result<Transition, SequencerError> {
        self.require_deep_dive("Starting a deep-dive round")?;
        self.require_findings()?;

        self.deep_dive_rounds += 1;
        if self.deep_dive_rounds >= self.config.deep_dive_iteration_cap {
            tracing::info!(
                rounds = self.deep_dive_rounds,
                cap = self.config.deep_dive_iteration_cap,
                candidate = ?self.state.root_cause_candidate,
                "Deep-dive iteration cap reached; forcing conclusion"
            );
            self.forced_at_cap = true;
            return Ok(self.transition(
                StepId::RootCauseDetermined,
                TransitionReason::IterationCap,
            ));
        }
        Ok(self.transition(StepId::IterativeDeepDive, TransitionReason::DeepDiveRound))
    }

    /// Planning's termination signal. Ends the deep dive.
    pub fn terminate(&mut self, candidate: Option<String>) -> Result<Transition, SequencerError> {
        self.require_deep_dive("Termination")?;
        self.require_findings()?;

        if candidate.is_some() {
            self.state.root_cause_candidate = candidate;
        }
        Ok(self.transition(
            StepId::RootCauseDetermined,
            TransitionReason::TerminationSignal,
        ))
    }

    /// Update the root-cause candidate. The latest proposal wins.
    pub fn propose_candidate(&mut self, candidate: impl Into<String>) {
        let candidate = candidate.into();
        if candidate.trim().is_empty() {
            return;
        }
        if self.state.root_cause_candidate.as_deref() != Some(candidate.as_str()) {
            tracing::debug!(candidate = %candidate, "Root-cause candidate updated");
        }
        self.state.root_cause_candidate = Some(candidate);
    }

    /// Record a Planning note. Notes never affect transitions.
    pub fn add_plan_note(&mut self, note: impl Into<String>) {
        self.state.plan_notes.push(note.into());
    }

    /// Consume the sequencer, keeping its state and transition log.
    pub fn into_parts(self) -> (WorkflowState, Vec<Transition>) {
        (self.state, self.transitions)
    }

    fn require_deep_dive(&self, operation: &'static str) -> Result<(), SequencerError> {
        match self.state.current_step {
            StepId::IterativeDeepDive => Ok(()),
            StepId::RootCauseDetermined => Err(SequencerError::AlreadyConcluded),
            step => Err(SequencerError::NotInDeepDive { operation, step }),
        }
    }

    fn require_findings(&self) -> Result<(), SequencerError> {
        if self.findings_since_entry == 0 {
            return Err(SequencerError::NoFindingsSinceEntry {
                step: self.state.current_step,
            });
        }
        Ok(())
    }

    fn transition(&mut self, to: StepId, reason: TransitionReason) -> Transition {
        let transition = Transition {
            from: self.state.current_step,
            to,
            reason,
        };
        tracing::info!(from = %transition.from, to = %to, reason = ?reason, "Workflow transition");
        self.state.current_step = to;
        self.findings_since_entry = 0;
        self.transitions.push(transition.clone());
        transition
    }
}
