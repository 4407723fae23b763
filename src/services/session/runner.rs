//! Two-Role Session
//!
//! One investigation: a Planning proposer, an Analysis proposer, a
//! delegation router, and the workflow sequencer. `run` loops one Planning
//! turn at a time until the sequencer reaches `RootCauseDetermined`, the
//! step ceiling is exceeded, or the session times out.
//!
//! Each turn issues at most one tool call per role and waits for it. A call
//! still in flight when the session times out keeps running on its own task
//! (so its audit entry is still written) but its result is dropped.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use rca_cascade_core::{CoreError, CoreResult, DatasetScope, Role};
use rca_cascade_tools::{
    AuditSink, CanonicalResult, DelegationRouter, DispatchResult, NoopAuditLog, ToolCallRequest,
    ToolExecutionError, ToolRegistry,
};

use super::proposer::{ActionProposer, ProposalInput, ProposedAction, TerminationSignal, ToolCall};
use crate::models::report::{ConclusionKind, IncompleteReason, InvestigationIncomplete, RootCauseReport};
use crate::models::settings::SessionSettings;
use crate::models::workflow::{Finding, StepId, WorkflowState};
use crate::services::workflow::{SequencerConfig, WorkflowSequencer};

/// Default limit on Planning turns.
pub const DEFAULT_STEP_CEILING: u32 = 50;

// ============================================================================
// SessionBuilder
// ============================================================================

/// Builder for [`Session`]. Scope, registry, and both proposers are required.
#[derive(Default)]
pub struct SessionBuilder {
    session_id: Option<String>,
    scope: Option<DatasetScope>,
    registry: Option<Arc<ToolRegistry>>,
    audit: Option<Arc<dyn AuditSink>>,
    planner: Option<Arc<dyn ActionProposer>>,
    analyst: Option<Arc<dyn ActionProposer>>,
    step_ceiling: Option<u32>,
    timeout: Option<Duration>,
    sequencer: SequencerConfig,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the session ID. A random one is generated otherwise.
    pub fn session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    /// Set the dataset scope for data-query tools (required).
    pub fn scope(mut self, scope: DatasetScope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Set the shared tool registry (required).
    pub fn registry(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Set the Planning role's proposer (required).
    pub fn planner(mut self, planner: Arc<dyn ActionProposer>) -> Self {
        self.planner = Some(planner);
        self
    }

    /// Set the Analysis role's proposer (required).
    pub fn analyst(mut self, analyst: Arc<dyn ActionProposer>) -> Self {
        self.analyst = Some(analyst);
        self
    }

    pub fn step_ceiling(mut self, ceiling: u32) -> Self {
        self.step_ceiling = Some(ceiling);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn deep_dive_iteration_cap(mut self, cap: u32) -> Self {
        self.sequencer.deep_dive_iteration_cap = cap;
        self
    }

    pub fn sequencer_config(mut self, config: SequencerConfig) -> Self {
        self.sequencer = config;
        self
    }

    /// Apply the `[session]` settings.
    pub fn settings(mut self, settings: &SessionSettings) -> Self {
        self.step_ceiling = Some(settings.step_ceiling);
        self.sequencer.deep_dive_iteration_cap = settings.deep_dive_iteration_cap;
        self.timeout = settings.timeout();
        self
    }

    /// Build and validate the session.
    pub fn build(self) -> CoreResult<Session> {
        let scope = self
            .scope
            .ok_or_else(|| CoreError::config("a dataset scope is required"))?;
        let registry = self
            .registry
            .ok_or_else(|| CoreError::config("a tool registry is required"))?;
        let planner = self
            .planner
            .ok_or_else(|| CoreError::config("a Planning proposer is required"))?;
        let analyst = self
            .analyst
            .ok_or_else(|| CoreError::config("an Analysis proposer is required"))?;

        registry.ensure_roles_covered()?;

        let step_ceiling = self.step_ceiling.unwrap_or(DEFAULT_STEP_CEILING);
        if step_ceiling == 0 {
            return Err(CoreError::config("step_ceiling must be > 0"));
        }
        if self.sequencer.deep_dive_iteration_cap == 0 {
            return Err(CoreError::config("deep_dive_iteration_cap must be > 0"));
        }

        let id = self
            .session_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let audit = self.audit.unwrap_or_else(|| Arc::new(NoopAuditLog));
        let router = Arc::new(DelegationRouter::new(id.clone(), scope, registry, audit));

        Ok(Session {
            id,
            router,
            planner,
            analyst,
            sequencer: WorkflowSequencer::new(self.sequencer),
            step_ceiling,
            timeout: self.timeout,
            steps_taken: 0,
            last_rejection: None,
            started_at: Utc::now(),
        })
    }
}

// ============================================================================
// Session
// ============================================================================

/// One investigation session. Consumed by [`Session::run`].
pub struct Session {
    id: String,
    router: Arc<DelegationRouter>,
    planner: Arc<dyn ActionProposer>,
    analyst: Arc<dyn ActionProposer>,
    sequencer: WorkflowSequencer,
    step_ceiling: u32,
    timeout: Option<Duration>,
    steps_taken: u32,
    last_rejection: Option<String>,
    started_at: DateTime<Utc>,
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> &WorkflowState {
        self.sequencer.state()
    }

    /// Run the investigation to completion.
    ///
    /// Returns the report once `RootCauseDetermined` is reached. Stopping
    /// early for any reason yields `InvestigationIncomplete` with the partial
    /// report attached.
    pub async fn run(
        mut self,
        initial_directive: impl Into<String>,
    ) -> Result<RootCauseReport, InvestigationIncomplete> {
        let task = initial_directive.into();
        // A timeout too large to represent as an instant means no deadline
        let deadline = self
            .timeout
            .and_then(|t| tokio::time::Instant::now().checked_add(t));

        tracing::info!(
            session_id = %self.id,
            scope = %self.router.scope().root().display(),
            step_ceiling = self.step_ceiling,
            "Investigation started"
        );

        loop {
            if self.sequencer.is_complete() {
                let conclusion = if self.sequencer.forced_at_cap() {
                    ConclusionKind::ForcedAtCap
                } else {
                    ConclusionKind::Terminated
                };
                let report = self.build_report(conclusion);
                tracing::info!(
                    session_id = %self.id,
                    candidate = ?report.root_cause_candidate,
                    steps = self.steps_taken,
                    "Investigation concluded"
                );
                return Ok(report);
            }

            if self.steps_taken >= self.step_ceiling {
                return Err(self.incomplete(IncompleteReason::StepCeiling {
                    ceiling: self.step_ceiling,
                }));
            }
            self.steps_taken += 1;

            let outcome = match deadline {
                Some(deadline) => {
                    let timed = tokio::time::timeout_at(deadline, self.planning_turn(&task)).await;
                    match timed {
                        Ok(outcome) => outcome,
                        Err(_) => {
                            let after_ms = self
                                .timeout
                                .map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX))
                                .unwrap_or(0);
                            return Err(self.incomplete(IncompleteReason::Timeout { after_ms }));
                        }
                    }
                }
                None => self.planning_turn(&task).await,
            };

            if let Err(e) = outcome {
                return Err(self.incomplete(IncompleteReason::ReasoningFailure {
                    message: e.to_string(),
                }));
            }
        }
    }

    /// One Planning proposal and whatever it triggers.
    async fn planning_turn(&mut self, task: &str) -> CoreResult<()> {
        let input = self.proposal_input(Role::Planning, Some(task.to_string()));
        let action = self.planner.propose(&input).await?;
        self.last_rejection = None;

        tracing::debug!(
            session_id = %self.id,
            step = %self.sequencer.current_step(),
            action = ?action,
            "Planning proposed action"
        );

        match action {
            ProposedAction::Call(call) => self.planning_call(call).await,
            ProposedAction::Delegate {
                instruction,
                candidate,
            } => {
                if let Some(candidate) = candidate {
                    self.sequencer.propose_candidate(candidate);
                }
                self.delegate(instruction).await?;
            }
            ProposedAction::Terminate(signal) => self.terminate(signal),
        }
        Ok(())
    }

    /// Planning invokes one of its own tools.
    async fn planning_call(&mut self, call: ToolCall) {
        let request = call.into_request(Role::Planning);
        match self.dispatch(request).await {
            Ok(result) => self.apply_plan_update(&result),
            Err(e) => self.reject(e.to_string()),
        }
    }

    /// Hand a data question to the Analysis role and record its finding.
    async fn delegate(&mut self, instruction: String) -> CoreResult<()> {
        // A further delegation after a productive deep-dive round opens the next round
        if self.sequencer.current_step() == StepId::IterativeDeepDive
            && self.sequencer.findings_since_entry() > 0
        {
            match self.sequencer.begin_next_round() {
                Ok(transition) if transition.to.is_terminal() => return Ok(()),
                Ok(_) => {}
                Err(e) => {
                    self.reject(e.to_string());
                    return Ok(());
                }
            }
        }

        let input = self.proposal_input(Role::Analysis, Some(instruction));
        let call = match self.analyst.propose(&input).await? {
            ProposedAction::Call(call) => call,
            other => {
                self.reject(format!(
                    "Analysis role may only issue tool calls; got {:?}",
                    other
                ));
                return Ok(());
            }
        };

        let request = call.into_request(Role::Analysis);
        match self.dispatch(request.clone()).await {
            Ok(result) => {
                let summary = self.analyst.summarize(&request, &result);
                let finding = Finding::new(self.sequencer.current_step(), summary, result);
                if let Err(e) = self.sequencer.record_finding(finding) {
                    self.reject(e.to_string());
                }
            }
            Err(e) => self.reject(e.to_string()),
        }
        Ok(())
    }

    fn terminate(&mut self, signal: TerminationSignal) {
        if let Some(rationale) = signal.rationale.clone() {
            self.sequencer.add_plan_note(rationale);
        }
        if let Err(e) = self.sequencer.terminate(signal.candidate) {
            self.reject(e.to_string());
        }
    }

    /// Planning tool results may carry a `candidate` or a `note`.
    fn apply_plan_update(&mut self, result: &CanonicalResult) {
        if let Some(candidate) = result.get("candidate").and_then(|v| v.as_str()) {
            self.sequencer.propose_candidate(candidate);
        }
        if let Some(note) = result.get("note").and_then(|v| v.as_str()) {
            self.sequencer.add_plan_note(note);
        }
    }

    /// Dispatch on a separate task so a timed-out call can finish on its own.
    async fn dispatch(&self, request: ToolCallRequest) -> DispatchResult {
        let router = self.router.clone();
        let tool_name = request.tool_name.clone();
        match tokio::spawn(async move { router.dispatch(request).await }).await {
            Ok(outcome) => outcome,
            Err(e) => Err(ToolExecutionError {
                tool_name,
                cause: format!("tool task aborted: {}", e),
            }
            .into()),
        }
    }

    fn reject(&mut self, reason: String) {
        tracing::warn!(
            session_id = %self.id,
            step = %self.sequencer.current_step(),
            reason = %reason,
            "Action rejected"
        );
        self.last_rejection = Some(reason);
    }

    fn proposal_input(&self, role: Role, instruction: Option<String>) -> ProposalInput {
        let state = self.sequencer.state();
        ProposalInput {
            role,
            directive: self.sequencer.directive(),
            summary: state.summary(),
            last_finding: state.last_finding().cloned(),
            last_rejection: self.last_rejection.clone(),
            instruction,
        }
    }

    fn incomplete(&self, reason: IncompleteReason) -> InvestigationIncomplete {
        tracing::warn!(
            session_id = %self.id,
            reason = %reason,
            findings = self.sequencer.state().findings().len(),
            "Investigation incomplete"
        );
        InvestigationIncomplete {
            reason,
            report: Box::new(self.build_report(ConclusionKind::Incomplete)),
        }
    }

    fn build_report(&self, conclusion: ConclusionKind) -> RootCauseReport {
        let state = self.sequencer.state();
        let candidate = state.root_cause_candidate().map(str::to_string);
        RootCauseReport {
            session_id: self.id.clone(),
            confirmed: conclusion == ConclusionKind::Terminated && candidate.is_some(),
            root_cause_candidate: candidate,
            conclusion,
            final_step: state.current_step(),
            findings: state.findings().to_vec(),
            discovered_tables: state.discovered_tables().clone(),
            plan_notes: state.plan_notes().to_vec(),
            transitions: self.sequencer.transitions().to_vec(),
            steps_taken: self.steps_taken,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}
