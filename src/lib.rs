//! RCA Cascade
//!
//! Root-cause analysis over fault-injection observability data, run as a
//! two-role investigation:
//! - a Planning role that sequences the fixed workflow and owns plan tools
//! - an Analysis role that queries the dataset through data tools
//!
//! Tool calls from both roles go through a role-gated `DelegationRouter`
//! (see `rca-cascade-tools`); every result is normalized to one canonical
//! shape before either role sees it.

pub mod models;
pub mod services;
pub mod utils;

pub use models::report::{ConclusionKind, IncompleteReason, InvestigationIncomplete, RootCauseReport};
pub use models::settings::AppConfig;
pub use models::workflow::{Directive, Finding, StepId, WorkflowState};
pub use services::session::{
    ActionProposer, ProposalInput, ProposedAction, ScriptedProposer, Session, SessionBuilder,
    TerminationSignal, ToolCall,
};
pub use services::tools::builtin_registry;

pub use rca_cascade_core::{CoreError, CoreResult, DatasetScope, Role};
