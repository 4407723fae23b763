//! Investigation Sessions
//!
//! The Planning/Analysis loop and the reasoning-layer boundary it drives.

pub mod proposer;
pub mod runner;

pub use proposer::{
    ActionProposer, ProposalInput, ProposalScript, ProposedAction, ScriptedProposer,
    TerminationSignal, ToolCall,
};
pub use runner::{Session, SessionBuilder, DEFAULT_STEP_CEILING};
