//! Services
//!
//! Workflow sequencing, investigation sessions, and the built-in tools.

pub mod session;
pub mod tools;
pub mod workflow;

pub use session::{ActionProposer, ScriptedProposer, Session, SessionBuilder};
pub use tools::{builtin_registry, StdioToolClient, StdioToolServer};
pub use workflow::{SequencerConfig, WorkflowSequencer};
