//! Investigation Workflow
//!
//! The step state machine the Planning role consults each turn.

pub mod sequencer;

pub use sequencer::{SequencerConfig, SequencerError, WorkflowSequencer};
