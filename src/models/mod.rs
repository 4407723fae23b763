//! Data Models
//!
//! Workflow state, reports, and configuration.

pub mod report;
pub mod settings;
pub mod workflow;

pub use report::*;
pub use settings::*;
pub use workflow::*;
