//! RCA Cascade Core
//!
//! Foundational types for the RCA Cascade workspace. This crate has zero
//! dependencies on tool backends, transports, or the reasoning layer.
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `role` - The two investigation roles (`Role`)
//! - `context` - Dataset scope and per-call tool context (`DatasetScope`, `ToolContext`)

pub mod context;
pub mod error;
pub mod role;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Roles ──────────────────────────────────────────────────────────────
pub use role::Role;

// ── Context ────────────────────────────────────────────────────────────
pub use context::{DatasetScope, ToolContext};
