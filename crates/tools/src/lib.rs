//! RCA Cascade Tools
//!
//! Tool-invocation plumbing shared by both investigation roles:
//! - `RawToolResult` / `ContentBlock` - the closed set of raw result shapes
//! - `normalize` - total conversion into a `CanonicalResult`
//! - `ToolHandler` trait and closure-based `FunctionTool`
//! - `ToolRegistry` - role-gated tool ownership, validated at registration
//! - `DelegationRouter` - authorize, invoke, normalize, audit
//! - `AuditSink` implementations for in-memory and JSON-lines logs
//!
//! Concrete tool backends (filesystem discovery, query engine, remote tool
//! servers) live in the main crate and implement `ToolHandler`.

pub mod audit;
pub mod normalizer;
pub mod registry;
pub mod result;
pub mod router;
pub mod trait_def;

pub use audit::{
    arguments_digest, AuditEntry, AuditOutcome, AuditSink, JsonlAuditLog, MemoryAuditLog,
    NoopAuditLog,
};
pub use normalizer::{normalize, parse_lenient, repair_json};
pub use registry::{ToolEntry, ToolRegistry};
pub use result::{
    CanonicalResult, ContentBlock, RawToolResult, ToolArguments, ToolResultEnvelope,
};
pub use router::{
    DelegationRouter, DispatchError, DispatchResult, ToolCallRequest, ToolExecutionError,
};
pub use trait_def::{required_str, FunctionTool, ToolHandler};
