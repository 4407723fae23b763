//! Integration Tests Module
//!
//! End-to-end tests for RCA Cascade: full investigation sessions over stub
//! and built-in tools, the delegation router against a real dataset
//! directory, the stdio tool transport across a process boundary, and the
//! command line.

// Shared fixtures
mod common;

// Two-role session runs, early stops, role enforcement, concurrency
mod session_test;

// Built-in tools through the delegation router
mod router_test;

// Stdio tool server and client
mod stdio_test;
