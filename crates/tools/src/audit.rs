//! Dispatch Audit Log
//!
//! Every dispatch through the delegation router, successful or not, produces
//! one `AuditEntry`. Sinks are append-only and shared across sessions; each
//! entry is written as a single unit under the sink's lock so concurrent
//! sessions never interleave partial records.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use rca_cascade_core::{CoreResult, Role};

use crate::result::ToolArguments;

/// Outcome classification recorded for a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    PermissionDenied,
    UnknownTool,
    ToolExecutionError,
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub at: DateTime<Utc>,
    pub session_id: String,
    pub tool_call_id: String,
    pub role: Role,
    pub tool_name: String,
    /// SHA-256 of the serialized arguments
    pub arguments_digest: String,
    pub outcome: AuditOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Hex SHA-256 digest of tool arguments.
///
/// `serde_json::Map` keeps keys sorted, so equal argument maps hash equally.
pub fn arguments_digest(args: &ToolArguments) -> String {
    let serialized = serde_json::to_vec(args).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&serialized);
    format!("{:x}", hasher.finalize())
}

/// Append-only audit sink.
///
/// `record` is synchronous and is called from async dispatch, once per
/// tool call. Implementations must return quickly: one bounded append,
/// no network round trips and no waiting on other sinks. A sink that
/// needs slow I/O should hand entries to its own writer thread.
pub trait AuditSink: Send + Sync {
    /// Record a dispatch. Must not fail the dispatch.
    fn record(&self, entry: &AuditEntry);
}

/// In-memory audit log, used for inspection after a run and in tests.
#[derive(Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all entries in append order.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries with a given outcome.
    pub fn with_outcome(&self, outcome: AuditOutcome) -> Vec<AuditEntry> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.outcome == outcome)
            .collect()
    }
}

impl AuditSink for MemoryAuditLog {
    fn record(&self, entry: &AuditEntry) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry.clone());
    }
}

/// JSON-lines audit file. One entry per line.
///
/// Entries are serialized before the lock is taken; the lock covers a
/// single `write_all` of one line to a local append-mode file. That write
/// blocks the calling worker only for the length of one small append.
pub struct JsonlAuditLog {
    file: Mutex<File>,
}

impl JsonlAuditLog {
    /// Open (or create) an audit file in append mode.
    pub fn open(path: &Path) -> CoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl AuditSink for JsonlAuditLog {
    fn record(&self, entry: &AuditEntry) {
        let mut line = match serde_json::to_vec(entry) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize audit entry");
                return;
            }
        };
        line.push(b'\n');

        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = file.write_all(&line).and_then(|_| file.flush()) {
            tracing::warn!(error = %e, "Failed to append audit entry");
        }
    }
}

/// Sink that discards entries.
pub struct NoopAuditLog;

impl AuditSink for NoopAuditLog {
    fn record(&self, _entry: &AuditEntry) {}
}
