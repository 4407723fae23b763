//! Application Settings
//!
//! TOML configuration read once at startup. Every field has a default, so
//! an empty file (or no file) is valid. The dataset scope is deliberately
//! absent: it is always supplied explicitly by the caller.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use rca_cascade_core::{CoreError, CoreResult};

/// Upper bound for any configured timeout (one week).
pub const MAX_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub session: SessionSettings,
    pub tools: ToolSettings,
    pub audit: AuditSettings,
    pub logging: LoggingSettings,
}

/// `[session]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Hard limit on Planning turns before the run is abandoned
    pub step_ceiling: u32,
    /// Deep-dive rounds before a conclusion is forced
    pub deep_dive_iteration_cap: u32,
    /// Wall-clock limit for one run; 0 disables it
    pub timeout_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            step_ceiling: 50,
            deep_dive_iteration_cap: 5,
            timeout_secs: 0,
        }
    }
}

impl SessionSettings {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// `[tools]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    /// Query engine executable, invoked as `<engine> -json -c <sql>`
    pub query_engine: String,
    /// Maximum rows any query may return
    pub max_rows: u32,
    /// Per-query timeout
    pub query_timeout_secs: u64,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            query_engine: "duckdb".to_string(),
            max_rows: 100,
            query_timeout_secs: 60,
        }
    }
}

/// `[audit]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditSettings {
    /// JSON-lines audit file; nothing is persisted when unset
    pub path: Option<PathBuf>,
}

/// `[logging]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive, e.g. `rca_cascade=debug`. Overrides `-v`.
    pub filter: Option<String>,
}

impl AppConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(text: &str) -> CoreResult<Self> {
        let config: AppConfig = toml::from_str(text)
            .map_err(|e| CoreError::config(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CoreError::config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&text)
    }

    /// Load from `path` if given, otherwise use defaults.
    pub fn load_or_default(path: Option<&Path>) -> CoreResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.session.step_ceiling == 0 {
            return Err(CoreError::config("session.step_ceiling must be > 0"));
        }
        if self.session.deep_dive_iteration_cap == 0 {
            return Err(CoreError::config(
                "session.deep_dive_iteration_cap must be > 0",
            ));
        }
        if self.tools.query_engine.trim().is_empty() {
            return Err(CoreError::config("tools.query_engine must not be empty"));
        }
        if self.tools.max_rows == 0 {
            return Err(CoreError::config("tools.max_rows must be > 0"));
        }
        if self.session.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(CoreError::config(format!(
                "session.timeout_secs must be <= {}",
                MAX_TIMEOUT_SECS
            )));
        }
        if self.tools.query_timeout_secs > MAX_TIMEOUT_SECS {
            return Err(CoreError::config(format!(
                "tools.query_timeout_secs must be <= {}",
                MAX_TIMEOUT_SECS
            )));
        }
        Ok(())
    }
}
