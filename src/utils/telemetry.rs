//! Logging Initialisation
//!
//! One process-wide subscriber installed at startup, writing to stderr
//! only. Stdout belongs to protocol frames (`serve`) or the final report
//! (`run`). The default is `Silent`: no subscriber at all.

use tracing_subscriber::EnvFilter;

use rca_cascade_core::{CoreError, CoreResult};

/// Verbosity chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    #[default]
    Silent,
    Info,
    Debug,
}

impl Verbosity {
    /// Map a `-v` count.
    pub fn from_occurrences(count: u8) -> Self {
        match count {
            0 => Verbosity::Silent,
            1 => Verbosity::Info,
            _ => Verbosity::Debug,
        }
    }

    fn default_directive(self) -> Option<&'static str> {
        match self {
            Verbosity::Silent => None,
            Verbosity::Info => Some("info"),
            Verbosity::Debug => Some("debug"),
        }
    }
}

/// Filter directive to install, if any. An explicit filter wins over `-v`.
pub fn resolve_filter(verbosity: Verbosity, filter: Option<&str>) -> Option<String> {
    match filter.map(str::trim).filter(|f| !f.is_empty()) {
        Some(filter) => Some(filter.to_string()),
        None => verbosity.default_directive().map(str::to_string),
    }
}

/// Install the stderr subscriber.
///
/// Returns `Ok(false)` when logging stays silent. Calling this twice in a
/// process is a configuration error.
pub fn init_logging(verbosity: Verbosity, filter: Option<&str>) -> CoreResult<bool> {
    let Some(directive) = resolve_filter(verbosity, filter) else {
        return Ok(false);
    };
    let env_filter = EnvFilter::try_new(&directive)
        .map_err(|e| CoreError::config(format!("Invalid log filter '{}': {}", directive, e)))?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init()
        .map_err(|e| CoreError::config(format!("Logging already initialised: {}", e)))?;
    Ok(true)
}
