use crate::config::ProcessKind;
use std::time::Duration;
use thiserror::Error;

/// Failure taxonomy for the supervisor.
///
/// `Configuration` is fatal and raised before any child is spawned. The
/// timeout, crash and spawn variants drive a process to `Failed` and feed the
/// restart budget; `RestartBudgetExhausted` is terminal and tears the whole
/// system down.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("[{name}] failed to spawn: {source}")]
    Spawn {
        name: ProcessKind,
        #[source]
        source: std::io::Error,
    },

    #[error("[{name}] did not report ready within {timeout:?}")]
    StartupTimeout { name: ProcessKind, timeout: Duration },

    #[error("[{name}] did not exit within {timeout:?}")]
    ShutdownTimeout { name: ProcessKind, timeout: Duration },

    #[error("[{name}] {reason}")]
    Crash { name: ProcessKind, reason: String },

    #[error("[{name}] restart budget exhausted ({max} restarts within {window:?})")]
    RestartBudgetExhausted {
        name: ProcessKind,
        max: u32,
        window: Duration,
    },

    #[error("health channel: {0}")]
    Channel(#[from] std::io::Error),
}
