//! Supervisor error types

use thiserror::Error;

/// Errors surfaced at the supervisor boundary.
///
/// OS-level failures (spawn, signal delivery, liveness probes) are folded into
/// these variants; callers never see raw errno values. Stale markers and
/// graceful-stop timeouts are recovered internally and never appear here.
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// Spawn failed, or the process exited inside the startup verification window
    #[error("Process failed to start: {reason}")]
    StartFailed {
        reason: String,
        /// Last lines of the log sink at the time of failure
        log_tail: Vec<String>,
    },

    /// The process survived both SIGTERM and SIGKILL, or could not be signalled
    #[error("Failed to stop process: {0}")]
    StopFailed(String),

    /// The monitor relaunched a dying process `attempts` times and gave up
    #[error("Monitor exhausted after {attempts} restart attempts")]
    MonitorExhausted { attempts: u32 },

    /// Restart policy rejected at construction
    #[error("Invalid restart policy: {0}")]
    InvalidPolicy(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem error outside the start/stop paths (log tail, config read)
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for SupervisorError {
    fn from(e: std::io::Error) -> Self {
        SupervisorError::Io(e.to_string())
    }
}

impl From<toml::de::Error> for SupervisorError {
    fn from(e: toml::de::Error) -> Self {
        SupervisorError::Config(e.to_string())
    }
}

impl From<serde_json::Error> for SupervisorError {
    fn from(e: serde_json::Error) -> Self {
        SupervisorError::Config(e.to_string())
    }
}

/// Result type for supervisor operations
pub type SupervisorResult<T> = Result<T, SupervisorError>;
