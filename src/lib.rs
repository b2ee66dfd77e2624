//! devnet-supervisor - lifecycle supervision for externally built devnet binaries
//!
//! The node, proof server and indexer used on a development network are built
//! in their own repositories and run here as opaque executables. This crate owns
//! exactly one such process per [`ProcessSupervisor`]: it starts it with a fixed
//! argument list and environment, records its pid in a liveness marker, stops it
//! with a graceful-then-forceful escalation, and optionally runs a [`Monitor`]
//! loop that restarts it after crashes or repeated health-check failures.
//!
//! ## Design Principles
//!
//! 1. **Marker is authoritative**: a process is running iff the liveness marker
//!    names a pid the OS confirms alive. Stale markers heal on the next check.
//! 2. **Idempotent control surface**: `start` on a live process and `stop` on a
//!    dead one are successful no-ops.
//! 3. **Two failure budgets**: crash-loops are bounded by `max_attempts`,
//!    unhealthy-but-alive processes are restarted after a separate threshold.
//! 4. **Sequential**: one supervisor, one child, no concurrent operations.

#[cfg(not(unix))]
compile_error!("devnet-supervisor only supports Unix-like platforms");

pub mod config;
pub mod error;
pub mod health;
pub mod process;
pub mod utils;

pub use config::SupervisorConfig;
pub use error::{SupervisorError, SupervisorResult};
pub use health::{HealthCheckResult, HealthProbe, UnhealthyReason};
pub use process::{
    LaunchSpec, LivenessMarker, ManagedProcess, Monitor, MonitorState, MonitorStats,
    ProcessStatus, ProcessSupervisor, ResourceSnapshot, RestartPolicy, StartOutcome,
};
