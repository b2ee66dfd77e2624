//! Process lifecycle management
//!
//! Handles spawning, liveness tracking, stopping, and restart monitoring of a
//! single supervised process.

pub mod liveness;
pub mod logs;
pub mod marker;
pub mod monitor;
pub mod spawner;
pub mod supervisor;

pub use liveness::ResourceSnapshot;
pub use marker::LivenessMarker;
pub use monitor::{Monitor, MonitorState, MonitorStats, RestartPolicy};
pub use spawner::LaunchSpec;
pub use supervisor::{ManagedProcess, ProcessStatus, ProcessSupervisor, StartOutcome};
