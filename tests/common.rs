#![allow(dead_code)]

use devnet_supervisor::{LaunchSpec, LivenessMarker, ProcessSupervisor};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

/// Pid above any kernel pid_max, guaranteed not to name a process
pub const DEAD_PID: u32 = 2_000_000_000;

/// Startup verification window used by tests
pub const TEST_STARTUP_WAIT: Duration = Duration::from_millis(300);

/// Temp run directory holding one marker and one log sink
pub struct SupervisorFixture {
    pub temp_dir: TempDir,
    pub marker_path: PathBuf,
    pub log_path: PathBuf,
}

impl SupervisorFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let marker_path = temp_dir.path().join("run/test.pid");
        let log_path = temp_dir.path().join("logs/test.log");
        Self {
            temp_dir,
            marker_path,
            log_path,
        }
    }

    pub fn marker(&self) -> LivenessMarker {
        LivenessMarker::new(&self.marker_path)
    }

    /// Launch spec running `script` under /bin/sh
    pub fn shell_spec(&self, script: &str) -> LaunchSpec {
        LaunchSpec::new("test", "/bin/sh", &self.log_path)
            .arg("-c")
            .arg(script)
    }

    /// Supervisor for `script` sharing this fixture's marker and log
    pub fn supervisor(&self, script: &str) -> ProcessSupervisor {
        ProcessSupervisor::new(self.shell_spec(script), self.marker())
            .with_startup_wait(TEST_STARTUP_WAIT)
    }

    pub fn log_contents(&self) -> String {
        std::fs::read_to_string(&self.log_path).unwrap_or_default()
    }
}
