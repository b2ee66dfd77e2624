//! Process supervisor
//!
//! Owns the lifecycle of exactly one external process: start (spawn, record,
//! verify), stop (SIGTERM, bounded wait, SIGKILL), liveness and status. All
//! operations are idempotent and tolerate a supervisor restart in between,
//! because the liveness marker on disk is the source of truth.

use nix::sys::signal::Signal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::ExitStatus;
use tokio::process::Child;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::config::SupervisorConfig;
use crate::error::{SupervisorError, SupervisorResult};
use crate::process::liveness::{self, ResourceSnapshot, SignalOutcome};
use crate::process::logs;
use crate::process::marker::LivenessMarker;
use crate::process::spawner::LaunchSpec;
use crate::utils::current_timestamp;

/// Default delay between spawn and the liveness re-check
pub const DEFAULT_STARTUP_WAIT: Duration = Duration::from_secs(2);

/// Liveness poll interval while waiting for a graceful exit
pub const STOP_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How long to wait for SIGKILL to take effect
pub const KILL_CONFIRM_WINDOW: Duration = Duration::from_secs(2);

const KILL_CONFIRM_POLL: Duration = Duration::from_millis(100);

/// Number of log lines attached to a start failure
pub const DEFAULT_LOG_TAIL_LINES: usize = 20;

/// One launched instance of the supervised binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedProcess {
    /// OS process id
    pub pid: u32,
    /// Supervised process name
    pub name: String,
    /// Unix timestamp of the launch
    pub started_at: u64,
    /// Where the process writes its output
    pub log_path: PathBuf,
}

/// Result of a successful `start`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new process was launched and survived the verification window
    Started(ManagedProcess),
    /// A live process was already recorded; nothing was launched
    AlreadyRunning(u32),
}

impl StartOutcome {
    pub fn pid(&self) -> u32 {
        match self {
            StartOutcome::Started(process) => process.pid,
            StartOutcome::AlreadyRunning(pid) => *pid,
        }
    }
}

/// Process status as reported by `status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProcessStatus {
    Running {
        pid: u32,
        resources: Option<ResourceSnapshot>,
    },
    NotRunning,
}

/// Supervisor for one external process
pub struct ProcessSupervisor {
    launch: LaunchSpec,
    marker: LivenessMarker,
    startup_wait: Duration,
    /// Handle of the child launched by this instance, used to reap it
    child: Option<Child>,
    /// Exit status collected when the child was reaped
    last_exit: Option<ExitStatus>,
}

impl ProcessSupervisor {
    /// Create a supervisor for `launch`, tracking its pid in `marker`
    pub fn new(launch: LaunchSpec, marker: LivenessMarker) -> Self {
        Self {
            launch,
            marker,
            startup_wait: DEFAULT_STARTUP_WAIT,
            child: None,
            last_exit: None,
        }
    }

    /// Create a supervisor from a loaded configuration
    pub fn from_config(config: &SupervisorConfig) -> Self {
        Self::new(config.launch_spec(), LivenessMarker::new(config.marker_path()))
            .with_startup_wait(config.startup_wait())
    }

    /// Set the startup verification window
    pub fn with_startup_wait(mut self, wait: Duration) -> Self {
        self.startup_wait = wait;
        self
    }

    pub fn name(&self) -> &str {
        &self.launch.name
    }

    pub fn launch_spec(&self) -> &LaunchSpec {
        &self.launch
    }

    pub fn marker(&self) -> &LivenessMarker {
        &self.marker
    }

    /// Start the process unless a live one is already recorded
    pub async fn start(&mut self) -> SupervisorResult<StartOutcome> {
        if let Some(pid) = self.running_pid() {
            info!("{} is already running (pid {})", self.launch.name, pid);
            return Ok(StartOutcome::AlreadyRunning(pid));
        }

        info!(
            "Starting {}: {}",
            self.launch.name,
            self.launch.executable.display()
        );

        let mut child = match self.launch.spawn() {
            Ok(child) => child,
            Err(e) => {
                return Err(self.start_failed(format!(
                    "failed to spawn {}: {}",
                    self.launch.executable.display(),
                    e
                )));
            }
        };

        let Some(pid) = child.id() else {
            let status = child.try_wait().ok().flatten();
            return Err(self.start_failed(describe_exit("exited immediately", status)));
        };

        if let Err(e) = self.marker.write(pid) {
            // Do not leave an untracked child behind
            if let Err(kill_err) = child.kill().await {
                warn!("Failed to kill untracked pid {}: {}", pid, kill_err);
            }
            return Err(self.start_failed(format!(
                "failed to record pid {} in {:?}: {}",
                pid,
                self.marker.path(),
                e
            )));
        }
        debug!("Recorded pid {} in {:?}", pid, self.marker.path());

        self.child = Some(child);
        self.last_exit = None;

        // Bad arguments and missing libraries surface after spawn, not from it
        sleep(self.startup_wait).await;

        if !self.pid_alive(pid) {
            let status = self.last_exit.take();
            self.clear_marker();
            return Err(self.start_failed(describe_exit("exited during startup", status)));
        }

        let process = ManagedProcess {
            pid,
            name: self.launch.name.clone(),
            started_at: current_timestamp(),
            log_path: self.launch.log_path.clone(),
        };
        info!(
            "{} started (pid {}), logging to {:?}",
            process.name, process.pid, process.log_path
        );
        Ok(StartOutcome::Started(process))
    }

    /// Stop the process: SIGTERM, wait up to `timeout`, then SIGKILL
    ///
    /// Stopping a process that is not running succeeds. On success the process
    /// is confirmed gone and the marker is cleared.
    pub async fn stop(&mut self, timeout: Duration) -> SupervisorResult<()> {
        let Some(pid) = self.running_pid() else {
            debug!("{} is not running; nothing to stop", self.launch.name);
            return Ok(());
        };

        info!("Stopping {} (pid {})", self.launch.name, pid);

        match liveness::send_signal(pid, Signal::SIGTERM) {
            Ok(SignalOutcome::Delivered) => {}
            Ok(SignalOutcome::Gone) => {
                self.reap();
                self.clear_marker();
                info!("{} had already exited", self.launch.name);
                return Ok(());
            }
            Err(e) => {
                return Err(SupervisorError::StopFailed(format!(
                    "SIGTERM to pid {} failed: {}",
                    pid, e
                )));
            }
        }

        if self.wait_for_exit(pid, timeout, STOP_POLL_INTERVAL).await {
            self.clear_marker();
            info!("{} stopped", self.launch.name);
            return Ok(());
        }

        warn!(
            "{} (pid {}) still running {:?} after SIGTERM; sending SIGKILL",
            self.launch.name, pid, timeout
        );

        match liveness::send_signal(pid, Signal::SIGKILL) {
            Ok(SignalOutcome::Delivered) => {}
            Ok(SignalOutcome::Gone) => {
                self.reap();
                self.clear_marker();
                info!("{} stopped", self.launch.name);
                return Ok(());
            }
            Err(e) => {
                return Err(SupervisorError::StopFailed(format!(
                    "SIGKILL to pid {} failed: {}",
                    pid, e
                )));
            }
        }

        if self
            .wait_for_exit(pid, KILL_CONFIRM_WINDOW, KILL_CONFIRM_POLL)
            .await
        {
            self.clear_marker();
            info!("{} killed", self.launch.name);
            Ok(())
        } else {
            Err(SupervisorError::StopFailed(format!(
                "pid {} still alive after SIGKILL",
                pid
            )))
        }
    }

    /// Stop then start
    pub async fn restart(&mut self, timeout: Duration) -> SupervisorResult<StartOutcome> {
        self.stop(timeout).await?;
        self.start().await
    }

    /// Whether the recorded process is alive
    pub fn is_running(&mut self) -> bool {
        self.running_pid().is_some()
    }

    /// Pid of the recorded process if it is alive
    ///
    /// A marker naming a dead process is removed here; this is the only place
    /// stale state heals.
    pub fn running_pid(&mut self) -> Option<u32> {
        let pid = self.marker.read()?;
        if self.pid_alive(pid) {
            Some(pid)
        } else {
            debug!(
                "Liveness marker {:?} names dead pid {}; clearing",
                self.marker.path(),
                pid
            );
            self.clear_marker();
            None
        }
    }

    /// Current status with a resource snapshot when running
    pub async fn status(&mut self) -> ProcessStatus {
        match self.running_pid() {
            Some(pid) => ProcessStatus::Running {
                pid,
                resources: liveness::resource_snapshot(pid).await,
            },
            None => ProcessStatus::NotRunning,
        }
    }

    /// Last `lines` lines of the log sink
    pub fn log_tail(&self, lines: usize) -> SupervisorResult<Vec<String>> {
        Ok(logs::read_tail(&self.launch.log_path, lines)?)
    }

    /// Liveness of `pid`, reaping it first if it is our own child
    fn pid_alive(&mut self, pid: u32) -> bool {
        if let Some(child) = self.child.as_mut() {
            if child.id() == Some(pid) {
                match child.try_wait() {
                    Ok(Some(status)) => {
                        debug!("{} (pid {}) exited: {}", self.launch.name, pid, status);
                        self.last_exit = Some(status);
                        self.child = None;
                        return false;
                    }
                    Ok(None) => return true,
                    Err(e) => debug!("try_wait on pid {} failed: {}", pid, e),
                }
            }
        }
        liveness::pid_alive(pid)
    }

    /// Collect our child's exit status if it has one
    fn reap(&mut self) {
        if let Some(child) = self.child.as_mut() {
            if let Ok(Some(status)) = child.try_wait() {
                self.last_exit = Some(status);
                self.child = None;
            }
        }
    }

    /// Poll until `pid` exits or `window` elapses; a window past the clock's
    /// range waits without a deadline
    async fn wait_for_exit(&mut self, pid: u32, window: Duration, poll: Duration) -> bool {
        let deadline = Instant::now().checked_add(window);
        loop {
            let remaining = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return !self.pid_alive(pid);
                    }
                    deadline - now
                }
                None => poll,
            };
            sleep(poll.min(remaining)).await;
            if !self.pid_alive(pid) {
                return true;
            }
        }
    }

    fn clear_marker(&self) {
        if let Err(e) = self.marker.clear() {
            warn!("Failed to remove liveness marker {:?}: {}", self.marker.path(), e);
        }
    }

    fn start_failed(&self, reason: String) -> SupervisorError {
        let log_tail = self
            .log_tail(DEFAULT_LOG_TAIL_LINES)
            .unwrap_or_else(|e| vec![format!("<log unavailable: {}>", e)]);

        error!("{} failed to start: {}", self.launch.name, reason);
        for line in &log_tail {
            error!("  | {}", line);
        }

        SupervisorError::StartFailed { reason, log_tail }
    }
}

fn describe_exit(what: &str, status: Option<ExitStatus>) -> String {
    match status {
        Some(status) => format!("{} ({})", what, status),
        None => what.to_string(),
    }
}
