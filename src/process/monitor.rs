//! Health monitoring and automatic restart
//!
//! The monitor polls the supervised process once per health-check interval and
//! keeps two independent failure counters:
//!
//! - consecutive restart attempts after the process was found dead, bounded by
//!   `max_attempts` (terminal when exhausted)
//! - consecutive failed health probes while the process is alive, bounded by
//!   `health_failure_threshold` (triggers a stop/start, never terminal)
//!
//! A transient health blip therefore never eats into the crash-loop budget.

use std::future::Future;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::error::{SupervisorError, SupervisorResult};
use crate::health::{HealthCheckResult, HealthProbe};
use crate::process::supervisor::{ProcessSupervisor, StartOutcome};

/// Default number of consecutive failed probes before a restart
pub const DEFAULT_HEALTH_FAILURE_THRESHOLD: u32 = 3;

/// Restart policy for the monitor loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartPolicy {
    /// Relaunches of a dead process before giving up (>= 1)
    pub max_attempts: u32,
    /// Pause before each relaunch
    pub restart_delay: Duration,
    /// Pause between successive ticks
    pub health_check_interval: Duration,
    /// Consecutive failed probes that trigger a restart (>= 1)
    pub health_failure_threshold: u32,
    /// Graceful stop window used when restarting an unhealthy process
    pub stop_timeout: Duration,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            restart_delay: Duration::from_secs(2),
            health_check_interval: Duration::from_secs(10),
            health_failure_threshold: DEFAULT_HEALTH_FAILURE_THRESHOLD,
            stop_timeout: Duration::from_secs(10),
        }
    }
}

impl RestartPolicy {
    /// Create a validated policy with default threshold and stop timeout
    pub fn new(
        max_attempts: u32,
        restart_delay: Duration,
        health_check_interval: Duration,
    ) -> SupervisorResult<Self> {
        let policy = Self {
            max_attempts,
            restart_delay,
            health_check_interval,
            ..Self::default()
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn with_health_failure_threshold(mut self, threshold: u32) -> Self {
        self.health_failure_threshold = threshold;
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Reject policies under which the monitor could never recover
    pub fn validate(&self) -> SupervisorResult<()> {
        if self.max_attempts == 0 {
            return Err(SupervisorError::InvalidPolicy(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.health_failure_threshold == 0 {
            return Err(SupervisorError::InvalidPolicy(
                "health_failure_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Monitor state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Watching a live process
    Observing,
    /// Relaunching after a crash or failed health checks
    Restarting,
    /// Restart budget exhausted
    Failed,
}

/// Counters kept by the monitor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorStats {
    /// Ticks evaluated
    pub ticks: u64,
    /// Relaunches since the last successful start
    pub consecutive_restart_attempts: u32,
    /// Failed probes since the last healthy one
    pub consecutive_health_failures: u32,
    /// Relaunches attempted because the process was found dead
    pub crash_restart_attempts: u64,
    /// Stop/start cycles triggered by failed health checks
    pub health_restarts: u64,
}

/// Poll loop that keeps one supervised process alive and healthy
pub struct Monitor<P: HealthProbe> {
    supervisor: ProcessSupervisor,
    probe: P,
    policy: RestartPolicy,
    state: MonitorState,
    stats: MonitorStats,
}

impl<P: HealthProbe> Monitor<P> {
    pub fn new(
        supervisor: ProcessSupervisor,
        probe: P,
        policy: RestartPolicy,
    ) -> SupervisorResult<Self> {
        policy.validate()?;
        Ok(Self {
            supervisor,
            probe,
            policy,
            state: MonitorState::Observing,
            stats: MonitorStats::default(),
        })
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn stats(&self) -> &MonitorStats {
        &self.stats
    }

    pub fn policy(&self) -> &RestartPolicy {
        &self.policy
    }

    pub fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }

    pub fn supervisor_mut(&mut self) -> &mut ProcessSupervisor {
        &mut self.supervisor
    }

    pub fn into_supervisor(self) -> ProcessSupervisor {
        self.supervisor
    }

    /// Run until `shutdown` resolves or the restart budget is exhausted
    ///
    /// Returns `Ok(())` on shutdown and `MonitorExhausted` otherwise. Shutdown
    /// is observed between ticks and leaves the supervised process running.
    pub async fn run_until<F>(&mut self, shutdown: F) -> SupervisorResult<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let name = self.supervisor.name().to_string();

        info!(
            "Monitoring {} (interval {:?}, max {} restart attempts, health threshold {})",
            name,
            self.policy.health_check_interval,
            self.policy.max_attempts,
            self.policy.health_failure_threshold
        );

        // First poll arms the shutdown future (e.g. installs signal handlers)
        // before a tick can spend a startup window without it
        let shutdown_requested = tokio::select! {
            biased;
            _ = &mut shutdown => true,
            _ = std::future::ready(()) => false,
        };

        if !shutdown_requested {
            loop {
                // An in-flight tick always finishes so the marker never names a half-stopped process
                self.tick().await?;

                tokio::select! {
                    biased;
                    _ = &mut shutdown => break,
                    _ = sleep(self.policy.health_check_interval) => {}
                }
            }
        }

        info!("Monitor for {} stopped; process left running", name);
        Ok(())
    }

    /// Evaluate one iteration of the state machine
    pub async fn tick(&mut self) -> SupervisorResult<()> {
        self.stats.ticks += 1;

        let Some(pid) = self.supervisor.running_pid() else {
            return self.recover_exited().await;
        };

        match self.probe.check().await {
            HealthCheckResult::Healthy => {
                if self.stats.consecutive_health_failures > 0 {
                    info!(
                        "{} (pid {}) healthy again after {} failed checks",
                        self.supervisor.name(),
                        pid,
                        self.stats.consecutive_health_failures
                    );
                } else {
                    info!("{} (pid {}) healthy", self.supervisor.name(), pid);
                }
                self.stats.consecutive_health_failures = 0;
            }
            failure => {
                self.stats.consecutive_health_failures += 1;
                warn!(
                    "{} (pid {}) health check failed ({}/{}): {}",
                    self.supervisor.name(),
                    pid,
                    self.stats.consecutive_health_failures,
                    self.policy.health_failure_threshold,
                    failure
                );
                if self.stats.consecutive_health_failures >= self.policy.health_failure_threshold
                {
                    self.restart_unhealthy().await;
                }
            }
        }

        Ok(())
    }

    /// The process is gone: relaunch it or give up
    async fn recover_exited(&mut self) -> SupervisorResult<()> {
        if self.stats.consecutive_restart_attempts >= self.policy.max_attempts {
            self.state = MonitorState::Failed;
            error!(
                "{} keeps exiting; giving up after {} restart attempts",
                self.supervisor.name(),
                self.stats.consecutive_restart_attempts
            );
            return Err(SupervisorError::MonitorExhausted {
                attempts: self.stats.consecutive_restart_attempts,
            });
        }

        self.state = MonitorState::Restarting;
        self.stats.consecutive_restart_attempts += 1;
        self.stats.crash_restart_attempts += 1;
        warn!(
            "{} is not running; restart attempt {}/{} in {:?}",
            self.supervisor.name(),
            self.stats.consecutive_restart_attempts,
            self.policy.max_attempts,
            self.policy.restart_delay
        );

        sleep(self.policy.restart_delay).await;

        match self.supervisor.start().await {
            Ok(outcome) => {
                self.on_started(&outcome);
                self.stats.consecutive_restart_attempts = 0;
            }
            Err(e) => warn!("Restart of {} failed: {}", self.supervisor.name(), e),
        }

        self.state = MonitorState::Observing;
        Ok(())
    }

    /// The process is alive but failed too many probes: stop and start it
    async fn restart_unhealthy(&mut self) {
        self.state = MonitorState::Restarting;
        info!(
            "Restarting {} after {} consecutive failed health checks",
            self.supervisor.name(),
            self.stats.consecutive_health_failures
        );
        self.stats.health_restarts += 1;
        self.stats.consecutive_health_failures = 0;

        match self.supervisor.stop(self.policy.stop_timeout).await {
            Ok(()) => match self.supervisor.start().await {
                Ok(outcome) => self.on_started(&outcome),
                // A dead process is picked up by the crash path on the next tick
                Err(e) => warn!("Restart of {} failed: {}", self.supervisor.name(), e),
            },
            Err(e) => warn!("Could not stop unhealthy {}: {}", self.supervisor.name(), e),
        }

        self.state = MonitorState::Observing;
    }

    fn on_started(&mut self, outcome: &StartOutcome) {
        self.stats.consecutive_health_failures = 0;
        info!(
            "{} restarted (pid {})",
            self.supervisor.name(),
            outcome.pid()
        );
    }
}
