//! Configuration management for devnet-supervisor
//!
//! Handles configuration loading, validation, and translation into the
//! launch spec, restart policy and health probe used at runtime.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{SupervisorError, SupervisorResult};
use crate::health::{
    http::DEFAULT_PROBE_TIMEOUT, jsonrpc::DEFAULT_HEALTH_METHOD, HealthProbe, HttpHealthProbe,
    JsonRpcHealthProbe, LivenessProbe,
};
use crate::process::{LaunchSpec, RestartPolicy};
use crate::utils::env_or_else;

/// Environment variable overriding the default run directory
pub const RUN_DIR_ENV: &str = "SUPERVISOR_RUN_DIR";

/// Supervisor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// What to run
    pub process: ProcessConfig,

    /// Where the marker and log sink live
    #[serde(default)]
    pub paths: PathsConfig,

    /// Restart and timing policy
    #[serde(default)]
    pub restart: RestartConfig,

    /// Health probe used by `monitor`
    #[serde(default)]
    pub health: HealthConfig,

    /// Logging configuration
    pub logging: Option<LoggingConfig>,
}

/// Supervised process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Process name (e.g. "node", "proof-server", "indexer")
    pub name: String,

    /// Path to the executable
    pub executable: String,

    /// Command-line arguments
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment overrides
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Working directory
    #[serde(default)]
    pub working_dir: Option<String>,
}

/// File locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Base directory for default marker and log paths
    #[serde(default = "default_run_dir")]
    pub run_dir: String,

    /// Liveness marker path (default: `<run_dir>/<name>.pid`)
    #[serde(default)]
    pub marker_path: Option<String>,

    /// Log sink path (default: `<run_dir>/<name>.log`)
    #[serde(default)]
    pub log_path: Option<String>,
}

fn default_run_dir() -> String {
    env_or_else(RUN_DIR_ENV, || {
        std::env::temp_dir()
            .join("devnet-supervisor")
            .to_string_lossy()
            .into_owned()
    })
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            run_dir: default_run_dir(),
            marker_path: None,
            log_path: None,
        }
    }
}

/// Restart and timing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartConfig {
    /// Relaunches of a dead process before the monitor gives up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Pause before each relaunch (seconds)
    #[serde(default = "default_restart_delay")]
    pub restart_delay_secs: u64,

    /// Pause between monitor ticks (seconds)
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval_secs: u64,

    /// Consecutive failed probes before an unhealthy restart
    #[serde(default = "default_health_failure_threshold")]
    pub health_failure_threshold: u32,

    /// Graceful stop window before SIGKILL (seconds)
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_secs: u64,

    /// Startup verification window (milliseconds)
    #[serde(default = "default_startup_wait")]
    pub startup_wait_millis: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_restart_delay() -> u64 {
    2
}

fn default_health_check_interval() -> u64 {
    10
}

fn default_health_failure_threshold() -> u32 {
    3
}

fn default_stop_timeout() -> u64 {
    10
}

fn default_startup_wait() -> u64 {
    2000
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            restart_delay_secs: 2,
            health_check_interval_secs: 10,
            health_failure_threshold: 3,
            stop_timeout_secs: 10,
            startup_wait_millis: 2000,
        }
    }
}

/// Health probe kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthCheckKind {
    /// Liveness only
    None,
    /// HTTP GET, 200 = healthy
    Http,
    /// JSON-RPC call, `result` = healthy
    JsonRpc,
}

impl Default for HealthCheckKind {
    fn default() -> Self {
        Self::None
    }
}

/// Health probe configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default)]
    pub kind: HealthCheckKind,

    /// Probe URL (required for `http` and `jsonrpc`)
    #[serde(default)]
    pub url: Option<String>,

    /// JSON-RPC method
    #[serde(default = "default_health_method")]
    pub method: String,

    /// Connect/request timeout (seconds)
    #[serde(default = "default_probe_timeout")]
    pub timeout_secs: u64,
}

fn default_health_method() -> String {
    DEFAULT_HEALTH_METHOD.to_string()
}

fn default_probe_timeout() -> u64 {
    DEFAULT_PROBE_TIMEOUT.as_secs()
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            kind: HealthCheckKind::None,
            url: None,
            method: default_health_method(),
            timeout_secs: default_probe_timeout(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log filter (e.g. "info", "devnet_supervisor=debug"); RUST_LOG wins
    #[serde(default)]
    pub filter: Option<String>,

    /// Emit JSON lines (requires the `json-logging` feature)
    #[serde(default)]
    pub json_format: bool,
}

impl SupervisorConfig {
    /// Minimal configuration for `executable` with all defaults
    pub fn new(name: impl Into<String>, executable: impl Into<String>) -> Self {
        Self {
            process: ProcessConfig {
                name: name.into(),
                executable: executable.into(),
                args: Vec::new(),
                env: BTreeMap::new(),
                working_dir: None,
            },
            paths: PathsConfig::default(),
            restart: RestartConfig::default(),
            health: HealthConfig::default(),
            logging: None,
        }
    }

    /// Load configuration from a TOML or JSON file (by extension)
    pub fn from_file(path: &Path) -> SupervisorResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SupervisorError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        let config: SupervisorConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            _ => toml::from_str(&content)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Save configuration as TOML
    pub fn to_toml_file(&self, path: &Path) -> SupervisorResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SupervisorError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SupervisorResult<()> {
        if self.process.name.trim().is_empty() {
            return Err(SupervisorError::Config(
                "process.name must not be empty".to_string(),
            ));
        }
        if self.process.executable.trim().is_empty() {
            return Err(SupervisorError::Config(
                "process.executable must not be empty".to_string(),
            ));
        }

        match self.health.kind {
            HealthCheckKind::Http | HealthCheckKind::JsonRpc if self.health.url.is_none() => {
                return Err(SupervisorError::Config(format!(
                    "health.url is required for {:?} health checks",
                    self.health.kind
                )));
            }
            _ => {}
        }

        self.restart_policy().map(|_| ())
    }

    pub fn marker_path(&self) -> PathBuf {
        match self.paths.marker_path {
            Some(ref path) => PathBuf::from(path),
            None => Path::new(&self.paths.run_dir).join(format!("{}.pid", self.process.name)),
        }
    }

    pub fn log_path(&self) -> PathBuf {
        match self.paths.log_path {
            Some(ref path) => PathBuf::from(path),
            None => Path::new(&self.paths.run_dir).join(format!("{}.log", self.process.name)),
        }
    }

    pub fn launch_spec(&self) -> LaunchSpec {
        let mut spec = LaunchSpec::new(
            self.process.name.clone(),
            self.process.executable.clone(),
            self.log_path(),
        )
        .args(self.process.args.iter().cloned());
        spec.env = self.process.env.clone();
        spec.working_dir = self.process.working_dir.as_ref().map(PathBuf::from);
        spec
    }

    pub fn restart_policy(&self) -> SupervisorResult<RestartPolicy> {
        let policy = RestartPolicy::new(
            self.restart.max_attempts,
            Duration::from_secs(self.restart.restart_delay_secs),
            Duration::from_secs(self.restart.health_check_interval_secs),
        )?
        .with_health_failure_threshold(self.restart.health_failure_threshold)
        .with_stop_timeout(self.stop_timeout());
        policy.validate()?;
        Ok(policy)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.restart.stop_timeout_secs)
    }

    pub fn startup_wait(&self) -> Duration {
        Duration::from_millis(self.restart.startup_wait_millis)
    }

    /// Build the configured health probe
    pub fn health_probe(&self) -> SupervisorResult<Box<dyn HealthProbe>> {
        let timeout = Duration::from_secs(self.health.timeout_secs);
        let url = || {
            self.health.url.clone().ok_or_else(|| {
                SupervisorError::Config("health.url is required".to_string())
            })
        };

        let probe: Box<dyn HealthProbe> = match self.health.kind {
            HealthCheckKind::None => Box::new(LivenessProbe),
            HealthCheckKind::Http => Box::new(HttpHealthProbe::new(url()?, timeout)),
            HealthCheckKind::JsonRpc => Box::new(JsonRpcHealthProbe::new(
                url()?,
                self.health.method.clone(),
                timeout,
            )),
        };
        Ok(probe)
    }
}
