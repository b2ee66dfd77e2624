//! Launch specification and process spawning
//!
//! A [`LaunchSpec`] describes how to run the supervised binary. Spawning sends
//! combined stdout/stderr to the log sink and detaches the child into its own
//! process group, so it outlives the supervisor and group signals reach any
//! helpers it forks.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::debug;

use crate::utils::current_timestamp;

/// Immutable description of one supervised binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Supervised process name (used in logs and default file names)
    pub name: String,
    /// Path to the executable
    pub executable: PathBuf,
    /// Flat argument list
    pub args: Vec<String>,
    /// Environment overrides, applied on top of the inherited environment
    pub env: BTreeMap<String, String>,
    /// Working directory (inherits the supervisor's if unset)
    pub working_dir: Option<PathBuf>,
    /// Append-only log sink for the child's stdout and stderr
    pub log_path: PathBuf,
}

impl LaunchSpec {
    /// Create a launch spec with no arguments and no environment overrides
    pub fn new<S, E, L>(name: S, executable: E, log_path: L) -> Self
    where
        S: Into<String>,
        E: Into<PathBuf>,
        L: Into<PathBuf>,
    {
        Self {
            name: name.into(),
            executable: executable.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            working_dir: None,
            log_path: log_path.into(),
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add an environment override
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the working directory
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Spawn the process described by this spec
    ///
    /// Writes a launch banner to the log sink first so that the tail shown on a
    /// failed start begins at the current launch.
    pub(crate) fn spawn(&self) -> std::io::Result<Child> {
        let mut log = open_log_sink(&self.log_path)?;
        writeln!(
            log,
            "--- [{}] launching {}: {} {}",
            current_timestamp(),
            self.name,
            self.executable.display(),
            self.args.join(" ")
        )?;
        let log_err = log.try_clone()?;

        let mut command = Command::new(&self.executable);
        command
            .args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .process_group(0);

        if let Some(ref dir) = self.working_dir {
            command.current_dir(dir);
        }

        debug!("Spawning process: {:?} with args: {:?}", self.executable, self.args);

        command.spawn()
    }
}

/// Open the log sink for appending, creating parent directories as needed
fn open_log_sink(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_accumulates() {
        let spec = LaunchSpec::new("node", "/usr/bin/node", "/tmp/node.log")
            .arg("--dev")
            .args(["--rpc-port", "9944"])
            .env("RUST_LOG", "info")
            .working_dir("/srv");

        assert_eq!(spec.args, vec!["--dev", "--rpc-port", "9944"]);
        assert_eq!(spec.env.get("RUST_LOG").map(String::as_str), Some("info"));
        assert_eq!(spec.working_dir, Some(PathBuf::from("/srv")));
    }

    #[test]
    fn test_open_log_sink_creates_parents_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/logs/node.log");

        let mut first = open_log_sink(&path).unwrap();
        writeln!(first, "one").unwrap();
        drop(first);
        let mut second = open_log_sink(&path).unwrap();
        writeln!(second, "two").unwrap();
        drop(second);

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }
}
