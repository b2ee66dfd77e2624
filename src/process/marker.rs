//! Liveness marker (pid file)
//!
//! A durable single-slot record of the supervised process id, so that a fresh
//! supervisor instance can rediscover a child launched by an earlier one. The
//! format is the decimal pid followed by a newline.
//!
//! Exactly one supervisor is expected to own a marker at a time. Nothing here
//! locks the file: two supervisors racing on the same path can both observe
//! "not running" and both spawn.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Pid file owned by one supervisor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LivenessMarker {
    path: PathBuf,
}

impl LivenessMarker {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a marker file is present (regardless of its content)
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the recorded pid
    ///
    /// Returns `None` if the marker is absent or unreadable. A marker whose
    /// content is not a valid pid is removed before returning `None`.
    pub fn read(&self) -> Option<u32> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read liveness marker {:?}: {}", self.path, e);
                return None;
            }
        };

        match parse_pid(&content) {
            Some(pid) => Some(pid),
            None => {
                debug!(
                    "Liveness marker {:?} holds no valid pid ({:?}); removing",
                    self.path,
                    content.trim()
                );
                if let Err(e) = self.clear() {
                    warn!("Failed to remove corrupt liveness marker {:?}: {}", self.path, e);
                }
                None
            }
        }
    }

    /// Record `pid`, replacing any previous marker
    ///
    /// Writes to a sibling temp file and renames it into place so a reader
    /// never observes a half-written pid.
    pub fn write(&self, pid: u32) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, format!("{}\n", pid))?;
        std::fs::rename(&tmp, &self.path).inspect_err(|_| {
            let _ = std::fs::remove_file(&tmp);
        })
    }

    /// Remove the marker; a missing marker is not an error
    pub fn clear(&self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Parse marker content into a pid
///
/// Accepts surrounding whitespace. Zero and values outside the `pid_t` range
/// are rejected: signalling them would address process groups, not a process.
pub fn parse_pid(content: &str) -> Option<u32> {
    let pid: u32 = content.trim().parse().ok()?;
    if pid == 0 || pid > i32::MAX as u32 {
        return None;
    }
    Some(pid)
}
