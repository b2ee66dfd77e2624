//! OS-level liveness checks, signal delivery and resource snapshots
//!
//! Every failure here is folded into a negative answer (`false`, `Gone`,
//! `None`) or an errno for the caller to translate; nothing panics.

use nix::errno::Errno;
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Result of delivering a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    /// The signal was delivered
    Delivered,
    /// No such process (already exited)
    Gone,
}

/// Point-in-time resource usage of a running process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    /// Resident set size in bytes
    pub memory_bytes: u64,
    /// CPU usage over the sampling window, 100.0 per fully used core (if known)
    pub cpu_percent: Option<f32>,
    /// Virtual memory size in bytes
    pub virtual_memory_bytes: u64,
    /// Seconds since the process started (if known)
    pub run_time_secs: Option<u64>,
}

fn to_pid(pid: u32) -> Option<Pid> {
    i32::try_from(pid).ok().filter(|p| *p > 0).map(Pid::from_raw)
}

/// Whether `pid` names a live process
///
/// `EPERM` means the process exists but belongs to someone else, so it counts
/// as alive. Zombies are dead processes waiting to be reaped and count as dead.
pub fn pid_alive(pid: u32) -> bool {
    let Some(target) = to_pid(pid) else {
        return false;
    };

    match kill(target, None) {
        Ok(()) => !is_zombie(pid),
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Send `signal` to the process group led by `pid`, falling back to `pid` alone
///
/// Supervised children are launched as group leaders. A marker left by some
/// other launcher may name a process that leads no group, hence the fallback.
pub fn send_signal(pid: u32, signal: Signal) -> Result<SignalOutcome, Errno> {
    let target = to_pid(pid).ok_or(Errno::EINVAL)?;

    match killpg(target, signal) {
        Ok(()) => return Ok(SignalOutcome::Delivered),
        Err(Errno::ESRCH) => {}
        Err(e) => debug!("{} to process group {} failed: {}", signal, pid, e),
    }

    match kill(target, signal) {
        Ok(()) => Ok(SignalOutcome::Delivered),
        Err(Errno::ESRCH) => Ok(SignalOutcome::Gone),
        Err(e) => Err(e),
    }
}

/// Whether `/proc` reports `pid` as a zombie
#[cfg(target_os = "linux")]
fn is_zombie(pid: u32) -> bool {
    std::fs::read_to_string(format!("/proc/{}/stat", pid))
        .ok()
        .and_then(|stat| stat_state(&stat))
        .map(|state| state == 'Z' || state == 'X')
        .unwrap_or(false)
}

#[cfg(not(target_os = "linux"))]
fn is_zombie(_pid: u32) -> bool {
    false
}

/// Fields of `/proc/<pid>/stat` after the parenthesised command name
///
/// The command name may itself contain spaces and parentheses, so split at the
/// last `)`. Index 0 of the result is the state field.
fn stat_fields_after_comm(stat: &str) -> Option<Vec<&str>> {
    let close = stat.rfind(')')?;
    Some(stat[close + 1..].split_whitespace().collect())
}

fn stat_state(stat: &str) -> Option<char> {
    stat_fields_after_comm(stat)?
        .first()
        .and_then(|s| s.chars().next())
}

/// Collect a resource snapshot for `pid`
///
/// CPU usage needs two samples, so this takes at least
/// `sysinfo::MINIMUM_CPU_UPDATE_INTERVAL`.
#[cfg(feature = "sysinfo")]
pub async fn resource_snapshot(pid: u32) -> Option<ResourceSnapshot> {
    use sysinfo::{Pid as SysPid, System, MINIMUM_CPU_UPDATE_INTERVAL};

    let sys_pid = SysPid::from_u32(pid);
    let mut system = System::new();
    if !system.refresh_process(sys_pid) {
        return None;
    }
    tokio::time::sleep(MINIMUM_CPU_UPDATE_INTERVAL).await;
    if !system.refresh_process(sys_pid) {
        return None;
    }
    let process = system.process(sys_pid)?;

    Some(ResourceSnapshot {
        memory_bytes: process.memory(),
        cpu_percent: Some(process.cpu_usage()).filter(|cpu| cpu.is_finite() && *cpu >= 0.0),
        virtual_memory_bytes: process.virtual_memory(),
        run_time_secs: Some(process.run_time()),
    })
}

/// Collect a resource snapshot for `pid` from `/proc/<pid>/stat`
///
/// A single sample carries no CPU rate, so `cpu_percent` is `None`.
#[cfg(not(feature = "sysinfo"))]
pub async fn resource_snapshot(pid: u32) -> Option<ResourceSnapshot> {
    let stat = std::fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
    let fields = stat_fields_after_comm(&stat)?;

    // vsize is field 23 and rss field 24 of stat(5); index 0 here is field 3
    let vsize: u64 = fields.get(20).and_then(|s| s.parse().ok()).unwrap_or(0);
    let rss_pages: u64 = fields.get(21).and_then(|s| s.parse().ok()).unwrap_or(0);
    let page_size = 4096u64;

    Some(ResourceSnapshot {
        memory_bytes: rss_pages * page_size,
        cpu_percent: None,
        virtual_memory_bytes: vsize,
        run_time_secs: None,
    })
}
