//! Monitor loop tests
//!
//! Crash-loop exhaustion, health-failure threshold behaviour and the
//! independence of the two failure counters.

mod common;

use async_trait::async_trait;
use common::*;
use devnet_supervisor::health::{probe_fn, LivenessProbe};
use devnet_supervisor::{
    HealthCheckResult, HealthProbe, Monitor, MonitorState, RestartPolicy, SupervisorError,
    UnhealthyReason,
};
use serial_test::serial;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Probe that replays a fixed cycle of results
struct CyclingProbe {
    results: Vec<HealthCheckResult>,
    calls: AtomicUsize,
}

impl CyclingProbe {
    fn new(results: Vec<HealthCheckResult>) -> Self {
        Self {
            results,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl HealthProbe for CyclingProbe {
    async fn check(&self) -> HealthCheckResult {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.results[n % self.results.len()].clone()
    }
}

fn fast_policy(max_attempts: u32) -> RestartPolicy {
    RestartPolicy::new(
        max_attempts,
        Duration::from_millis(50),
        Duration::from_millis(50),
    )
    .unwrap()
    .with_health_failure_threshold(3)
    .with_stop_timeout(Duration::from_secs(2))
}

fn unhealthy() -> HealthCheckResult {
    HealthCheckResult::Unhealthy(UnhealthyReason::Status(500))
}

#[test]
fn test_monitor_rejects_zero_max_attempts() {
    let fixture = SupervisorFixture::new();
    let policy = RestartPolicy {
        max_attempts: 0,
        ..RestartPolicy::default()
    };

    let result = Monitor::new(fixture.supervisor("exec sleep 30"), LivenessProbe, policy);
    assert!(matches!(result, Err(SupervisorError::InvalidPolicy(_))));
}

#[tokio::test]
#[serial]
async fn test_crash_loop_exhausts_after_max_attempts() {
    let fixture = SupervisorFixture::new();
    let supervisor = fixture.supervisor("echo crashing; exit 1");
    let mut monitor = Monitor::new(supervisor, LivenessProbe, fast_policy(3)).unwrap();

    let started = Instant::now();
    let result = monitor
        .run_until(tokio::time::sleep(Duration::from_secs(30)))
        .await;

    match result {
        Err(SupervisorError::MonitorExhausted { attempts }) => assert_eq!(attempts, 3),
        other => panic!("expected MonitorExhausted, got {:?}", other),
    }
    assert_eq!(monitor.stats().crash_restart_attempts, 3);
    assert_eq!(monitor.state(), MonitorState::Failed);
    assert!(!fixture.marker().exists());

    // Three launches of (delay + verification window) each, well short of the shutdown
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(fixture.log_contents().matches("launching test").count(), 3);
}

#[tokio::test]
#[serial]
async fn test_intervening_healthy_resets_health_counter() {
    let fixture = SupervisorFixture::new();
    let mut supervisor = fixture.supervisor("exec sleep 30");
    let pid = supervisor.start().await.unwrap().pid();

    // Two failures then a success, repeated: never three in a row
    let probe = CyclingProbe::new(vec![unhealthy(), unhealthy(), HealthCheckResult::Healthy]);
    let mut monitor = Monitor::new(supervisor, probe, fast_policy(3)).unwrap();

    monitor
        .run_until(tokio::time::sleep(Duration::from_millis(1200)))
        .await
        .unwrap();

    assert!(monitor.stats().ticks >= 6);
    assert_eq!(monitor.stats().health_restarts, 0);
    assert_eq!(monitor.stats().crash_restart_attempts, 0);
    assert_eq!(fixture.marker().read(), Some(pid));

    monitor
        .supervisor_mut()
        .stop(Duration::from_secs(5))
        .await
        .unwrap();
}

#[tokio::test]
#[serial]
async fn test_consecutive_health_failures_trigger_restart() {
    let fixture = SupervisorFixture::new();
    let mut supervisor = fixture.supervisor("exec sleep 30");
    let pid = supervisor.start().await.unwrap().pid();

    let probe = probe_fn(|| HealthCheckResult::Unreachable("connection refused".into()));
    let mut monitor = Monitor::new(supervisor, probe, fast_policy(3)).unwrap();

    // Three failed probes, then a stop (~1 s poll) and a start (0.3 s window)
    monitor
        .run_until(tokio::time::sleep(Duration::from_millis(2500)))
        .await
        .unwrap();

    assert!(monitor.stats().health_restarts >= 1);
    // Health restarts do not spend the crash budget
    assert_eq!(monitor.stats().crash_restart_attempts, 0);
    assert_eq!(monitor.stats().consecutive_restart_attempts, 0);

    let mut supervisor = monitor.into_supervisor();
    let new_pid = fixture.marker().read().expect("restarted process recorded");
    assert_ne!(new_pid, pid);
    assert!(supervisor.is_running());
    supervisor.stop(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_monitor_relaunches_crashed_process() {
    let fixture = SupervisorFixture::new();
    // Survives the 0.3 s verification window, then dies
    let supervisor = fixture.supervisor("sleep 0.6; exit 1");
    let mut monitor = Monitor::new(supervisor, LivenessProbe, fast_policy(2)).unwrap();

    let result = monitor
        .run_until(tokio::time::sleep(Duration::from_millis(2500)))
        .await;

    // Each relaunch succeeds, so the consecutive budget is never spent
    assert!(result.is_ok(), "{:?}", result);
    assert!(monitor.stats().crash_restart_attempts >= 2);
    assert_eq!(monitor.state(), MonitorState::Observing);

    monitor
        .supervisor_mut()
        .stop(Duration::from_secs(5))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_shutdown_leaves_child_running() {
    let fixture = SupervisorFixture::new();
    let mut supervisor = fixture.supervisor("exec sleep 30");
    let pid = supervisor.start().await.unwrap().pid();

    let mut monitor = Monitor::new(supervisor, LivenessProbe, fast_policy(3)).unwrap();
    monitor
        .run_until(tokio::time::sleep(Duration::from_millis(200)))
        .await
        .unwrap();

    let mut supervisor = monitor.into_supervisor();
    assert!(supervisor.is_running());
    assert_eq!(fixture.marker().read(), Some(pid));
    supervisor.stop(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_resolved_shutdown_stops_before_first_tick() {
    let fixture = SupervisorFixture::new();
    let supervisor = fixture.supervisor("exec sleep 30");
    let mut monitor = Monitor::new(supervisor, LivenessProbe, fast_policy(3)).unwrap();

    monitor.run_until(std::future::ready(())).await.unwrap();

    assert_eq!(monitor.stats().ticks, 0);
    assert!(!fixture.marker().exists());
}

#[tokio::test]
async fn test_shutdown_armed_before_first_tick() {
    let fixture = SupervisorFixture::new();
    let mut supervisor = fixture.supervisor("exec sleep 30");
    supervisor.start().await.unwrap();

    let armed = Arc::new(AtomicBool::new(false));
    let checks_before_armed = Arc::new(AtomicUsize::new(0));

    let shutdown = {
        let armed = armed.clone();
        async move {
            armed.store(true, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    };
    let probe = {
        let armed = armed.clone();
        let checks_before_armed = checks_before_armed.clone();
        probe_fn(move || {
            if !armed.load(Ordering::SeqCst) {
                checks_before_armed.fetch_add(1, Ordering::SeqCst);
            }
            HealthCheckResult::Healthy
        })
    };

    let mut monitor = Monitor::new(supervisor, probe, fast_policy(3)).unwrap();
    monitor.run_until(shutdown).await.unwrap();

    assert!(monitor.stats().ticks >= 1);
    assert_eq!(checks_before_armed.load(Ordering::SeqCst), 0);

    monitor
        .supervisor_mut()
        .stop(Duration::from_secs(5))
        .await
        .unwrap();
}
