//! Health probes
//!
//! A probe answers "is the live process actually serving?". Probes never fail
//! with an error: transport problems are reported as `Unreachable`.

pub mod http;
pub mod jsonrpc;

use async_trait::async_trait;
use std::fmt;

pub use http::HttpHealthProbe;
pub use jsonrpc::JsonRpcHealthProbe;

/// Why a reachable service reported itself unhealthy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnhealthyReason {
    /// HTTP 503: the service is up but busy (e.g. a proof in progress)
    Busy,
    /// Any other non-200 HTTP status
    Status(u16),
    /// The service answered but the answer signals a problem
    Other(String),
}

/// Outcome of one health probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthCheckResult {
    Healthy,
    Unhealthy(UnhealthyReason),
    Unreachable(String),
}

impl HealthCheckResult {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthCheckResult::Healthy)
    }
}

impl fmt::Display for HealthCheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthCheckResult::Healthy => write!(f, "healthy"),
            HealthCheckResult::Unhealthy(UnhealthyReason::Busy) => write!(f, "busy (HTTP 503)"),
            HealthCheckResult::Unhealthy(UnhealthyReason::Status(code)) => {
                write!(f, "unhealthy (HTTP {})", code)
            }
            HealthCheckResult::Unhealthy(UnhealthyReason::Other(reason)) => {
                write!(f, "unhealthy: {}", reason)
            }
            HealthCheckResult::Unreachable(reason) => write!(f, "unreachable: {}", reason),
        }
    }
}

/// Health probe supplied to the monitor
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self) -> HealthCheckResult;
}

#[async_trait]
impl<T: HealthProbe + ?Sized> HealthProbe for Box<T> {
    async fn check(&self) -> HealthCheckResult {
        (**self).check().await
    }
}

/// Probe that only relies on process liveness
///
/// The monitor consults probes only for live processes, so this always
/// reports healthy.
#[derive(Debug, Clone, Copy, Default)]
pub struct LivenessProbe;

#[async_trait]
impl HealthProbe for LivenessProbe {
    async fn check(&self) -> HealthCheckResult {
        HealthCheckResult::Healthy
    }
}

/// Adapter turning a synchronous closure into a probe
pub struct FnProbe<F>(F);

/// Wrap `f` as a [`HealthProbe`]
pub fn probe_fn<F>(f: F) -> FnProbe<F>
where
    F: Fn() -> HealthCheckResult + Send + Sync,
{
    FnProbe(f)
}

#[async_trait]
impl<F> HealthProbe for FnProbe<F>
where
    F: Fn() -> HealthCheckResult + Send + Sync,
{
    async fn check(&self) -> HealthCheckResult {
        (self.0)()
    }
}

/// Map an HTTP status code to a probe result
pub fn classify_status(code: u16) -> HealthCheckResult {
    match code {
        200 => HealthCheckResult::Healthy,
        503 => HealthCheckResult::Unhealthy(UnhealthyReason::Busy),
        other => HealthCheckResult::Unhealthy(UnhealthyReason::Status(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(200), HealthCheckResult::Healthy);
        assert_eq!(
            classify_status(503),
            HealthCheckResult::Unhealthy(UnhealthyReason::Busy)
        );
        assert_eq!(
            classify_status(204),
            HealthCheckResult::Unhealthy(UnhealthyReason::Status(204))
        );
    }

    #[tokio::test]
    async fn test_fn_probe_and_boxed_probe() {
        let probe: Box<dyn HealthProbe> =
            Box::new(probe_fn(|| HealthCheckResult::Unreachable("refused".into())));
        let result = probe.check().await;
        assert!(!result.is_healthy());
        assert_eq!(result.to_string(), "unreachable: refused");

        assert!(LivenessProbe.check().await.is_healthy());
    }
}
