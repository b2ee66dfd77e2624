//! JSON-RPC health probe
//!
//! Nodes expose liveness through an RPC method (`system_health` by default)
//! rather than a plain HTTP path. Any `result` counts as healthy; an `error`
//! object or an unparsable body does not.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::{classify_status, HealthCheckResult, HealthProbe, UnhealthyReason};

/// Default health method
pub const DEFAULT_HEALTH_METHOD: &str = "system_health";

/// POST a JSON-RPC 2.0 request and judge the response
pub struct JsonRpcHealthProbe {
    client: Client,
    url: String,
    method: String,
}

impl JsonRpcHealthProbe {
    pub fn new(url: impl Into<String>, method: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            // Probes target local services
            .no_proxy()
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            url: url.into(),
            method: method.into(),
        }
    }
}

#[async_trait]
impl HealthProbe for JsonRpcHealthProbe {
    async fn check(&self) -> HealthCheckResult {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": self.method,
            "params": [],
        });

        let response = match self.client.post(&self.url).json(&request).send().await {
            Ok(response) => response,
            Err(e) => return HealthCheckResult::Unreachable(e.to_string()),
        };

        let status = response.status().as_u16();
        if status != 200 {
            return classify_status(status);
        }

        match response.json::<Value>().await {
            Ok(body) => {
                debug!("{} {} -> {}", self.url, self.method, body);
                classify_rpc_body(&body)
            }
            Err(e) => HealthCheckResult::Unhealthy(UnhealthyReason::Other(format!(
                "invalid JSON-RPC response: {}",
                e
            ))),
        }
    }
}

/// Judge a decoded JSON-RPC response body
pub fn classify_rpc_body(body: &Value) -> HealthCheckResult {
    if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return HealthCheckResult::Unhealthy(UnhealthyReason::Other(message));
    }

    if body.get("result").is_some() {
        HealthCheckResult::Healthy
    } else {
        HealthCheckResult::Unhealthy(UnhealthyReason::Other(
            "response has neither result nor error".to_string(),
        ))
    }
}
