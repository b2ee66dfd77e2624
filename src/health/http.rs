//! HTTP health probe (`/health`, `/ready` style endpoints)

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::{classify_status, HealthCheckResult, HealthProbe};

/// Default connect/request timeout for probes
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// GET a URL; 200 is healthy, 503 busy, connection failure unreachable
pub struct HttpHealthProbe {
    client: Client,
    url: String,
}

impl HttpHealthProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
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
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn check(&self) -> HealthCheckResult {
        match self.client.get(&self.url).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                debug!("GET {} -> {}", self.url, status);
                classify_status(status)
            }
            Err(e) => HealthCheckResult::Unreachable(e.to_string()),
        }
    }
}
