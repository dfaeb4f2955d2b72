//! Coordinator liveness probing
//!
//! A coordinator is live only if its info endpoint answers 200 with
//! `"starting": false`. Every other outcome, timeouts and malformed bodies
//! included, reads as "not active". Probes do not retry.

use crate::record::CoordinatorRecord;
use async_trait::async_trait;
use qgate_common::config::ProbeConfig;
use qgate_common::error::{GatewayError, Result};
use qgate_common::METRICS;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::debug;

/// Bounded-time liveness check
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    /// Whether the coordinator at `host:port` is up and done starting
    ///
    /// Never fails; unreachable or unready nodes report `false`.
    async fn is_active(&self, host: &str, port: u16) -> bool;

    async fn is_active_record(&self, record: &CoordinatorRecord) -> bool {
        self.is_active(&record.host, record.port).await
    }
}

/// Probes `GET http://host:port/v1/info`
#[derive(Debug, Clone)]
pub struct HttpLivenessProbe {
    client: Client,
    info_path: String,
    timeout: Duration,
}

impl HttpLivenessProbe {
    /// Create a probe from configuration
    pub fn new(config: &ProbeConfig) -> Result<Self> {
        let timeout = Duration::from_millis(config.timeout_ms);
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| GatewayError::config(format!("Failed to build probe client: {}", e)))?;

        Ok(Self {
            client,
            info_path: config.info_path.clone(),
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn info_url(&self, host: &str, port: u16) -> String {
        format!("http://{}:{}{}", host, port, self.info_path)
    }

    /// Issue the request; any error means "not active" to the caller
    async fn probe(&self, host: &str, port: u16) -> std::result::Result<bool, String> {
        let response = self
            .client
            .get(self.info_url(host, port))
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(format!("unexpected status {}", status));
        }

        let body = response
            .text()
            .await
            .map_err(|e| format!("failed to read body: {}", e))?;

        Ok(finished_starting(&body))
    }
}

#[async_trait]
impl LivenessProbe for HttpLivenessProbe {
    async fn is_active(&self, host: &str, port: u16) -> bool {
        let start = Instant::now();
        METRICS.coordinator.probes.inc();

        let active = match self.probe(host, port).await {
            Ok(true) => true,
            Ok(false) => {
                debug!(host, port, "Coordinator is still starting");
                false
            }
            Err(reason) => {
                debug!(host, port, %reason, "Liveness probe failed");
                false
            }
        };

        METRICS
            .coordinator
            .probe_duration
            .observe(start.elapsed().as_secs_f64());
        if !active {
            METRICS.coordinator.probe_failures.inc();
        }
        active
    }
}

/// `true` only for a JSON object whose `starting` field is the boolean `false`
fn finished_starting(body: &str) -> bool {
    match serde_json::from_str::<Value>(body) {
        Ok(info) => info.get("starting").and_then(Value::as_bool) == Some(false),
        Err(_) => false,
    }
}
