//! RPC endpoint health probe.
//!
//! Sends `eth_blockNumber` to an endpoint and reports latency and liveness.
//! A probe never returns an error: transport failures, timeouts and malformed
//! answers all become an unhealthy [`EndpointHealth`], which the failover
//! registry counts against the endpoint.

use async_trait::async_trait;
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::client::{JsonRpcHttpClient, parse_quantity};
use crate::domain::{AppError, EndpointHealth, EndpointProbe};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the RPC health checker
#[derive(Debug, Clone)]
pub struct HealthCheckConfig {
    /// Per-probe timeout
    pub timeout: Duration,
    /// Responses slower than this are treated as unhealthy
    pub max_latency: Option<Duration>,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_latency: None,
        }
    }
}

impl HealthCheckConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        use std::env;

        let timeout_ms = env::var("VRF_DICE_RPC_PROBE_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10_000);

        let max_latency = env::var("VRF_DICE_RPC_MAX_LATENCY_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis);

        Self {
            timeout: Duration::from_millis(timeout_ms),
            max_latency,
        }
    }
}

// ============================================================================
// HTTP HEALTH CHECKER
// ============================================================================

/// Probes endpoints with `eth_blockNumber`
#[derive(Debug, Clone)]
pub struct HttpRpcHealthChecker {
    client: JsonRpcHttpClient,
    config: HealthCheckConfig,
}

impl HttpRpcHealthChecker {
    pub fn new(config: HealthCheckConfig) -> Result<Self, AppError> {
        Ok(Self {
            client: JsonRpcHttpClient::new(config.timeout)?,
            config,
        })
    }

    pub fn config(&self) -> &HealthCheckConfig {
        &self.config
    }
}

#[async_trait]
impl EndpointProbe for HttpRpcHealthChecker {
    async fn probe(&self, url: &str) -> EndpointHealth {
        let started = Instant::now();
        let result = self.client.call(url, "eth_blockNumber", json!([])).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let block_number = match result.and_then(|value| parse_quantity(&value)) {
            Ok(block_number) => block_number,
            Err(e) => {
                warn!(url = %url, latency_ms = latency_ms, error = %e, "RPC probe failed");
                return EndpointHealth::unhealthy(url, latency_ms, e.to_string());
            }
        };

        if let Some(max) = self.config.max_latency {
            if latency_ms > max.as_millis() as u64 {
                warn!(
                    url = %url,
                    latency_ms = latency_ms,
                    max_latency_ms = max.as_millis() as u64,
                    "RPC endpoint too slow"
                );
                return EndpointHealth::unhealthy(
                    url,
                    latency_ms,
                    format!("latency {latency_ms}ms above limit"),
                );
            }
        }

        debug!(
            url = %url,
            latency_ms = latency_ms,
            block_number = block_number,
            "RPC probe ok"
        );
        EndpointHealth::healthy(url, latency_ms, block_number)
    }
}

// ============================================================================
// TESTS
// ============================================================================
