//! RPC failover registry.
//!
//! Counts consecutive failures per network against the active endpoint;
//! late failures from an endpoint already rotated away from are ignored. Below
//! `max_retries` the caller backs off exponentially (base 1s, doubling,
//! capped) and retries the same endpoint; at `max_retries` the registry
//! rotates to the next endpoint, wrapping after the last. Once every endpoint
//! of a network has been rotated away from without a success, the network is
//! reported as exhausted.

use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::{AppError, EndpointHealth, EndpointProbe, RpcError};
use crate::infra::network::NetworkRegistry;

/// Retry and backoff policy
#[derive(Debug, Clone)]
pub struct FailoverConfig {
    /// Consecutive failures tolerated on one endpoint before rotating
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl FailoverConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        use std::env;

        let max_retries = env::var("VRF_DICE_RPC_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3);

        let base_backoff_ms = env::var("VRF_DICE_RPC_BACKOFF_BASE_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1_000);

        let max_backoff_ms = env::var("VRF_DICE_RPC_BACKOFF_MAX_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30_000);

        Self {
            max_retries,
            base_backoff: Duration::from_millis(base_backoff_ms),
            max_backoff: Duration::from_millis(max_backoff_ms),
        }
    }

    /// Exponential backoff for the given zero-based attempt, capped
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.base_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// What the caller should do after a failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailoverOutcome {
    /// Wait, then retry the same endpoint
    Retry { attempt: u32, backoff: Duration },
    /// Switched to another endpoint; retry immediately
    Rotated { index: usize, url: String },
    /// Every endpoint failed in this round
    Exhausted,
}

#[derive(Debug, Default, Clone)]
struct FailureCounters {
    consecutive_failures: u32,
    rotations: usize,
}

/// Per-network endpoint failover
pub struct RpcFailover {
    registry: Arc<NetworkRegistry>,
    probe: Arc<dyn EndpointProbe>,
    config: FailoverConfig,
    counters: DashMap<u64, FailureCounters>,
}

impl RpcFailover {
    pub fn new(
        registry: Arc<NetworkRegistry>,
        probe: Arc<dyn EndpointProbe>,
        config: FailoverConfig,
    ) -> Self {
        Self {
            registry,
            probe,
            config,
            counters: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<NetworkRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &FailoverConfig {
        &self.config
    }

    /// Endpoint requests should currently go to
    pub fn active_endpoint(&self, chain_id: u64) -> Result<String, AppError> {
        self.registry
            .active_endpoint(chain_id)
            .ok_or(AppError::UnsupportedNetwork(chain_id))
    }

    /// Consecutive failures recorded against the active endpoint
    pub fn consecutive_failures(&self, chain_id: u64) -> u32 {
        self.counters
            .get(&chain_id)
            .map(|c| c.consecutive_failures)
            .unwrap_or(0)
    }

    pub fn record_success(&self, chain_id: u64) {
        self.counters.remove(&chain_id);
    }

    /// Count a failure of `url` and decide what happens next.
    ///
    /// Only the active endpoint is charged. A failure that arrives after the
    /// registry rotated away from `url` is not counted; the caller retries on
    /// the current endpoint.
    pub fn record_failure(&self, chain_id: u64, url: &str) -> FailoverOutcome {
        let mut counters = self.counters.entry(chain_id).or_default();
        let Some(network) = self.registry.get(chain_id) else {
            return FailoverOutcome::Exhausted;
        };
        let endpoint_count = network.rpc_endpoints.len();
        if endpoint_count == 0 {
            return FailoverOutcome::Exhausted;
        }

        let active = network.active_endpoint();
        if active != url {
            debug!(chain_id = chain_id, url = %url, active = %active, "Late failure from a rotated endpoint, not counted");
            return FailoverOutcome::Rotated {
                index: network.current_endpoint_index % endpoint_count,
                url: active.to_string(),
            };
        }

        let max_retries = self.config.max_retries.max(1);
        counters.consecutive_failures += 1;

        if counters.consecutive_failures < max_retries {
            let attempt = counters.consecutive_failures;
            return FailoverOutcome::Retry {
                attempt,
                backoff: self.config.backoff_for(attempt - 1),
            };
        }

        counters.consecutive_failures = 0;
        counters.rotations += 1;
        let exhausted = counters.rotations >= endpoint_count;
        if exhausted {
            counters.rotations = 0;
        }

        // Rotate under the counter lock so concurrent failures see the new endpoint
        let rotated = self.registry.rotate_endpoint(chain_id);
        drop(counters);
        let Some((index, url)) = rotated else {
            return FailoverOutcome::Exhausted;
        };

        if exhausted {
            error!(chain_id = chain_id, endpoints = endpoint_count, "All RPC endpoints failed");
            FailoverOutcome::Exhausted
        } else {
            warn!(chain_id = chain_id, index = index, url = %url, "Rotated to next RPC endpoint");
            FailoverOutcome::Rotated { index, url }
        }
    }

    /// Probe the active endpoint, failing over until one answers
    #[instrument(skip(self))]
    pub async fn check_active(&self, chain_id: u64) -> Result<EndpointHealth, AppError> {
        let probe = Arc::clone(&self.probe);
        self.execute(chain_id, move |url| {
            let probe = Arc::clone(&probe);
            async move {
                let health = probe.probe(&url).await;
                if health.healthy {
                    Ok(health)
                } else {
                    Err(AppError::Rpc(RpcError::Connection(
                        health.error.unwrap_or_else(|| "probe failed".to_string()),
                    )))
                }
            }
        })
        .await
    }

    /// Probe every endpoint of a network once, without touching counters
    pub async fn probe_all(&self, chain_id: u64) -> Result<Vec<EndpointHealth>, AppError> {
        let network = self
            .registry
            .get(chain_id)
            .ok_or(AppError::UnsupportedNetwork(chain_id))?;
        let mut results = Vec::with_capacity(network.rpc_endpoints.len());
        for url in &network.rpc_endpoints {
            results.push(self.probe.probe(url).await);
        }
        Ok(results)
    }

    /// Run `op` against the active endpoint with retry, backoff and rotation.
    ///
    /// Only transport-level failures count against an endpoint; JSON-RPC
    /// errors (reverts, bad params) are returned to the caller as-is.
    pub async fn execute<T, F, Fut>(&self, chain_id: u64, op: F) -> Result<T, AppError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        loop {
            let url = self.active_endpoint(chain_id)?;
            match op(url.clone()).await {
                Ok(value) => {
                    if self.consecutive_failures(chain_id) > 0 {
                        info!(chain_id = chain_id, url = %url, "RPC endpoint recovered");
                    }
                    self.record_success(chain_id);
                    return Ok(value);
                }
                Err(e) if is_endpoint_failure(&e) => {
                    debug!(chain_id = chain_id, url = %url, error = %e, "RPC endpoint failure");
                    match self.record_failure(chain_id, &url) {
                        FailoverOutcome::Retry { backoff, .. } => {
                            tokio::time::sleep(backoff).await;
                        }
                        FailoverOutcome::Rotated { .. } => {}
                        FailoverOutcome::Exhausted => {
                            return Err(AppError::RpcUnhealthy {
                                chain_id,
                                reason: format!("all endpoints exhausted, last error: {e}"),
                            });
                        }
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Transport failures that should count against the endpoint
pub fn is_endpoint_failure(err: &AppError) -> bool {
    matches!(
        err,
        AppError::Rpc(
            RpcError::Connection(_)
                | RpcError::Timeout(_)
                | RpcError::HttpStatus(_)
                | RpcError::InvalidResponse(_)
        )
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockEndpointProbe;

    const APOTHEM_PRIMARY: &str = "https://rpc.apothem.network";

    fn failover(probe: Arc<MockEndpointProbe>, max_retries: u32) -> RpcFailover {
        RpcFailover::new(
            Arc::new(NetworkRegistry::builtin()),
            probe,
            FailoverConfig {
                max_retries,
                base_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(4),
            },
        )
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = FailoverConfig::default();
        assert_eq!(config.backoff_for(0), Duration::from_secs(1));
        assert_eq!(config.backoff_for(1), Duration::from_secs(2));
        assert_eq!(config.backoff_for(2), Duration::from_secs(4));
        assert_eq!(config.backoff_for(4), Duration::from_secs(16));
        assert_eq!(config.backoff_for(5), Duration::from_secs(30)); // Capped
        assert_eq!(config.backoff_for(40), Duration::from_secs(30));
    }

    #[test]
    fn test_rotation_after_max_retries() {
        let failover = failover(Arc::new(MockEndpointProbe::new()), 3);
        let before = failover.registry().get(51).unwrap();
        let active = before.active_endpoint().to_string();

        assert!(matches!(
            failover.record_failure(51, &active),
            FailoverOutcome::Retry { attempt: 1, .. }
        ));
        assert!(matches!(
            failover.record_failure(51, &active),
            FailoverOutcome::Retry { attempt: 2, .. }
        ));
        let outcome = failover.record_failure(51, &active);

        let expected = (before.current_endpoint_index + 1) % before.rpc_endpoints.len();
        assert_eq!(
            outcome,
            FailoverOutcome::Rotated {
                index: expected,
                url: before.rpc_endpoints[expected].clone(),
            }
        );
        assert_eq!(
            failover.active_endpoint(51).unwrap(),
            before.rpc_endpoints[expected]
        );
        assert_eq!(failover.consecutive_failures(51), 0);
    }

    #[test]
    fn test_success_resets_counters() {
        let failover = failover(Arc::new(MockEndpointProbe::new()), 3);
        failover.record_failure(51, APOTHEM_PRIMARY);
        failover.record_failure(51, APOTHEM_PRIMARY);
        failover.record_success(51);
        assert!(matches!(
            failover.record_failure(51, APOTHEM_PRIMARY),
            FailoverOutcome::Retry { attempt: 1, .. }
        ));
    }

    #[test]
    fn test_exhausted_after_full_round() {
        let failover = failover(Arc::new(MockEndpointProbe::new()), 1);
        // Apothem has three endpoints
        assert!(matches!(
            failover.record_failure(51, APOTHEM_PRIMARY),
            FailoverOutcome::Rotated { index: 1, .. }
        ));
        assert!(matches!(
            failover.record_failure(51, "https://erpc.apothem.network"),
            FailoverOutcome::Rotated { index: 2, .. }
        ));
        assert_eq!(
            failover.record_failure(51, "https://apothem.xdcrpc.com"),
            FailoverOutcome::Exhausted
        );
        // Wrapped back to the first endpoint for the next round
        assert_eq!(
            failover.active_endpoint(51).unwrap(),
            "https://rpc.apothem.network"
        );
    }

    #[test]
    fn test_late_failure_from_rotated_endpoint_is_not_counted() {
        let failover = failover(Arc::new(MockEndpointProbe::new()), 2);
        failover.record_failure(51, APOTHEM_PRIMARY);
        assert!(matches!(
            failover.record_failure(51, APOTHEM_PRIMARY),
            FailoverOutcome::Rotated { index: 1, .. }
        ));

        // Requests still in flight against the old endpoint fail afterwards
        for _ in 0..3 {
            assert_eq!(
                failover.record_failure(51, APOTHEM_PRIMARY),
                FailoverOutcome::Rotated {
                    index: 1,
                    url: "https://erpc.apothem.network".to_string(),
                }
            );
        }
        assert_eq!(failover.consecutive_failures(51), 0);
        assert_eq!(
            failover.active_endpoint(51).unwrap(),
            "https://erpc.apothem.network"
        );
    }

    #[tokio::test]
    async fn test_concurrent_failures_rotate_once() {
        let failover = failover(Arc::new(MockEndpointProbe::new()), 3);
        let op = |url: String| async move {
            // Let every request reach the endpoint before any of them fails
            tokio::task::yield_now().await;
            if url == APOTHEM_PRIMARY {
                Err(AppError::Rpc(RpcError::Connection("connection refused".to_string())))
            } else {
                Ok(url)
            }
        };

        let (a, b, c, d) = tokio::join!(
            failover.execute(51, op),
            failover.execute(51, op),
            failover.execute(51, op),
            failover.execute(51, op),
        );

        for result in [a, b, c, d] {
            assert_eq!(result.unwrap(), "https://erpc.apothem.network");
        }
        assert_eq!(
            failover.active_endpoint(51).unwrap(),
            "https://erpc.apothem.network"
        );
        assert_eq!(failover.consecutive_failures(51), 0);
    }

    #[tokio::test]
    async fn test_check_active_fails_over_to_healthy_endpoint() {
        let probe = Arc::new(MockEndpointProbe::new());
        probe.set_unhealthy("https://rpc.apothem.network");
        let failover = failover(Arc::clone(&probe), 2);

        let health = failover.check_active(51).await.unwrap();
        assert!(health.healthy);
        assert_eq!(health.url, "https://erpc.apothem.network");
        assert_eq!(probe.probe_count("https://rpc.apothem.network"), 2);
    }

    #[tokio::test]
    async fn test_check_active_all_unhealthy() {
        let probe = Arc::new(MockEndpointProbe::new());
        probe.set_unhealthy("https://rpc.apothem.network");
        probe.set_unhealthy("https://erpc.apothem.network");
        probe.set_unhealthy("https://apothem.xdcrpc.com");
        let failover = failover(probe, 2);

        let result = failover.check_active(51).await;
        assert!(matches!(
            result,
            Err(AppError::RpcUnhealthy { chain_id: 51, .. })
        ));
    }

    #[tokio::test]
    async fn test_execute_does_not_fail_over_on_json_rpc_error() {
        let failover = failover(Arc::new(MockEndpointProbe::new()), 1);
        let result: Result<(), AppError> = failover
            .execute(51, |_url| async {
                Err(AppError::Rpc(RpcError::JsonRpc {
                    code: 3,
                    message: "execution reverted".to_string(),
                }))
            })
            .await;
        assert!(matches!(result, Err(AppError::Rpc(RpcError::JsonRpc { .. }))));
        assert_eq!(
            failover.active_endpoint(51).unwrap(),
            "https://rpc.apothem.network"
        );
    }

    #[tokio::test]
    async fn test_execute_unknown_chain() {
        let failover = failover(Arc::new(MockEndpointProbe::new()), 1);
        let result: Result<(), AppError> = failover.execute(1, |_url| async { Ok(()) }).await;
        assert_eq!(result, Err(AppError::UnsupportedNetwork(1)));
    }
}
