//! Probe every configured RPC endpoint and report which networks are reachable.
//!
//! Usage: `probe-endpoints [network-id-or-chain-id ...]`
//!
//! Exits non-zero when a probed network has no healthy endpoint. With
//! `PROBE_WATCH_SECS` set, probes repeatedly until Ctrl+C.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use vrf_dice_sync::config::EngineConfig;
use vrf_dice_sync::domain::NetworkConfig;
use vrf_dice_sync::infra::{HttpRpcHealthChecker, NetworkRegistry, RpcFailover};

/// Probe configuration
struct Config {
    engine: EngineConfig,
    /// Networks named on the command line; all networks when empty
    targets: Vec<String>,
    watch_interval: Option<Duration>,
}

impl Config {
    fn from_env() -> Self {
        let watch_interval = env::var("PROBE_WATCH_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Self {
            engine: EngineConfig::from_env(),
            targets: env::args().skip(1).collect(),
            watch_interval,
        }
    }

    fn select(&self, registry: &NetworkRegistry) -> Result<Vec<NetworkConfig>> {
        if self.targets.is_empty() {
            return Ok(registry.networks());
        }
        self.targets
            .iter()
            .map(|key| {
                registry
                    .resolve(key)
                    .with_context(|| format!("Unknown network '{key}'"))
            })
            .collect()
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn"));

    let json = env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

/// Probe the selected networks once. Returns the ids of networks with no
/// healthy endpoint.
async fn probe_round(failover: &RpcFailover, networks: &[NetworkConfig]) -> Vec<String> {
    let mut down = Vec::new();

    for network in networks {
        let results = match failover.probe_all(network.chain_id).await {
            Ok(results) => results,
            Err(e) => {
                error!(network = %network.id, error = %e, "Probe failed");
                down.push(network.id.clone());
                continue;
            }
        };

        for health in &results {
            if health.healthy {
                info!(
                    network = %network.id,
                    url = %health.url,
                    latency_ms = health.latency_ms,
                    block_number = health.block_number.unwrap_or_default(),
                    "Endpoint healthy"
                );
            } else {
                warn!(
                    network = %network.id,
                    url = %health.url,
                    latency_ms = health.latency_ms,
                    error = health.error.as_deref().unwrap_or("unknown"),
                    "Endpoint unhealthy"
                );
            }
        }

        let healthy = results.iter().filter(|h| h.healthy).count();
        if healthy == 0 {
            error!(network = %network.id, chain_id = network.chain_id, "No healthy endpoint");
            down.push(network.id.clone());
        } else {
            info!(
                network = %network.id,
                chain_id = network.chain_id,
                healthy = healthy,
                total = results.len(),
                "Network reachable"
            );
        }
    }

    down
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_tracing();

    let config = Config::from_env();
    let registry = Arc::new(NetworkRegistry::from_env().context("Invalid network configuration")?);
    let networks = config.select(&registry)?;

    let probe = Arc::new(
        HttpRpcHealthChecker::new(config.engine.health.clone())
            .context("Failed to build HTTP client")?,
    );
    let failover = RpcFailover::new(Arc::clone(&registry), probe, config.engine.failover.clone());

    info!(
        networks = networks.len(),
        timeout_ms = config.engine.health.timeout.as_millis() as u64,
        "Probing RPC endpoints"
    );

    let Some(interval) = config.watch_interval else {
        let down = probe_round(&failover, &networks).await;
        if !down.is_empty() {
            anyhow::bail!("No healthy endpoint for: {}", down.join(", "));
        }
        return Ok(());
    };

    let mut ticker = tokio::time::interval(interval);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let down = probe_round(&failover, &networks).await;
                if !down.is_empty() {
                    warn!(networks = %down.join(","), "Networks unreachable");
                }
            }
            _ = &mut shutdown => break,
        }
    }

    info!("Probe stopped");
    Ok(())
}
