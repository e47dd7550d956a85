//! EIP-1193 provider backed by an HTTP wallet bridge.
//!
//! Requests are forwarded as JSON-RPC 2.0 to the bridge. The bridge has no
//! push channel, so `accountsChanged` / `chainChanged` / `disconnect` are
//! synthesized by a watcher task that polls `eth_accounts` and `eth_chainId`.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::{
    AppError, ProviderError, ProviderEvent, RpcError, WalletProvider,
    types::{normalize_address, parse_chain_id},
};
use crate::infra::rpc::JsonRpcHttpClient;

/// EIP-1193 "provider is disconnected from all chains"
pub const DISCONNECTED_CODE: i64 = 4900;

/// Generic internal error (JSON-RPC)
const INTERNAL_ERROR_CODE: i64 = -32603;

const EVENT_CAPACITY: usize = 64;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the wallet bridge provider
#[derive(Debug, Clone)]
pub struct ProxyWalletConfig {
    pub bridge_url: String,
    /// Per-request timeout; user prompts can take a while
    pub request_timeout: Duration,
    /// How often the watcher polls accounts and chain
    pub watch_interval: Duration,
}

impl Default for ProxyWalletConfig {
    fn default() -> Self {
        Self {
            bridge_url: "http://127.0.0.1:8545".to_string(),
            request_timeout: Duration::from_secs(120),
            watch_interval: Duration::from_secs(1),
        }
    }
}

impl ProxyWalletConfig {
    /// Load configuration from environment variables.
    /// Returns `None` when `VRF_DICE_WALLET_BRIDGE_URL` is unset.
    pub fn from_env() -> Option<Self> {
        use std::env;

        let bridge_url = env::var("VRF_DICE_WALLET_BRIDGE_URL")
            .ok()
            .filter(|u| !u.trim().is_empty())?;

        let request_timeout_secs = env::var("VRF_DICE_WALLET_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(120);

        let watch_interval_ms = env::var("VRF_DICE_WALLET_WATCH_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1_000);

        Some(Self {
            bridge_url: bridge_url.trim().to_string(),
            request_timeout: Duration::from_secs(request_timeout_secs),
            watch_interval: Duration::from_millis(watch_interval_ms),
        })
    }
}

// ============================================================================
// PROVIDER
// ============================================================================

#[derive(Debug, Default)]
struct Observed {
    accounts: Option<Vec<String>>,
    chain_id: Option<u64>,
    reachable: bool,
}

/// Wallet provider forwarding to an HTTP bridge
pub struct ProxyWalletProvider {
    config: ProxyWalletConfig,
    client: JsonRpcHttpClient,
    events: broadcast::Sender<ProviderEvent>,
    observed: Mutex<Observed>,
}

impl ProxyWalletProvider {
    pub fn new(config: ProxyWalletConfig) -> Result<Self, AppError> {
        let client = JsonRpcHttpClient::new(config.request_timeout)?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        info!(bridge_url = %config.bridge_url, "Wallet bridge provider created");
        Ok(Self {
            config,
            client,
            events,
            observed: Mutex::new(Observed::default()),
        })
    }

    pub fn config(&self) -> &ProxyWalletConfig {
        &self.config
    }

    /// Spawn the task that turns polled state changes into provider events.
    /// The task holds only a weak reference and exits once the provider is dropped.
    pub fn spawn_event_watcher(self: &Arc<Self>) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        let interval = self.config.watch_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(provider) = weak.upgrade() else {
                    debug!("Wallet bridge dropped, stopping event watcher");
                    break;
                };
                provider.watch_once().await;
            }
        })
    }

    /// One watcher step: read accounts and chain, emit events for changes
    async fn watch_once(&self) {
        let accounts = self.accounts().await;
        let chain_id = self.chain_id().await;

        let (accounts, chain_id) = match (accounts, chain_id) {
            (Ok(accounts), Ok(chain_id)) => (accounts, chain_id),
            (Err(e), _) | (_, Err(e)) => {
                let was_reachable = {
                    let mut observed = self.lock_observed();
                    std::mem::replace(&mut observed.reachable, false)
                };
                if was_reachable && e.code == DISCONNECTED_CODE {
                    warn!(error = %e, "Wallet bridge unreachable");
                    let _ = self.events.send(ProviderEvent::Disconnect(e.message));
                }
                return;
            }
        };

        let mut pending = Vec::new();
        {
            let mut observed = self.lock_observed();
            observed.reachable = true;
            if let Some(previous) = &observed.accounts {
                if *previous != accounts {
                    pending.push(ProviderEvent::AccountsChanged(accounts.clone()));
                }
            }
            if let Some(previous) = observed.chain_id {
                if previous != chain_id {
                    pending.push(ProviderEvent::ChainChanged(chain_id));
                }
            }
            observed.accounts = Some(accounts);
            observed.chain_id = Some(chain_id);
        }

        for event in pending {
            debug!(event = ?event, "Synthesized provider event");
            // No receivers is fine
            let _ = self.events.send(event);
        }
    }

    fn lock_observed(&self) -> std::sync::MutexGuard<'_, Observed> {
        self.observed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Keep the watcher's view in step with answers the caller already saw,
    /// so a request's own result is not echoed back as an event.
    fn observe_response(&self, method: &str, result: &Value) {
        match method {
            "eth_accounts" | "eth_requestAccounts" => {
                if let Ok(accounts) = serde_json::from_value::<Vec<String>>(result.clone()) {
                    let mut observed = self.lock_observed();
                    if observed.accounts.is_none() {
                        observed.accounts =
                            Some(accounts.iter().map(|a| normalize_address(a)).collect());
                    }
                }
            }
            "eth_chainId" => {
                if let Some(chain_id) = result.as_str().and_then(parse_chain_id) {
                    let mut observed = self.lock_observed();
                    if observed.chain_id.is_none() {
                        observed.chain_id = Some(chain_id);
                    }
                }
            }
            _ => {}
        }
    }
}

fn to_provider_error(err: AppError) -> ProviderError {
    match err {
        AppError::Rpc(RpcError::JsonRpc { code, message }) => ProviderError::new(code, message),
        AppError::Rpc(RpcError::Connection(message) | RpcError::Timeout(message)) => {
            ProviderError::new(DISCONNECTED_CODE, message)
        }
        AppError::Rpc(RpcError::HttpStatus(status)) => {
            ProviderError::new(DISCONNECTED_CODE, format!("bridge returned HTTP {status}"))
        }
        other => ProviderError::new(INTERNAL_ERROR_CODE, other.to_string()),
    }
}

#[async_trait]
impl WalletProvider for ProxyWalletProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let params = if params.is_null() { json!([]) } else { params };
        let result = self
            .client
            .call(&self.config.bridge_url, method, params)
            .await
            .map_err(to_provider_error)?;
        self.observe_response(method, &result);
        Ok(result)
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}
