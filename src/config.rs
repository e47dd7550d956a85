//! Engine-wide configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::app::{NotifierConfig, PollerConfig, RecoveryConfig, SessionConfig, SwitchConfig};
use crate::infra::{FailoverConfig, HealthCheckConfig};

/// Configuration for every component owned by [`crate::app::SyncEngine`]
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub session: SessionConfig,
    pub switch: SwitchConfig,
    pub poller: PollerConfig,
    pub notifier: NotifierConfig,
    pub recovery: RecoveryConfig,
    pub failover: FailoverConfig,
    pub health: HealthCheckConfig,
    /// Timeout for contract reads over JSON-RPC
    pub rpc_timeout: Duration,
    /// Where persisted preferences live; in-memory when unset
    pub state_file: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            switch: SwitchConfig::default(),
            poller: PollerConfig::default(),
            notifier: NotifierConfig::default(),
            recovery: RecoveryConfig::default(),
            failover: FailoverConfig::default(),
            health: HealthCheckConfig::default(),
            rpc_timeout: Duration::from_secs(15),
            state_file: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        use std::env;

        let rpc_timeout_ms = env::var("VRF_DICE_RPC_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(15_000);

        let state_file = env::var("VRF_DICE_STATE_FILE")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        Self {
            session: SessionConfig::from_env(),
            switch: SwitchConfig::from_env(),
            poller: PollerConfig::from_env(),
            notifier: NotifierConfig::from_env(),
            recovery: RecoveryConfig::from_env(),
            failover: FailoverConfig::from_env(),
            health: HealthCheckConfig::from_env(),
            rpc_timeout: Duration::from_millis(rpc_timeout_ms),
            state_file,
        }
    }
}
