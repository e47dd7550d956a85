//! Shared wiring for engine-level integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use vrf_dice_sync::app::SyncEngine;
use vrf_dice_sync::config::EngineConfig;
use vrf_dice_sync::domain::{SessionState, Severity, Toast, WalletProvider};
use vrf_dice_sync::infra::network::xdc_apothem;
use vrf_dice_sync::infra::{
    FailoverConfig, MemorySessionStore, NetworkRegistry, RpcFailover, StaticProviderDiscovery,
};
use vrf_dice_sync::test_utils::{
    MockContractBackend, MockEndpointProbe, MockGameContract, MockWalletProvider,
};

pub const ACCOUNT: &str = "0xaaaa000000000000000000000000000000000001";
pub const OTHER_ACCOUNT: &str = "0xbbbb000000000000000000000000000000000002";

pub struct Harness {
    pub engine: SyncEngine,
    pub wallet: Arc<MockWalletProvider>,
    pub backend: Arc<MockContractBackend>,
    pub store: Arc<MemorySessionStore>,
    pub discovery: Arc<StaticProviderDiscovery>,
}

impl Harness {
    pub fn new(wallet: MockWalletProvider) -> Self {
        Self::with_backend(wallet, MockContractBackend::deployed())
    }

    pub fn with_backend(wallet: MockWalletProvider, backend: MockContractBackend) -> Self {
        let registry = Arc::new(NetworkRegistry::builtin());
        let failover = Arc::new(RpcFailover::new(
            Arc::clone(&registry),
            Arc::new(MockEndpointProbe::new()),
            FailoverConfig::default(),
        ));
        let wallet = Arc::new(wallet);
        let backend = Arc::new(backend);
        let store = Arc::new(MemorySessionStore::new());
        let discovery = Arc::new(StaticProviderDiscovery::with_provider(
            Arc::clone(&wallet) as Arc<dyn WalletProvider>
        ));

        let engine = SyncEngine::new(
            EngineConfig::default(),
            registry,
            failover,
            discovery.clone(),
            backend.clone(),
            store.clone(),
        );

        Self {
            engine,
            wallet,
            backend,
            store,
            discovery,
        }
    }

    /// Game contract bound on Apothem
    pub fn apothem_game(&self) -> Arc<MockGameContract> {
        self.backend.game(51, &xdc_apothem().contracts.game)
    }

    pub fn session(&self) -> watch::Receiver<SessionState> {
        self.engine.subscribe_session()
    }

    pub fn toasts_with(&self, severity: Severity) -> Vec<Toast> {
        self.engine
            .toasts()
            .into_iter()
            .filter(|t| t.severity == severity)
            .collect()
    }
}

/// Wait (on the paused clock) until the session satisfies `predicate`
pub async fn wait_for_session(
    rx: &mut watch::Receiver<SessionState>,
    predicate: impl FnMut(&SessionState) -> bool,
) -> SessionState {
    tokio::time::timeout(Duration::from_secs(60), rx.wait_for(predicate))
        .await
        .expect("session never reached the expected state")
        .expect("session closed")
        .clone()
}

/// Let timers due within `duration` fire, then let woken tasks run
pub async fn settle(duration: Duration) {
    tokio::time::sleep(duration).await;
    tokio::task::yield_now().await;
}
