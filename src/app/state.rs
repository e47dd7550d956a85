//! Engine facade wiring every component together.

use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::contracts::ContractBindingFactory;
use super::network_switch::{NetworkSwitchCoordinator, SwitchOutcome};
use super::notifications::Notifier;
use super::poller::{GameStatusPoller, GameView};
use super::recovery::{RecoveryStatus, RecoveryTracker};
use super::session::WalletSession;
use super::subscription::Disposer;
use crate::config::EngineConfig;
use crate::domain::{
    AppError, ContractBackend, EndpointHealth, NetworkConfig, ProviderDiscovery, SessionState,
    SessionStore, Toast, WalletProvider,
};
use crate::infra::{
    EvmContractBackend, HttpRpcHealthChecker, JsonFileSessionStore, JsonRpcHttpClient,
    MemorySessionStore, NetworkRegistry, ProxyWalletConfig, ProxyWalletProvider, RpcFailover,
    StaticProviderDiscovery,
};

/// Health of every endpoint of one network
#[derive(Debug, Clone)]
pub struct NetworkHealthReport {
    pub network: NetworkConfig,
    pub endpoints: Vec<EndpointHealth>,
}

impl NetworkHealthReport {
    pub fn has_healthy_endpoint(&self) -> bool {
        self.endpoints.iter().any(|e| e.healthy)
    }
}

/// Client state-synchronization engine
pub struct SyncEngine {
    config: EngineConfig,
    registry: Arc<NetworkRegistry>,
    failover: Arc<RpcFailover>,
    store: Arc<dyn SessionStore>,
    notifier: Arc<Notifier>,
    tracker: RecoveryTracker,
    session: Arc<WalletSession>,
    poller: Mutex<Option<Arc<GameStatusPoller>>>,
    background: Disposer,
}

impl SyncEngine {
    /// Wire the engine from its collaborators
    #[must_use]
    pub fn new(
        config: EngineConfig,
        registry: Arc<NetworkRegistry>,
        failover: Arc<RpcFailover>,
        discovery: Arc<dyn ProviderDiscovery>,
        backend: Arc<dyn ContractBackend>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let notifier = Notifier::new(config.notifier.clone());
        let factory = Arc::new(ContractBindingFactory::new(Arc::clone(&registry), backend));
        let coordinator = Arc::new(NetworkSwitchCoordinator::new(
            Arc::clone(&registry),
            Arc::clone(&factory),
            config.switch.clone(),
        ));
        let session = WalletSession::new(
            Arc::clone(&registry),
            discovery,
            factory,
            coordinator,
            Arc::clone(&store),
            Arc::clone(&notifier),
            config.session.clone(),
        );

        Self {
            tracker: RecoveryTracker::new(config.recovery.clone()),
            config,
            registry,
            failover,
            store,
            notifier,
            session,
            poller: Mutex::new(None),
            background: Disposer::new(),
        }
    }

    /// Build the engine from `VRF_DICE_*` environment variables.
    ///
    /// When a wallet bridge is configured its provider is installed for
    /// discovery and its event watcher runs until [`SyncEngine::shutdown`].
    /// Must be called within a tokio runtime.
    pub fn from_env() -> Result<Self, AppError> {
        let config = EngineConfig::from_env();
        let registry = Arc::new(NetworkRegistry::from_env()?);

        let probe = Arc::new(HttpRpcHealthChecker::new(config.health.clone())?);
        let failover = Arc::new(RpcFailover::new(
            Arc::clone(&registry),
            probe,
            config.failover.clone(),
        ));
        let client = JsonRpcHttpClient::new(config.rpc_timeout)?;
        let backend = Arc::new(EvmContractBackend::new(Arc::clone(&failover), client));

        let store: Arc<dyn SessionStore> = match &config.state_file {
            Some(path) => Arc::new(JsonFileSessionStore::new(path)),
            None => Arc::new(MemorySessionStore::new()),
        };

        let discovery = StaticProviderDiscovery::new();
        let mut watcher = None;
        if let Some(bridge) = ProxyWalletConfig::from_env() {
            info!(bridge_url = %bridge.bridge_url, "Using wallet bridge");
            let provider = Arc::new(ProxyWalletProvider::new(bridge)?);
            watcher = Some(provider.spawn_event_watcher());
            discovery.install(provider as Arc<dyn WalletProvider>);
        }

        let engine = Self::new(
            config,
            registry,
            failover,
            Arc::new(discovery),
            backend,
            store,
        );
        if let Some(handle) = watcher {
            engine.background.track(handle);
        }
        Ok(engine)
    }

    /// Restore persisted preferences, start polling and try a silent reconnect.
    /// Returns true when a previous session was restored.
    #[instrument(skip(self))]
    pub async fn start(&self) -> bool {
        self.restore_rpc_overrides().await;

        {
            let mut poller = self.poller.lock().unwrap_or_else(PoisonError::into_inner);
            if poller.is_none() {
                *poller = Some(Arc::new(GameStatusPoller::spawn(
                    self.session.subscribe(),
                    self.tracker.clone(),
                    self.config.poller.clone(),
                )));
            }
        }

        let restored = self.session.reconnect_on_load().await;
        info!(restored = restored, "Engine started");
        restored
    }

    /// Stop the poller, listeners and timers
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        let poller = self
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(poller) = poller {
            poller.shutdown().await;
        }
        self.session.dispose();
        self.background.dispose();
        self.notifier.clear();
        info!("Engine stopped");
    }

    async fn restore_rpc_overrides(&self) {
        for network in self.registry.networks() {
            match self.store.rpc_override(&network.id).await {
                Ok(Some(url)) => {
                    if let Err(e) = self.registry.apply_rpc_override(&network.id, &url) {
                        warn!(network = %network.id, error = %e, "Ignoring stored RPC override");
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(network = %network.id, error = %e, "Failed to read RPC override"),
            }
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<NetworkRegistry> {
        &self.registry
    }

    pub fn session(&self) -> &Arc<WalletSession> {
        &self.session
    }

    pub fn notifier(&self) -> &Arc<Notifier> {
        &self.notifier
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn subscribe_session(&self) -> watch::Receiver<SessionState> {
        self.session.subscribe()
    }

    fn poller(&self) -> Option<Arc<GameStatusPoller>> {
        self.poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Latest game view, `None` before the first cycle for the current session
    pub fn game_view(&self) -> Option<Arc<GameView>> {
        self.poller().and_then(|p| p.current())
    }

    pub fn subscribe_game(&self) -> Option<watch::Receiver<Option<Arc<GameView>>>> {
        self.poller().map(|p| p.subscribe())
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.notifier.toasts()
    }

    pub fn dismiss_toast(&self, id: Uuid) -> bool {
        self.notifier.dismiss(id)
    }

    // ------------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------------

    pub async fn connect(&self) -> Result<SessionState, AppError> {
        self.session.connect().await
    }

    pub async fn disconnect(&self) {
        self.session.disconnect().await;
    }

    pub async fn switch_network(&self, chain_id: u64) -> Result<SwitchOutcome, AppError> {
        self.session.switch_network(chain_id).await
    }

    /// Switch to the stored preferred network, if one is set
    pub async fn switch_to_preferred(&self) -> Result<Option<SwitchOutcome>, AppError> {
        let Some(id) = self.store.preferred_network().await? else {
            return Ok(None);
        };
        self.session.switch_network_to(&id).await.map(Some)
    }

    /// Force a poll cycle now, e.g. right after a bet is placed
    pub async fn refresh(&self) -> Option<Arc<GameView>> {
        match self.poller() {
            Some(poller) => poller.refresh().await,
            None => None,
        }
    }

    /// Recovery status for the latest snapshot, evaluated at the current time
    pub fn recovery_status(&self) -> Option<RecoveryStatus> {
        let view = self.game_view()?;
        let snapshot = view.snapshot.as_ref()?;
        Some(self.tracker.evaluate(snapshot, Utc::now()))
    }

    /// Gate for the self-recovery write
    pub fn ensure_can_recover(&self) -> Result<RecoveryStatus, AppError> {
        let snapshot = self
            .game_view()
            .and_then(|v| v.snapshot.clone())
            .ok_or_else(|| AppError::NotSupported("no game status loaded".to_string()))?;
        self.tracker.ensure_can_recover(&snapshot, Utc::now())
    }

    /// Set or clear the user RPC endpoint for a network and persist it
    #[instrument(skip(self))]
    pub async fn set_rpc_override(
        &self,
        network_id: &str,
        url: Option<&str>,
    ) -> Result<(), AppError> {
        match url {
            Some(url) => self.registry.apply_rpc_override(network_id, url)?,
            None => self.registry.clear_rpc_override(network_id),
        }
        self.store.set_rpc_override(network_id, url).await
    }

    /// Probe every endpoint of every network. A network whose endpoints are
    /// all down is announced.
    pub async fn probe_endpoints(&self) -> Vec<NetworkHealthReport> {
        let mut reports = Vec::new();
        for network in self.registry.networks() {
            let endpoints = match self.failover.probe_all(network.chain_id).await {
                Ok(endpoints) => endpoints,
                Err(e) => {
                    warn!(network = %network.id, error = %e, "Endpoint probe failed");
                    Vec::new()
                }
            };
            let report = NetworkHealthReport { network, endpoints };
            if !report.has_healthy_endpoint() {
                self.notifier.notify_error(&AppError::RpcUnhealthy {
                    chain_id: report.network.chain_id,
                    reason: "no endpoint answered".to_string(),
                });
            }
            reports.push(report);
        }
        reports
    }
}
