//! Wallet session state machine.
//!
//! [`SessionState`] is only ever replaced through [`transition`], a pure
//! reducer over [`SessionAction`]. Every mutation runs under one async mutex,
//! so user operations and provider events are applied one at a time in arrival
//! order, and each observes the state the previous one committed. The current
//! state is published through a `watch` channel.

use chrono::Utc;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, MutexGuard, watch};
use tracing::{debug, info, instrument, warn};

use super::contracts::ContractBindingFactory;
use super::network_switch::{NetworkSwitchCoordinator, SwitchOutcome};
use super::notifications::Notifier;
use super::subscription::Disposer;
use crate::domain::{
    AppError, ContractBindings, LoadingFlag, ProviderDiscovery, ProviderEvent, SessionMarker,
    SessionPhase, SessionState, SessionStore, Severity, WalletProvider,
};
use crate::infra::network::NetworkRegistry;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the wallet session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Markers younger than this trigger a silent reconnect
    pub reconnect_window: Duration,
    pub silent_connect_timeout: Duration,
    /// Full re-initializations attempted when a chain change cannot be bound
    pub reinit_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_window: Duration::from_secs(6 * 3600),
            silent_connect_timeout: Duration::from_secs(10),
            reinit_attempts: 1,
        }
    }
}

impl SessionConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        use std::env;

        let reconnect_window_secs = env::var("VRF_DICE_RECONNECT_WINDOW_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(6 * 3600);

        let silent_timeout_ms = env::var("VRF_DICE_SILENT_CONNECT_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10_000);

        let reinit_attempts = env::var("VRF_DICE_CHAIN_REINIT_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);

        Self {
            reconnect_window: Duration::from_secs(reconnect_window_secs),
            silent_connect_timeout: Duration::from_millis(silent_timeout_ms),
            reinit_attempts,
        }
    }
}

// ============================================================================
// TRANSITIONS
// ============================================================================

/// Inputs to the session reducer
#[derive(Clone)]
pub enum SessionAction {
    BeginConnect {
        provider: Arc<dyn WalletProvider>,
        silent: bool,
    },
    /// Connect rejected, failed before an account was known, or timed out
    ConnectAborted,
    AccountAttached {
        account: String,
        chain_id: u64,
    },
    ContractsBound(ContractBindings),
    AccountSwitched {
        account: String,
    },
    BeginSwitch,
    /// Chain, account and contracts committed together
    SwitchCommitted {
        chain_id: u64,
        account: String,
        contracts: Option<ContractBindings>,
    },
    /// Switch abandoned with the previous chain still active
    SwitchAborted,
    Failed {
        error: AppError,
        chain_id: Option<u64>,
    },
    Disconnected,
}

impl std::fmt::Debug for SessionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BeginConnect { silent, .. } => {
                f.debug_struct("BeginConnect").field("silent", silent).finish()
            }
            Self::ConnectAborted => f.write_str("ConnectAborted"),
            Self::AccountAttached { account, chain_id } => f
                .debug_struct("AccountAttached")
                .field("account", account)
                .field("chain_id", chain_id)
                .finish(),
            Self::ContractsBound(c) => f.debug_tuple("ContractsBound").field(c).finish(),
            Self::AccountSwitched { account } => f
                .debug_struct("AccountSwitched")
                .field("account", account)
                .finish(),
            Self::BeginSwitch => f.write_str("BeginSwitch"),
            Self::SwitchCommitted {
                chain_id, account, ..
            } => f
                .debug_struct("SwitchCommitted")
                .field("chain_id", chain_id)
                .field("account", account)
                .finish_non_exhaustive(),
            Self::SwitchAborted => f.write_str("SwitchAborted"),
            Self::Failed { error, chain_id } => f
                .debug_struct("Failed")
                .field("error", error)
                .field("chain_id", chain_id)
                .finish(),
            Self::Disconnected => f.write_str("Disconnected"),
        }
    }
}

/// Pure session reducer.
///
/// Contracts survive only while they are tagged with the committed chain and
/// account and that chain is in the registry.
pub fn transition(
    state: &SessionState,
    action: SessionAction,
    registry: &NetworkRegistry,
) -> SessionState {
    let mut next = match action {
        SessionAction::BeginConnect { provider, silent } => {
            let mut loading = std::collections::BTreeSet::new();
            loading.insert(if silent {
                LoadingFlag::Reconnecting
            } else {
                LoadingFlag::Connecting
            });
            loading.insert(LoadingFlag::RequestingAccounts);
            SessionState {
                phase: SessionPhase::Connecting,
                provider: Some(provider),
                loading,
                is_connecting: true,
                epoch: state.epoch + 1,
                ..SessionState::default()
            }
        }
        SessionAction::ConnectAborted => SessionState {
            phase: SessionPhase::Idle,
            epoch: state.epoch + 1,
            ..SessionState::default()
        },
        SessionAction::AccountAttached { account, chain_id } => {
            let mut next = state.clone();
            next.account = Some(account);
            next.chain_id = Some(chain_id);
            next.contracts = None;
            next.loading.remove(&LoadingFlag::RequestingAccounts);
            if registry.is_supported(chain_id) {
                next.loading.insert(LoadingFlag::BindingContracts);
            } else {
                finish_connect(&mut next);
            }
            next
        }
        SessionAction::ContractsBound(contracts) => {
            let mut next = state.clone();
            next.contracts = Some(contracts);
            next.loading.remove(&LoadingFlag::BindingContracts);
            finish_connect(&mut next);
            next
        }
        SessionAction::AccountSwitched { account } => {
            let mut next = state.clone();
            next.account = Some(account);
            next.contracts = None;
            if next.chain_id.is_some_and(|c| registry.is_supported(c)) {
                next.loading.insert(LoadingFlag::BindingContracts);
            }
            next
        }
        SessionAction::BeginSwitch => {
            let mut next = state.clone();
            next.phase = SessionPhase::SwitchingNetwork;
            next.loading.insert(LoadingFlag::SwitchingNetwork);
            next
        }
        SessionAction::SwitchCommitted {
            chain_id,
            account,
            contracts,
        } => {
            let mut next = state.clone();
            next.chain_id = Some(chain_id);
            next.account = Some(account);
            next.contracts = contracts;
            next.phase = SessionPhase::Connected;
            next.loading.remove(&LoadingFlag::SwitchingNetwork);
            next.loading.remove(&LoadingFlag::BindingContracts);
            next
        }
        SessionAction::SwitchAborted => {
            let mut next = state.clone();
            next.phase = if next.account.is_some() {
                SessionPhase::Connected
            } else {
                SessionPhase::Idle
            };
            next.loading.remove(&LoadingFlag::SwitchingNetwork);
            next
        }
        SessionAction::Failed { error, chain_id } => {
            let mut next = state.clone();
            if let Some(chain_id) = chain_id {
                next.chain_id = Some(chain_id);
            }
            if error.clears_contracts() {
                next.contracts = None;
            }
            next.phase = SessionPhase::Error(error.to_string());
            next.loading.clear();
            next.is_connecting = false;
            next
        }
        SessionAction::Disconnected => SessionState {
            phase: SessionPhase::Disconnected,
            epoch: state.epoch + 1,
            ..SessionState::default()
        },
    };

    let stale = next.contracts.as_ref().is_some_and(|c| {
        next.chain_id != Some(c.chain_id)
            || next.account.as_deref() != Some(c.account.as_str())
            || !registry.is_supported(c.chain_id)
    });
    if stale {
        next.contracts = None;
    }
    next
}

fn finish_connect(state: &mut SessionState) {
    state.phase = SessionPhase::Connected;
    state.is_connecting = false;
    state.loading.remove(&LoadingFlag::Connecting);
    state.loading.remove(&LoadingFlag::Reconnecting);
    state.loading.remove(&LoadingFlag::RequestingAccounts);
}

/// Chain the wallet is known to sit on after a failed switch or bind
fn committed_chain(error: &AppError) -> Option<u64> {
    match error {
        AppError::ContractBindingFailed { chain_id, .. } => Some(*chain_id),
        _ => None,
    }
}

// ============================================================================
// SESSION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectMode {
    /// User initiated: may prompt, failures are announced
    Interactive,
    /// Reconnect on load: `eth_accounts` only, failures stay quiet
    Silent,
}

type TransitionGuard<'a> = MutexGuard<'a, ()>;

/// Owner of the live wallet connection
pub struct WalletSession {
    registry: Arc<NetworkRegistry>,
    discovery: Arc<dyn ProviderDiscovery>,
    factory: Arc<ContractBindingFactory>,
    coordinator: Arc<NetworkSwitchCoordinator>,
    store: Arc<dyn SessionStore>,
    notifier: Arc<Notifier>,
    config: SessionConfig,
    state: watch::Sender<SessionState>,
    transition_lock: Mutex<()>,
    listener: Disposer,
    weak: Weak<WalletSession>,
}

impl WalletSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<NetworkRegistry>,
        discovery: Arc<dyn ProviderDiscovery>,
        factory: Arc<ContractBindingFactory>,
        coordinator: Arc<NetworkSwitchCoordinator>,
        store: Arc<dyn SessionStore>,
        notifier: Arc<Notifier>,
        config: SessionConfig,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(SessionState::default());
        Arc::new_cyclic(|weak| Self {
            registry,
            discovery,
            factory,
            coordinator,
            store,
            notifier,
            config,
            state,
            transition_lock: Mutex::new(()),
            listener: Disposer::new(),
            weak: weak.clone(),
        })
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn account(&self) -> Option<String> {
        self.state.borrow().account.clone()
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.state.borrow().chain_id
    }

    pub fn contracts(&self) -> Option<ContractBindings> {
        self.state.borrow().contracts.clone()
    }

    fn apply(&self, _guard: &TransitionGuard<'_>, action: SessionAction) -> SessionState {
        let current = self.state.borrow().clone();
        debug!(action = ?action, phase = %current.phase, "Session transition");
        let next = transition(&current, action, &self.registry);

        if current.contracts.is_some() && next.contracts.is_none() {
            debug!(chain_id = ?next.chain_id, "Contracts cleared");
        }
        if current.phase != next.phase {
            info!(from = %current.phase, to = %next.phase, "Session phase changed");
        }
        self.state.send_replace(next.clone());
        next
    }

    // ------------------------------------------------------------------------
    // Connect / disconnect
    // ------------------------------------------------------------------------

    /// Connect to the discovered provider, prompting for account access
    #[instrument(skip(self))]
    pub async fn connect(&self) -> Result<SessionState, AppError> {
        let guard = self.transition_lock.lock().await;
        let Some(provider) = self.discovery.discover() else {
            let err = AppError::ProviderUnavailable;
            warn!("Connect requested without a wallet provider");
            self.notifier.notify_error(&err);
            return Err(err);
        };
        self.connect_locked(&guard, provider, ConnectMode::Interactive)
            .await
    }

    /// Silently restore a recent session. Returns true when an account was attached.
    #[instrument(skip(self))]
    pub async fn reconnect_on_load(&self) -> bool {
        let marker = match self.store.load_marker().await {
            Ok(marker) => marker,
            Err(e) => {
                warn!(error = %e, "Failed to read session marker");
                None
            }
        };
        let Some(marker) = marker else {
            return false;
        };
        if !marker.is_fresh(Utc::now(), self.config.reconnect_window) {
            debug!(account = %marker.account, "Session marker expired");
            if let Err(e) = self.store.clear_marker().await {
                warn!(error = %e, "Failed to clear expired session marker");
            }
            return false;
        }
        let Some(provider) = self.discovery.discover() else {
            debug!("No provider for silent reconnect");
            return false;
        };

        let guard = self.transition_lock.lock().await;
        let attempt = tokio::time::timeout(
            self.config.silent_connect_timeout,
            self.connect_locked(&guard, provider, ConnectMode::Silent),
        )
        .await;

        match attempt {
            Ok(Ok(state)) => state.account.is_some(),
            Ok(Err(e)) => {
                debug!(error = %e, "Silent reconnect failed");
                self.state.borrow().account.is_some()
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.config.silent_connect_timeout.as_millis() as u64,
                    "Silent reconnect timed out"
                );
                self.listener.dispose();
                self.apply(&guard, SessionAction::ConnectAborted);
                false
            }
        }
    }

    async fn connect_locked(
        &self,
        guard: &TransitionGuard<'_>,
        provider: Arc<dyn WalletProvider>,
        mode: ConnectMode,
    ) -> Result<SessionState, AppError> {
        let interactive = mode == ConnectMode::Interactive;
        self.listener.dispose();
        self.apply(
            guard,
            SessionAction::BeginConnect {
                provider: Arc::clone(&provider),
                silent: !interactive,
            },
        );

        let accounts = if interactive {
            provider.request_accounts().await
        } else {
            provider.accounts().await
        };
        let accounts = match accounts {
            Ok(accounts) => accounts,
            Err(e) => {
                let err = AppError::from_provider(e);
                self.apply(guard, SessionAction::ConnectAborted);
                if interactive {
                    if err == AppError::UserRejected {
                        warn!("Account access rejected");
                    } else {
                        warn!(error = %err, "Account request failed");
                    }
                    self.notifier.notify_error(&err);
                }
                return Err(err);
            }
        };

        let Some(account) = accounts.into_iter().next() else {
            self.apply(guard, SessionAction::ConnectAborted);
            if interactive {
                self.notifier.notify_error(&AppError::NoAccounts);
            }
            return Err(AppError::NoAccounts);
        };

        let chain_id = match provider.chain_id().await {
            Ok(chain_id) => chain_id,
            Err(e) => {
                let err = AppError::from_provider(e);
                self.apply(guard, SessionAction::ConnectAborted);
                if interactive {
                    self.notifier.notify_error(&err);
                }
                return Err(err);
            }
        };

        self.apply(
            guard,
            SessionAction::AccountAttached {
                account: account.clone(),
                chain_id,
            },
        );
        self.spawn_listener(&provider);
        if let Err(e) = self.store.save_marker(&SessionMarker::new(&account)).await {
            warn!(error = %e, "Failed to persist session marker");
        }

        if !self.registry.is_supported(chain_id) {
            warn!(chain_id = chain_id, account = %account, "Connected on unsupported network");
            self.notifier
                .notify_error(&AppError::UnsupportedNetwork(chain_id));
            return Ok(self.state());
        }

        match self.factory.bind(chain_id, &account).await {
            Ok(contracts) => {
                let state = self.apply(guard, SessionAction::ContractsBound(contracts));
                info!(chain_id = chain_id, account = %account, "Wallet connected");
                Ok(state)
            }
            Err(e) => {
                warn!(chain_id = chain_id, error = %e, "Contract binding failed");
                self.apply(
                    guard,
                    SessionAction::Failed {
                        error: e.clone(),
                        chain_id: None,
                    },
                );
                if interactive {
                    self.notifier.notify_error(&e);
                }
                Err(e)
            }
        }
    }

    /// Drop the connection and forget the session marker
    #[instrument(skip(self))]
    pub async fn disconnect(&self) {
        let guard = self.transition_lock.lock().await;
        self.listener.dispose();
        self.apply(&guard, SessionAction::Disconnected);
        if let Err(e) = self.store.clear_marker().await {
            warn!(error = %e, "Failed to clear session marker");
        }
        info!("Wallet disconnected");
    }

    /// Stop listening to provider events without changing state
    pub fn dispose(&self) {
        self.listener.dispose();
    }

    // ------------------------------------------------------------------------
    // Network switching
    // ------------------------------------------------------------------------

    /// Ask the wallet to move to `target` and rebind contracts there
    #[instrument(skip(self))]
    pub async fn switch_network(&self, target: u64) -> Result<SwitchOutcome, AppError> {
        let guard = self.transition_lock.lock().await;
        let state = self.state();
        let provider = state.provider.clone().ok_or(AppError::ProviderUnavailable)?;
        let account = state.account.clone().ok_or(AppError::NoAccounts)?;

        let Some(network) = self.registry.get(target) else {
            let err = AppError::UnsupportedNetwork(target);
            self.notifier.notify_error(&err);
            return Err(err);
        };

        self.apply(&guard, SessionAction::BeginSwitch);
        let result = self
            .coordinator
            .switch(&provider, target, &account, state.contracts.as_ref())
            .await;

        match result {
            Ok(outcome) => {
                self.commit(&guard, &outcome);
                if let Err(e) = self.store.set_preferred_network(&network.id).await {
                    warn!(error = %e, "Failed to persist preferred network");
                }
                if matches!(outcome, SwitchOutcome::Switched { .. }) {
                    self.notifier.notify(
                        format!("Switched to {}", network.display_name),
                        Severity::Success,
                        None,
                    );
                }
                Ok(outcome)
            }
            Err(e) if !e.clears_contracts() => {
                // The previous chain and bindings are still valid
                warn!(chain_id = target, error = %e, "Network switch aborted");
                self.apply(&guard, SessionAction::SwitchAborted);
                self.notifier.notify_error(&e);
                Err(e)
            }
            Err(e) => {
                warn!(chain_id = target, error = %e, "Network switch failed");
                self.apply(
                    &guard,
                    SessionAction::Failed {
                        error: e.clone(),
                        chain_id: committed_chain(&e),
                    },
                );
                if matches!(e, AppError::NetworkSwitchTimeout { .. }) {
                    // Stays until dismissed: the user has to act in the wallet
                    self.notifier
                        .notify(e.user_message(), e.severity(), Some(Duration::ZERO));
                } else {
                    self.notifier.notify_error(&e);
                }
                Err(e)
            }
        }
    }

    /// Switch by network id or chain id string
    pub async fn switch_network_to(&self, network: &str) -> Result<SwitchOutcome, AppError> {
        let chain_id = self
            .registry
            .resolve(network)
            .map(|n| n.chain_id)
            .ok_or_else(|| AppError::NotSupported(format!("unknown network {network}")))?;
        self.switch_network(chain_id).await
    }

    fn commit(&self, guard: &TransitionGuard<'_>, outcome: &SwitchOutcome) {
        let contracts = outcome.contracts().cloned();
        let unsupported = contracts.is_none();
        self.apply(
            guard,
            SessionAction::SwitchCommitted {
                chain_id: outcome.chain_id(),
                account: outcome.account().to_string(),
                contracts,
            },
        );
        if unsupported {
            warn!(chain_id = outcome.chain_id(), "Wallet moved to unsupported network");
            self.notifier
                .notify_error(&AppError::UnsupportedNetwork(outcome.chain_id()));
        }
    }

    // ------------------------------------------------------------------------
    // Provider events
    // ------------------------------------------------------------------------

    /// Apply a provider event to the current session
    pub async fn handle_event(&self, event: ProviderEvent) {
        let epoch = self.state.borrow().epoch;
        self.on_provider_event(epoch, event).await;
    }

    fn spawn_listener(&self, provider: &Arc<dyn WalletProvider>) {
        let mut events = provider.subscribe();
        let epoch = self.state.borrow().epoch;
        let weak = self.weak.clone();

        let handle = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let Some(session) = weak.upgrade() else {
                            break;
                        };
                        session.on_provider_event(epoch, event).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped = skipped, "Provider events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        self.listener.track(handle);
    }

    #[instrument(skip(self))]
    async fn on_provider_event(&self, epoch: u64, event: ProviderEvent) {
        let guard = self.transition_lock.lock().await;
        if self.state.borrow().epoch != epoch {
            debug!("Ignoring event from a previous session");
            return;
        }

        match event {
            ProviderEvent::AccountsChanged(accounts) => {
                self.on_accounts_changed(&guard, accounts).await;
            }
            ProviderEvent::ChainChanged(chain_id) => {
                self.on_chain_changed(&guard, chain_id).await;
            }
            ProviderEvent::Disconnect(reason) => {
                warn!(reason = %reason, "Provider disconnected");
                self.apply(&guard, SessionAction::Disconnected);
                self.notifier
                    .notify("Wallet disconnected", Severity::Warning, None);
                // May abort the task running this handler; nothing awaits after it
                self.listener.dispose();
            }
        }
    }

    async fn on_accounts_changed(&self, guard: &TransitionGuard<'_>, accounts: Vec<String>) {
        let Some(account) = accounts.into_iter().next() else {
            info!("Wallet locked or all accounts disconnected");
            self.apply(guard, SessionAction::Disconnected);
            if let Err(e) = self.store.clear_marker().await {
                warn!(error = %e, "Failed to clear session marker");
            }
            self.notifier
                .notify("Wallet disconnected", Severity::Warning, None);
            self.listener.dispose();
            return;
        };

        let state = self.state();
        if state.account.as_deref() == Some(account.as_str()) {
            return;
        }

        info!(account = %account, "Account changed");
        self.apply(
            guard,
            SessionAction::AccountSwitched {
                account: account.clone(),
            },
        );
        if let Err(e) = self.store.save_marker(&SessionMarker::new(&account)).await {
            warn!(error = %e, "Failed to persist session marker");
        }

        let Some(chain_id) = state.chain_id.filter(|c| self.registry.is_supported(*c)) else {
            return;
        };
        match self.factory.bind(chain_id, &account).await {
            Ok(contracts) => {
                self.apply(guard, SessionAction::ContractsBound(contracts));
            }
            Err(e) => {
                warn!(chain_id = chain_id, error = %e, "Rebinding for new account failed");
                self.apply(
                    guard,
                    SessionAction::Failed {
                        error: e.clone(),
                        chain_id: None,
                    },
                );
                self.notifier.notify_error(&e);
            }
        }
    }

    async fn on_chain_changed(&self, guard: &TransitionGuard<'_>, chain_id: u64) {
        let state = self.state();
        let settled = state.has_live_contracts() || !self.registry.is_supported(chain_id);
        if state.chain_id == Some(chain_id) && settled {
            debug!(chain_id = chain_id, "Chain already committed");
            return;
        }
        let Some(account) = state.account.clone() else {
            return;
        };

        info!(from = ?state.chain_id, to = chain_id, "Chain changed in wallet");
        self.apply(guard, SessionAction::BeginSwitch);

        let mut result = self.coordinator.reconcile(chain_id, &account).await;
        let mut attempt = 0;
        while let Err(e) = &result {
            if attempt >= self.config.reinit_attempts {
                break;
            }
            attempt += 1;
            warn!(error = %e, attempt = attempt, "Chain change could not be bound, re-initializing");
            result = self.reinitialize(&state).await;
        }

        match result {
            Ok(outcome) => self.commit(guard, &outcome),
            Err(e) => {
                warn!(chain_id = chain_id, error = %e, "Session degraded after chain change");
                self.apply(
                    guard,
                    SessionAction::Failed {
                        error: e.clone(),
                        chain_id: committed_chain(&e).or(Some(chain_id)),
                    },
                );
                self.notifier.notify_error(&e);
            }
        }
    }

    /// Re-read account and chain from the provider and bind from scratch
    async fn reinitialize(&self, state: &SessionState) -> Result<SwitchOutcome, AppError> {
        let provider = state
            .provider
            .clone()
            .ok_or(AppError::ProviderUnavailable)?;
        let account = provider
            .accounts()
            .await
            .map_err(AppError::from_provider)?
            .into_iter()
            .next()
            .ok_or(AppError::NoAccounts)?;
        let chain_id = provider.chain_id().await.map_err(AppError::from_provider)?;
        self.coordinator.reconcile(chain_id, &account).await
    }
}

impl Drop for WalletSession {
    fn drop(&mut self) {
        self.listener.dispose();
    }
}
