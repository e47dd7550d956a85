//! Network switch coordinator.
//!
//! Drives a chain switch through the wallet and reports back a committed
//! (chain, account, contracts) triple. The coordinator never touches session
//! state itself; the session applies the outcome atomically.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, instrument, warn};

use super::contracts::ContractBindingFactory;
use crate::domain::{AppError, ContractBindings, ProviderEvent, WalletProvider};
use crate::infra::network::NetworkRegistry;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for network switching
#[derive(Debug, Clone)]
pub struct SwitchConfig {
    /// Upper bound on the whole switch, wallet prompt included
    pub confirmation_timeout: Duration,
    /// `eth_chainId` poll raced against the `chainChanged` event
    pub poll_interval: Duration,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout: Duration::from_secs(15),
            poll_interval: Duration::from_secs(1),
        }
    }
}

impl SwitchConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        use std::env;

        let timeout_secs = env::var("VRF_DICE_SWITCH_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(15);

        let poll_ms = env::var("VRF_DICE_SWITCH_POLL_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1_000);

        Self {
            confirmation_timeout: Duration::from_secs(timeout_secs),
            poll_interval: Duration::from_millis(poll_ms),
        }
    }
}

/// Result of a switch or reconciliation
#[derive(Debug, Clone)]
pub enum SwitchOutcome {
    /// Wallet was already on the target; no prompt was shown
    AlreadyActive(ContractBindings),
    Switched {
        chain_id: u64,
        account: String,
        contracts: ContractBindings,
    },
    /// Wallet sits on a chain outside the registry
    Unsupported { chain_id: u64, account: String },
}

impl SwitchOutcome {
    pub fn chain_id(&self) -> u64 {
        match self {
            Self::AlreadyActive(contracts) => contracts.chain_id,
            Self::Switched { chain_id, .. } | Self::Unsupported { chain_id, .. } => *chain_id,
        }
    }

    pub fn account(&self) -> &str {
        match self {
            Self::AlreadyActive(contracts) => &contracts.account,
            Self::Switched { account, .. } | Self::Unsupported { account, .. } => account,
        }
    }

    pub fn contracts(&self) -> Option<&ContractBindings> {
        match self {
            Self::AlreadyActive(contracts) | Self::Switched { contracts, .. } => Some(contracts),
            Self::Unsupported { .. } => None,
        }
    }
}

// ============================================================================
// COORDINATOR
// ============================================================================

/// Switches the wallet's chain and rebuilds bindings for it
pub struct NetworkSwitchCoordinator {
    registry: Arc<NetworkRegistry>,
    factory: Arc<ContractBindingFactory>,
    config: SwitchConfig,
}

impl NetworkSwitchCoordinator {
    #[must_use]
    pub fn new(
        registry: Arc<NetworkRegistry>,
        factory: Arc<ContractBindingFactory>,
        config: SwitchConfig,
    ) -> Self {
        Self {
            registry,
            factory,
            config,
        }
    }

    pub fn config(&self) -> &SwitchConfig {
        &self.config
    }

    /// Switch the wallet to `target` and bind contracts there.
    ///
    /// `current` are the bindings the session holds right now, reused when the
    /// wallet is already on the target.
    #[instrument(skip(self, provider, current), fields(target = target))]
    pub async fn switch(
        &self,
        provider: &Arc<dyn WalletProvider>,
        target: u64,
        account: &str,
        current: Option<&ContractBindings>,
    ) -> Result<SwitchOutcome, AppError> {
        let network = self
            .registry
            .get(target)
            .ok_or(AppError::UnsupportedNetwork(target))?;

        let live_chain = provider.chain_id().await.map_err(AppError::from_provider)?;
        if live_chain == target {
            if let Some(contracts) = current.filter(|c| c.chain_id == target && c.account == account)
            {
                debug!("Already on target network");
                return Ok(SwitchOutcome::AlreadyActive(contracts.clone()));
            }
            let contracts = self.factory.bind(target, account).await?;
            return Ok(SwitchOutcome::AlreadyActive(contracts));
        }

        // Subscribe before prompting so a fast chainChanged is not missed
        let mut events = provider.subscribe();
        let timeout = self.config.confirmation_timeout;

        let confirmed = tokio::time::timeout(timeout, async {
            match provider.switch_chain(target).await {
                Ok(()) => {}
                Err(e) if e.is_user_rejection() => return Err(AppError::UserRejected),
                Err(e) if e.is_unrecognized_chain() => {
                    info!(chain_id = target, network = %network.id, "Chain unknown to wallet, adding it");
                    provider
                        .add_chain(&network.add_chain_params())
                        .await
                        .map_err(AppError::from_provider)?;
                    // Some wallets switch as part of adding; asking again is harmless
                    provider
                        .switch_chain(target)
                        .await
                        .map_err(AppError::from_provider)?;
                }
                Err(e) => return Err(AppError::from_provider(e)),
            }
            self.await_chain(provider, &mut events, target).await
        })
        .await;

        match confirmed {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                warn!(chain_id = target, timeout_secs = timeout.as_secs(), "Network switch not confirmed");
                return Err(AppError::NetworkSwitchTimeout {
                    chain_id: target,
                    timeout_secs: timeout.as_secs(),
                });
            }
        }

        // The wallet may expose a different account per network
        let account = read_account(provider).await?.unwrap_or_else(|| account.to_string());
        let contracts = self.factory.bind(target, &account).await?;

        info!(chain_id = target, network = %network.id, "Network switch confirmed");
        Ok(SwitchOutcome::Switched {
            chain_id: target,
            account,
            contracts,
        })
    }

    /// Bind for a chain the wallet moved to on its own
    #[instrument(skip(self))]
    pub async fn reconcile(&self, chain_id: u64, account: &str) -> Result<SwitchOutcome, AppError> {
        if !self.registry.is_supported(chain_id) {
            return Ok(SwitchOutcome::Unsupported {
                chain_id,
                account: account.to_string(),
            });
        }
        let contracts = self.factory.bind(chain_id, account).await?;
        Ok(SwitchOutcome::Switched {
            chain_id,
            account: contracts.account.clone(),
            contracts,
        })
    }

    /// First of `chainChanged(target)` or a positive `eth_chainId` poll
    async fn await_chain(
        &self,
        provider: &Arc<dyn WalletProvider>,
        events: &mut broadcast::Receiver<ProviderEvent>,
        target: u64,
    ) -> Result<(), AppError> {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut events_open = true;

        loop {
            tokio::select! {
                event = events.recv(), if events_open => match event {
                    Ok(ProviderEvent::ChainChanged(chain_id)) if chain_id == target => {
                        debug!("Switch confirmed by chainChanged");
                        return Ok(());
                    }
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => events_open = false,
                },
                _ = ticker.tick() => match provider.chain_id().await {
                    Ok(chain_id) if chain_id == target => {
                        debug!("Switch confirmed by eth_chainId poll");
                        return Ok(());
                    }
                    Ok(_) => {}
                    Err(e) => debug!(error = %e, "eth_chainId poll failed"),
                },
            }
        }
    }
}

async fn read_account(provider: &Arc<dyn WalletProvider>) -> Result<Option<String>, AppError> {
    let accounts = provider.accounts().await.map_err(AppError::from_provider)?;
    Ok(accounts.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockContractBackend, MockWalletProvider, SwitchBehavior};

    const ACCOUNT: &str = "0xaaaa000000000000000000000000000000000001";

    fn coordinator() -> NetworkSwitchCoordinator {
        let registry = Arc::new(NetworkRegistry::builtin());
        let factory = Arc::new(ContractBindingFactory::new(
            Arc::clone(&registry),
            Arc::new(MockContractBackend::deployed()),
        ));
        NetworkSwitchCoordinator::new(registry, factory, SwitchConfig::default())
    }

    fn provider(mock: &Arc<MockWalletProvider>) -> Arc<dyn WalletProvider> {
        Arc::clone(mock) as Arc<dyn WalletProvider>
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_on_target_does_not_prompt() {
        let mock = Arc::new(MockWalletProvider::new(51).with_accounts(&[ACCOUNT]));
        let outcome = coordinator()
            .switch(&provider(&mock), 51, ACCOUNT, None)
            .await
            .unwrap();

        assert!(matches!(outcome, SwitchOutcome::AlreadyActive(ref c) if c.chain_id == 51));
        assert_eq!(mock.request_count("wallet_switchEthereumChain"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_confirmed() {
        let mock = Arc::new(MockWalletProvider::new(50).with_accounts(&[ACCOUNT]));
        let outcome = coordinator()
            .switch(&provider(&mock), 51, ACCOUNT, None)
            .await
            .unwrap();

        assert_eq!(outcome.chain_id(), 51);
        assert_eq!(outcome.contracts().unwrap().chain_id, 51);
        assert_eq!(mock.request_count("wallet_switchEthereumChain"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrecognized_chain_is_added() {
        let mock = Arc::new(
            MockWalletProvider::new(50)
                .with_accounts(&[ACCOUNT])
                .with_switch_behavior(SwitchBehavior::UnrecognizedOnce),
        );
        let outcome = coordinator()
            .switch(&provider(&mock), 51, ACCOUNT, None)
            .await
            .unwrap();

        assert_eq!(outcome.chain_id(), 51);
        assert_eq!(mock.request_count("wallet_addEthereumChain"), 1);
        let added = mock.last_params("wallet_addEthereumChain").unwrap();
        assert_eq!(added[0]["chainId"], "0x33");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejection_is_terminal() {
        let mock = Arc::new(
            MockWalletProvider::new(50)
                .with_accounts(&[ACCOUNT])
                .with_switch_behavior(SwitchBehavior::Reject),
        );
        let result = coordinator()
            .switch(&provider(&mock), 51, ACCOUNT, None)
            .await;

        assert!(matches!(result, Err(AppError::UserRejected)));
        assert_eq!(mock.request_count("wallet_switchEthereumChain"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unconfirmed_switch_times_out() {
        let mock = Arc::new(
            MockWalletProvider::new(50)
                .with_accounts(&[ACCOUNT])
                .with_switch_behavior(SwitchBehavior::Ignore),
        );
        let result = coordinator()
            .switch(&provider(&mock), 51, ACCOUNT, None)
            .await;

        assert!(matches!(
            result,
            Err(AppError::NetworkSwitchTimeout {
                chain_id: 51,
                timeout_secs: 15
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsupported_target() {
        let mock = Arc::new(MockWalletProvider::new(50).with_accounts(&[ACCOUNT]));
        let result = coordinator()
            .switch(&provider(&mock), 1, ACCOUNT, None)
            .await;
        assert!(matches!(result, Err(AppError::UnsupportedNetwork(1))));
    }

    #[tokio::test]
    async fn test_reconcile_unsupported_chain() {
        let outcome = coordinator().reconcile(1, ACCOUNT).await.unwrap();
        assert!(matches!(outcome, SwitchOutcome::Unsupported { chain_id: 1, .. }));
        assert!(outcome.contracts().is_none());
    }
}
