//! Contract binding factory.

use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::domain::{AppError, ContractBackend, ContractBindings, types::normalize_address};
use crate::infra::network::NetworkRegistry;

/// Produces typed token and game handles for a (chain, account) pair after
/// verifying that bytecode exists at both configured addresses.
pub struct ContractBindingFactory {
    registry: Arc<NetworkRegistry>,
    backend: Arc<dyn ContractBackend>,
}

impl ContractBindingFactory {
    #[must_use]
    pub fn new(registry: Arc<NetworkRegistry>, backend: Arc<dyn ContractBackend>) -> Self {
        Self { registry, backend }
    }

    pub fn registry(&self) -> &Arc<NetworkRegistry> {
        &self.registry
    }

    #[instrument(skip(self))]
    pub async fn bind(&self, chain_id: u64, account: &str) -> Result<ContractBindings, AppError> {
        let network = self
            .registry
            .get(chain_id)
            .ok_or(AppError::UnsupportedNetwork(chain_id))?;
        let addresses = network.contracts.clone();

        tokio::try_join!(
            self.verify_code(chain_id, &addresses.token),
            self.verify_code(chain_id, &addresses.game),
        )?;

        let bindings = ContractBindings {
            chain_id,
            account: normalize_address(account),
            token: self.backend.token_contract(chain_id, &addresses.token),
            game: self.backend.game_contract(chain_id, &addresses.game),
            addresses,
        };

        info!(
            chain_id = chain_id,
            network = %network.id,
            game = %bindings.addresses.game,
            "Contracts bound"
        );
        Ok(bindings)
    }

    async fn verify_code(&self, chain_id: u64, address: &str) -> Result<(), AppError> {
        // Transport errors pass through; only a missing deployment fails the binding
        let code = self.backend.get_code(chain_id, address).await?;

        let body = code.trim().trim_start_matches("0x");
        if body.is_empty() || body.chars().all(|c| c == '0') {
            warn!(chain_id = chain_id, address = %address, "No bytecode at contract address");
            return Err(AppError::ContractBindingFailed {
                chain_id,
                address: address.to_string(),
                reason: "no contract code at address".to_string(),
            });
        }
        Ok(())
    }
}
