//! Domain traits defining contracts for external systems.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::broadcast;

use super::error::{AppError, ProviderError};
use super::types::{
    AddChainParams, BetRecord, ContractStats, EndpointHealth, GameStatus, ProviderEvent,
    SessionMarker, chain_id_hex, normalize_address, parse_chain_id,
};

/// JSON-RPC code used when a provider answers with an unexpected shape
const INVALID_RESPONSE_CODE: i64 = -32603;

/// EIP-1193 wallet provider boundary
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Send a raw EIP-1193 request
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;

    /// Subscribe to `accountsChanged` / `chainChanged` / `disconnect`
    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent>;

    /// `eth_requestAccounts` (may prompt the user)
    async fn request_accounts(&self) -> Result<Vec<String>, ProviderError> {
        let value = self.request("eth_requestAccounts", json!([])).await?;
        parse_accounts(value)
    }

    /// `eth_accounts` (never prompts)
    async fn accounts(&self) -> Result<Vec<String>, ProviderError> {
        let value = self.request("eth_accounts", json!([])).await?;
        parse_accounts(value)
    }

    /// `eth_chainId`
    async fn chain_id(&self) -> Result<u64, ProviderError> {
        let value = self.request("eth_chainId", json!([])).await?;
        value
            .as_str()
            .and_then(parse_chain_id)
            .or_else(|| value.as_u64())
            .ok_or_else(|| {
                ProviderError::new(INVALID_RESPONSE_CODE, format!("invalid chain id: {value}"))
            })
    }

    /// `wallet_switchEthereumChain`
    async fn switch_chain(&self, chain_id: u64) -> Result<(), ProviderError> {
        self.request(
            "wallet_switchEthereumChain",
            json!([{ "chainId": chain_id_hex(chain_id) }]),
        )
        .await
        .map(|_| ())
    }

    /// `wallet_addEthereumChain`
    async fn add_chain(&self, params: &AddChainParams) -> Result<(), ProviderError> {
        let params = serde_json::to_value(params)
            .map_err(|e| ProviderError::new(INVALID_RESPONSE_CODE, e.to_string()))?;
        self.request("wallet_addEthereumChain", Value::Array(vec![params]))
            .await
            .map(|_| ())
    }
}

fn parse_accounts(value: Value) -> Result<Vec<String>, ProviderError> {
    let accounts: Vec<String> = serde_json::from_value(value).map_err(|e| {
        ProviderError::new(INVALID_RESPONSE_CODE, format!("invalid accounts: {e}"))
    })?;
    Ok(accounts.iter().map(|a| normalize_address(a)).collect())
}

/// Locates an injected wallet provider
pub trait ProviderDiscovery: Send + Sync {
    fn discover(&self) -> Option<Arc<dyn WalletProvider>>;
}

/// Liveness probe for a JSON-RPC endpoint
#[async_trait]
pub trait EndpointProbe: Send + Sync {
    /// Never fails; failures are reported as an unhealthy result
    async fn probe(&self, url: &str) -> EndpointHealth;
}

/// Read surface of the dice game contract
#[async_trait]
pub trait GameContract: Send + Sync {
    fn address(&self) -> &str;

    async fn get_game_status(&self, player: &str) -> Result<GameStatus, AppError>;

    async fn get_bet_history(&self, player: &str) -> Result<Vec<BetRecord>, AppError>;

    /// Aggregate stats; optional on older deployments
    async fn get_contract_stats(&self) -> Result<ContractStats, AppError> {
        Err(AppError::NotSupported(
            "get_contract_stats not implemented".to_string(),
        ))
    }
}

/// Read surface of the betting token
#[async_trait]
pub trait TokenContract: Send + Sync {
    fn address(&self) -> &str;

    async fn balance_of(&self, owner: &str) -> Result<u128, AppError>;
}

/// Chain access used by the contract binding factory
#[async_trait]
pub trait ContractBackend: Send + Sync {
    /// `eth_getCode`; `"0x"` means no contract at `address`
    async fn get_code(&self, chain_id: u64, address: &str) -> Result<String, AppError>;

    fn game_contract(&self, chain_id: u64, address: &str) -> Arc<dyn GameContract>;

    fn token_contract(&self, chain_id: u64, address: &str) -> Arc<dyn TokenContract>;
}

/// Advisory client-side persistence
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load_marker(&self) -> Result<Option<SessionMarker>, AppError>;

    async fn save_marker(&self, marker: &SessionMarker) -> Result<(), AppError>;

    async fn clear_marker(&self) -> Result<(), AppError>;

    async fn rpc_override(&self, network_id: &str) -> Result<Option<String>, AppError>;

    /// `None` removes the override
    async fn set_rpc_override(&self, network_id: &str, url: Option<&str>)
    -> Result<(), AppError>;

    async fn preferred_network(&self) -> Result<Option<String>, AppError>;

    async fn set_preferred_network(&self, network_id: &str) -> Result<(), AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Minimal implementation for testing default methods
    struct ScriptedProvider {
        response: Value,
        requests: Mutex<Vec<(String, Value)>>,
        events: broadcast::Sender<ProviderEvent>,
    }

    impl ScriptedProvider {
        fn new(response: Value) -> Self {
            let (events, _) = broadcast::channel(4);
            Self {
                response,
                requests: Mutex::new(Vec::new()),
                events,
            }
        }
    }

    #[async_trait]
    impl WalletProvider for ScriptedProvider {
        async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
            self.requests
                .lock()
                .unwrap()
                .push((method.to_string(), params));
            Ok(self.response.clone())
        }

        fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
            self.events.subscribe()
        }
    }

    struct MinimalGame;

    #[async_trait]
    impl GameContract for MinimalGame {
        fn address(&self) -> &str {
            "0x0000000000000000000000000000000000000001"
        }

        async fn get_game_status(&self, _player: &str) -> Result<GameStatus, AppError> {
            Ok(GameStatus::default())
        }

        async fn get_bet_history(&self, _player: &str) -> Result<Vec<BetRecord>, AppError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_chain_id_parses_hex() {
        let provider = ScriptedProvider::new(json!("0x33"));
        assert_eq!(provider.chain_id().await.unwrap(), 51);
    }

    #[tokio::test]
    async fn test_chain_id_rejects_garbage() {
        let provider = ScriptedProvider::new(json!({"unexpected": true}));
        assert!(provider.chain_id().await.is_err());
    }

    #[tokio::test]
    async fn test_accounts_are_normalized() {
        let provider =
            ScriptedProvider::new(json!(["0xABCDEF0000000000000000000000000000000001"]));
        let accounts = provider.request_accounts().await.unwrap();
        assert_eq!(accounts, vec!["0xabcdef0000000000000000000000000000000001"]);
    }

    #[tokio::test]
    async fn test_switch_chain_sends_hex_chain_id() {
        let provider = ScriptedProvider::new(Value::Null);
        provider.switch_chain(51).await.unwrap();
        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests[0].0, "wallet_switchEthereumChain");
        assert_eq!(requests[0].1[0]["chainId"], "0x33");
    }

    #[tokio::test]
    async fn test_game_contract_stats_not_supported_by_default() {
        let result = MinimalGame.get_contract_stats().await;
        assert!(matches!(result, Err(AppError::NotSupported(_))));
    }
}
