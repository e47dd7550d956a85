//! JSON-RPC backed contract handles.
//!
//! Every call goes through [`RpcFailover`], so a dead endpoint is retried,
//! backed off from and rotated away from transparently.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;

use super::abi;
use crate::domain::{
    AppError, BetRecord, ContractBackend, ContractError, ContractStats, GameContract, GameStatus,
    RpcError, TokenContract,
};
use crate::infra::rpc::{JsonRpcHttpClient, RpcFailover};

/// Shared `eth_call` / `eth_getCode` plumbing
#[derive(Clone)]
struct EvmCaller {
    failover: Arc<RpcFailover>,
    client: JsonRpcHttpClient,
}

impl EvmCaller {
    async fn eth_call(&self, chain_id: u64, to: &str, data: String) -> Result<String, AppError> {
        let value = self
            .failover
            .execute(chain_id, |url| {
                let client = self.client.clone();
                let params = json!([{ "to": to, "data": data }, "latest"]);
                async move { client.call(&url, "eth_call", params).await }
            })
            .await
            .map_err(map_revert)?;

        value.as_str().map(str::to_string).ok_or_else(|| {
            AppError::Rpc(RpcError::InvalidResponse(format!(
                "eth_call returned {value}"
            )))
        })
    }

    async fn get_code(&self, chain_id: u64, address: &str) -> Result<String, AppError> {
        let value = self
            .failover
            .execute(chain_id, |url| {
                let client = self.client.clone();
                let params = json!([address, "latest"]);
                async move { client.call(&url, "eth_getCode", params).await }
            })
            .await?;

        value.as_str().map(str::to_string).ok_or_else(|| {
            AppError::Rpc(RpcError::InvalidResponse(format!(
                "eth_getCode returned {value}"
            )))
        })
    }
}

/// Node error code for reverted calls (geth-compatible nodes)
const EXECUTION_REVERTED_CODE: i64 = 3;

fn map_revert(err: AppError) -> AppError {
    match err {
        AppError::Rpc(RpcError::JsonRpc { code, message })
            if code == EXECUTION_REVERTED_CODE || message.contains("revert") =>
        {
            AppError::Contract(ContractError::Reverted(message))
        }
        other => other,
    }
}

/// Contract backend speaking JSON-RPC to the network's active endpoint
pub struct EvmContractBackend {
    caller: EvmCaller,
}

impl EvmContractBackend {
    pub fn new(failover: Arc<RpcFailover>, client: JsonRpcHttpClient) -> Self {
        Self {
            caller: EvmCaller { failover, client },
        }
    }
}

#[async_trait]
impl ContractBackend for EvmContractBackend {
    #[instrument(skip(self))]
    async fn get_code(&self, chain_id: u64, address: &str) -> Result<String, AppError> {
        self.caller.get_code(chain_id, address).await
    }

    fn game_contract(&self, chain_id: u64, address: &str) -> Arc<dyn GameContract> {
        Arc::new(EvmGameContract {
            chain_id,
            address: address.to_string(),
            caller: self.caller.clone(),
        })
    }

    fn token_contract(&self, chain_id: u64, address: &str) -> Arc<dyn TokenContract> {
        Arc::new(EvmTokenContract {
            chain_id,
            address: address.to_string(),
            caller: self.caller.clone(),
        })
    }
}

/// Dice game contract handle
pub struct EvmGameContract {
    chain_id: u64,
    address: String,
    caller: EvmCaller,
}

#[async_trait]
impl GameContract for EvmGameContract {
    fn address(&self) -> &str {
        &self.address
    }

    #[instrument(skip(self), fields(chain_id = self.chain_id))]
    async fn get_game_status(&self, player: &str) -> Result<GameStatus, AppError> {
        let data = abi::encode_address_call(abi::GET_GAME_STATUS, player)?;
        let result = self.caller.eth_call(self.chain_id, &self.address, data).await?;
        abi::decode_game_status(&result)
    }

    #[instrument(skip(self), fields(chain_id = self.chain_id))]
    async fn get_bet_history(&self, player: &str) -> Result<Vec<BetRecord>, AppError> {
        let data = abi::encode_address_call(abi::GET_BET_HISTORY, player)?;
        let result = self.caller.eth_call(self.chain_id, &self.address, data).await?;
        abi::decode_bet_history(&result)
    }

    async fn get_contract_stats(&self) -> Result<ContractStats, AppError> {
        let data = abi::encode_call(abi::GET_CONTRACT_STATS);
        let result = self.caller.eth_call(self.chain_id, &self.address, data).await?;
        abi::decode_contract_stats(&result)
    }
}

/// Betting token handle
pub struct EvmTokenContract {
    chain_id: u64,
    address: String,
    caller: EvmCaller,
}

#[async_trait]
impl TokenContract for EvmTokenContract {
    fn address(&self) -> &str {
        &self.address
    }

    async fn balance_of(&self, owner: &str) -> Result<u128, AppError> {
        let data = abi::encode_address_call(abi::BALANCE_OF, owner)?;
        let result = self.caller.eth_call(self.chain_id, &self.address, data).await?;
        abi::decode_uint(&result)
    }
}
