//! Mock implementations for testing.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

use crate::domain::types::{chain_id_hex, normalize_address, parse_chain_id};
use crate::domain::{
    AppError, BetRecord, ContractBackend, ContractStats, EndpointHealth, EndpointProbe,
    GameContract, GameStatus, ProviderError, ProviderEvent, RpcError, TokenContract,
    WalletProvider,
};

/// EIP-1193 "disconnected" code returned by an unhealthy mock provider
const DISCONNECTED_CODE: i64 = 4900;

/// Bytecode returned for deployed contracts
const DEPLOYED_CODE: &str = "0x6080604052348015600f57600080fd5b50";

/// Configuration for mock behavior
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    pub should_fail: bool,
    pub error_message: Option<String>,
}

impl MockConfig {
    #[must_use]
    pub fn success() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            should_fail: true,
            error_message: Some(message.into()),
        }
    }

    fn message(&self) -> String {
        self.error_message
            .clone()
            .unwrap_or_else(|| "Mock error".to_string())
    }
}

// ============================================================================
// WALLET PROVIDER
// ============================================================================

/// How the mock wallet answers `wallet_switchEthereumChain`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwitchBehavior {
    /// Switch and emit `chainChanged`
    #[default]
    Approve,
    /// Answer 4001
    Reject,
    /// Answer 4902 until the chain has been added, then approve
    UnrecognizedOnce,
    /// Accept the request but never change chain
    Ignore,
    /// Answer with the given error code and stay on the current chain
    Fail(i64),
}

/// Mock EIP-1193 wallet
pub struct MockWalletProvider {
    chain_id: AtomicU64,
    accounts: Mutex<Vec<String>>,
    switch_behavior: SwitchBehavior,
    added_chains: Mutex<HashSet<u64>>,
    reject_connect: AtomicBool,
    request_delay: Mutex<Option<Duration>>,
    requests: Mutex<Vec<(String, Value)>>,
    events: broadcast::Sender<ProviderEvent>,
    config: MockConfig,
    is_healthy: AtomicBool,
}

impl MockWalletProvider {
    #[must_use]
    pub fn new(chain_id: u64) -> Self {
        Self::with_config(chain_id, MockConfig::success())
    }

    #[must_use]
    pub fn with_config(chain_id: u64, config: MockConfig) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            chain_id: AtomicU64::new(chain_id),
            accounts: Mutex::new(Vec::new()),
            switch_behavior: SwitchBehavior::default(),
            added_chains: Mutex::new(HashSet::new()),
            reject_connect: AtomicBool::new(false),
            request_delay: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            events,
            config,
            is_healthy: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub fn failing(chain_id: u64, message: impl Into<String>) -> Self {
        Self::with_config(chain_id, MockConfig::failure(message))
    }

    #[must_use]
    pub fn with_accounts(self, accounts: &[&str]) -> Self {
        *self.accounts.lock().unwrap() = accounts.iter().map(|a| a.to_string()).collect();
        self
    }

    #[must_use]
    pub fn with_switch_behavior(mut self, behavior: SwitchBehavior) -> Self {
        self.switch_behavior = behavior;
        self
    }

    /// `eth_requestAccounts` answers 4001
    #[must_use]
    pub fn rejecting_connect(self) -> Self {
        self.reject_connect.store(true, Ordering::Relaxed);
        self
    }

    /// Every request waits this long before answering
    #[must_use]
    pub fn with_request_delay(self, delay: Duration) -> Self {
        *self.request_delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.is_healthy.store(healthy, Ordering::Relaxed);
    }

    pub fn current_chain(&self) -> u64 {
        self.chain_id.load(Ordering::Relaxed)
    }

    /// Move the wallet to another chain as if the user did it, emitting `chainChanged`
    pub fn set_chain(&self, chain_id: u64) {
        if self.chain_id.swap(chain_id, Ordering::Relaxed) != chain_id {
            self.emit(ProviderEvent::ChainChanged(chain_id));
        }
    }

    /// Replace the exposed accounts, emitting `accountsChanged`
    pub fn set_accounts(&self, accounts: &[&str]) {
        let accounts: Vec<String> = accounts.iter().map(|a| normalize_address(a)).collect();
        *self.accounts.lock().unwrap() = accounts.clone();
        self.emit(ProviderEvent::AccountsChanged(accounts));
    }

    pub fn emit(&self, event: ProviderEvent) {
        let _ = self.events.send(event);
    }

    pub fn request_count(&self, method: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .count()
    }

    pub fn last_params(&self, method: &str) -> Option<Value> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(m, _)| m.clone())
            .collect()
    }

    fn requested_chain(params: &Value) -> Result<u64, ProviderError> {
        params[0]["chainId"]
            .as_str()
            .and_then(parse_chain_id)
            .ok_or_else(|| ProviderError::new(-32602, "missing chainId"))
    }

    fn accounts_value(&self) -> Value {
        json!(self.accounts.lock().unwrap().clone())
    }
}

#[async_trait]
impl WalletProvider for MockWalletProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        self.requests
            .lock()
            .unwrap()
            .push((method.to_string(), params.clone()));

        let delay = *self.request_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if !self.is_healthy.load(Ordering::Relaxed) {
            return Err(ProviderError::new(DISCONNECTED_CODE, "Provider disconnected"));
        }
        if self.config.should_fail {
            return Err(ProviderError::new(-32603, self.config.message()));
        }

        match method {
            "eth_requestAccounts" => {
                if self.reject_connect.load(Ordering::Relaxed) {
                    return Err(ProviderError::user_rejected());
                }
                Ok(self.accounts_value())
            }
            "eth_accounts" => Ok(self.accounts_value()),
            "eth_chainId" => Ok(json!(chain_id_hex(self.current_chain()))),
            "wallet_switchEthereumChain" => {
                let target = Self::requested_chain(&params)?;
                match self.switch_behavior {
                    SwitchBehavior::Approve => self.set_chain(target),
                    SwitchBehavior::Reject => return Err(ProviderError::user_rejected()),
                    SwitchBehavior::UnrecognizedOnce => {
                        if !self.added_chains.lock().unwrap().contains(&target) {
                            return Err(ProviderError::unrecognized_chain(target));
                        }
                        self.set_chain(target);
                    }
                    SwitchBehavior::Ignore => {}
                    SwitchBehavior::Fail(code) => {
                        return Err(ProviderError::new(code, "Internal JSON-RPC error"));
                    }
                }
                Ok(Value::Null)
            }
            "wallet_addEthereumChain" => {
                let chain_id = Self::requested_chain(&params)?;
                self.added_chains.lock().unwrap().insert(chain_id);
                Ok(Value::Null)
            }
            other => Err(ProviderError::new(4200, format!("Unsupported method {other}"))),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}

// ============================================================================
// CONTRACTS
// ============================================================================

/// Scriptable dice game contract
pub struct MockGameContract {
    address: String,
    status: Mutex<GameStatus>,
    history: Mutex<Vec<BetRecord>>,
    stats: Mutex<Option<ContractStats>>,
    config: MockConfig,
    is_healthy: AtomicBool,
    status_reads: AtomicUsize,
}

impl MockGameContract {
    #[must_use]
    pub fn new(address: &str) -> Self {
        Self::with_config(address, MockConfig::success())
    }

    #[must_use]
    pub fn with_config(address: &str, config: MockConfig) -> Self {
        Self {
            address: normalize_address(address),
            status: Mutex::new(GameStatus::default()),
            history: Mutex::new(Vec::new()),
            stats: Mutex::new(None),
            config,
            is_healthy: AtomicBool::new(true),
            status_reads: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn failing(address: &str, message: impl Into<String>) -> Self {
        Self::with_config(address, MockConfig::failure(message))
    }

    /// Unhealthy contracts fail every read until healthy again
    pub fn set_healthy(&self, healthy: bool) {
        self.is_healthy.store(healthy, Ordering::Relaxed);
    }

    pub fn set_status(&self, status: GameStatus) {
        *self.status.lock().unwrap() = status;
    }

    /// Simulate a wager: active, waiting on the VRF callback
    pub fn place_bet(&self, chosen_number: u8, amount: u128) {
        let mut status = self.status.lock().unwrap();
        *status = GameStatus {
            is_active: true,
            chosen_number,
            amount,
            request_id: format!("{}", Utc::now().timestamp_millis()),
            request_exists: true,
            last_play_timestamp: Utc::now().timestamp().max(0) as u64,
            ..GameStatus::default()
        };
    }

    /// Simulate the VRF callback settling the active game
    pub fn resolve(&self, result: u8, payout: u128) {
        let mut status = self.status.lock().unwrap();
        let record = BetRecord {
            chosen_number: status.chosen_number,
            rolled_number: result,
            timestamp: status.last_play_timestamp,
            amount: status.amount,
            payout,
        };
        status.is_active = false;
        status.is_completed = true;
        status.is_win = payout > 0;
        status.result = result;
        status.payout = payout;
        status.request_processed = true;
        status.recovery_eligible = false;
        self.history.lock().unwrap().push(record);
    }

    pub fn set_history(&self, history: Vec<BetRecord>) {
        *self.history.lock().unwrap() = history;
    }

    pub fn set_stats(&self, stats: Option<ContractStats>) {
        *self.stats.lock().unwrap() = stats;
    }

    pub fn status_reads(&self) -> usize {
        self.status_reads.load(Ordering::Relaxed)
    }

    fn check_should_fail(&self) -> Result<(), AppError> {
        if !self.is_healthy.load(Ordering::Relaxed) {
            return Err(AppError::Rpc(RpcError::Connection("Unhealthy".to_string())));
        }
        if self.config.should_fail {
            return Err(AppError::Rpc(RpcError::Connection(self.config.message())));
        }
        Ok(())
    }
}

#[async_trait]
impl GameContract for MockGameContract {
    fn address(&self) -> &str {
        &self.address
    }

    async fn get_game_status(&self, _player: &str) -> Result<GameStatus, AppError> {
        self.status_reads.fetch_add(1, Ordering::Relaxed);
        self.check_should_fail()?;
        Ok(self.status.lock().unwrap().clone())
    }

    async fn get_bet_history(&self, _player: &str) -> Result<Vec<BetRecord>, AppError> {
        self.check_should_fail()?;
        Ok(self.history.lock().unwrap().clone())
    }

    async fn get_contract_stats(&self) -> Result<ContractStats, AppError> {
        self.check_should_fail()?;
        self.stats
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AppError::NotSupported("stats not deployed".to_string()))
    }
}

/// Betting token with a settable balance
pub struct MockTokenContract {
    address: String,
    balance: Mutex<u128>,
    is_healthy: AtomicBool,
}

impl MockTokenContract {
    #[must_use]
    pub fn new(address: &str) -> Self {
        Self {
            address: normalize_address(address),
            balance: Mutex::new(0),
            is_healthy: AtomicBool::new(true),
        }
    }

    pub fn set_balance(&self, balance: u128) {
        *self.balance.lock().unwrap() = balance;
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.is_healthy.store(healthy, Ordering::Relaxed);
    }
}

#[async_trait]
impl TokenContract for MockTokenContract {
    fn address(&self) -> &str {
        &self.address
    }

    async fn balance_of(&self, _owner: &str) -> Result<u128, AppError> {
        if !self.is_healthy.load(Ordering::Relaxed) {
            return Err(AppError::Rpc(RpcError::Connection("Unhealthy".to_string())));
        }
        Ok(*self.balance.lock().unwrap())
    }
}

/// Contract backend handing out shared mock contracts per (chain, address)
pub struct MockContractBackend {
    default_code: Option<String>,
    code: Mutex<HashMap<String, String>>,
    games: Mutex<HashMap<(u64, String), Arc<MockGameContract>>>,
    tokens: Mutex<HashMap<(u64, String), Arc<MockTokenContract>>>,
    config: MockConfig,
    code_reads: AtomicUsize,
    code_delay: Mutex<Option<Duration>>,
}

impl MockContractBackend {
    /// Every address has bytecode
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    #[must_use]
    pub fn deployed() -> Self {
        Self::new()
    }

    /// No address has bytecode
    #[must_use]
    pub fn empty() -> Self {
        Self {
            default_code: None,
            ..Self::new()
        }
    }

    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            default_code: Some(DEPLOYED_CODE.to_string()),
            code: Mutex::new(HashMap::new()),
            games: Mutex::new(HashMap::new()),
            tokens: Mutex::new(HashMap::new()),
            config,
            code_reads: AtomicUsize::new(0),
            code_delay: Mutex::new(None),
        }
    }

    /// Every `eth_getCode` answers after `delay`
    #[must_use]
    pub fn with_code_delay(self, delay: Duration) -> Self {
        *self.code_delay.lock().unwrap() = Some(delay);
        self
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_config(MockConfig::failure(message))
    }

    pub fn set_code(&self, address: &str, code: &str) {
        self.code
            .lock()
            .unwrap()
            .insert(normalize_address(address), code.to_string());
    }

    pub fn code_reads(&self) -> usize {
        self.code_reads.load(Ordering::Relaxed)
    }

    /// The game contract bound at `address` on `chain_id`
    pub fn game(&self, chain_id: u64, address: &str) -> Arc<MockGameContract> {
        self.games
            .lock()
            .unwrap()
            .entry((chain_id, normalize_address(address)))
            .or_insert_with(|| Arc::new(MockGameContract::new(address)))
            .clone()
    }

    /// The token contract bound at `address` on `chain_id`
    pub fn token(&self, chain_id: u64, address: &str) -> Arc<MockTokenContract> {
        self.tokens
            .lock()
            .unwrap()
            .entry((chain_id, normalize_address(address)))
            .or_insert_with(|| Arc::new(MockTokenContract::new(address)))
            .clone()
    }
}

impl Default for MockContractBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContractBackend for MockContractBackend {
    async fn get_code(&self, _chain_id: u64, address: &str) -> Result<String, AppError> {
        self.code_reads.fetch_add(1, Ordering::Relaxed);
        let delay = *self.code_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.config.should_fail {
            return Err(AppError::Rpc(RpcError::Connection(self.config.message())));
        }
        let code = self
            .code
            .lock()
            .unwrap()
            .get(&normalize_address(address))
            .cloned();
        Ok(code
            .or_else(|| self.default_code.clone())
            .unwrap_or_else(|| "0x".to_string()))
    }

    fn game_contract(&self, chain_id: u64, address: &str) -> Arc<dyn GameContract> {
        self.game(chain_id, address)
    }

    fn token_contract(&self, chain_id: u64, address: &str) -> Arc<dyn TokenContract> {
        self.token(chain_id, address)
    }
}

// ============================================================================
// ENDPOINT PROBE
// ============================================================================

/// Endpoint probe answering healthy unless told otherwise
pub struct MockEndpointProbe {
    unhealthy: Mutex<HashSet<String>>,
    probes: Mutex<HashMap<String, usize>>,
    block_number: AtomicU64,
}

impl MockEndpointProbe {
    #[must_use]
    pub fn new() -> Self {
        Self {
            unhealthy: Mutex::new(HashSet::new()),
            probes: Mutex::new(HashMap::new()),
            block_number: AtomicU64::new(1_000),
        }
    }

    pub fn set_unhealthy(&self, url: &str) {
        self.unhealthy.lock().unwrap().insert(url.to_string());
    }

    pub fn set_healthy(&self, url: &str) {
        self.unhealthy.lock().unwrap().remove(url);
    }

    pub fn probe_count(&self, url: &str) -> usize {
        self.probes.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

impl Default for MockEndpointProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EndpointProbe for MockEndpointProbe {
    async fn probe(&self, url: &str) -> EndpointHealth {
        *self
            .probes
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_insert(0) += 1;

        if self.unhealthy.lock().unwrap().contains(url) {
            return EndpointHealth::unhealthy(url, 5, "Connection refused");
        }
        let block = self.block_number.fetch_add(1, Ordering::Relaxed);
        EndpointHealth::healthy(url, 5, block)
    }
}
