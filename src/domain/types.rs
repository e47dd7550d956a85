//! Domain types with validation support.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use validator::Validate;

use super::traits::{GameContract, TokenContract, WalletProvider};

// ============================================================================
// NOTIFICATIONS
// ============================================================================

/// Toast severity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A live user notification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Toast {
    pub id: Uuid,
    pub message: String,
    pub severity: Severity,
    /// Zero means the toast stays until dismissed.
    #[serde(with = "duration_millis")]
    pub ttl: Duration,
    pub created_at: DateTime<Utc>,
}

impl Toast {
    #[must_use]
    pub fn new(message: impl Into<String>, severity: Severity, ttl: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            message: message.into(),
            severity,
            ttl,
            created_at: Utc::now(),
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

// ============================================================================
// NETWORKS
// ============================================================================

/// Native currency descriptor used when asking a wallet to add a chain
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct NativeCurrency {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1, max = 6))]
    pub symbol: String,
    pub decimals: u8,
}

/// Token and game contract addresses for one network
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct ContractAddresses {
    #[validate(custom(function = "validate_address"))]
    pub token: String,
    #[validate(custom(function = "validate_address"))]
    pub game: String,
}

/// Supported network entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    #[validate(length(min = 1, max = 32))]
    pub id: String,
    pub chain_id: u64,
    #[validate(length(min = 1))]
    pub display_name: String,
    #[validate(nested)]
    pub native_currency: NativeCurrency,
    #[validate(length(min = 1), custom(function = "validate_endpoints"))]
    pub rpc_endpoints: Vec<String>,
    pub current_endpoint_index: usize,
    #[validate(url)]
    pub explorer_url: String,
    #[validate(nested)]
    pub contracts: ContractAddresses,
}

impl NetworkConfig {
    /// Endpoint currently selected by failover
    pub fn active_endpoint(&self) -> &str {
        let idx = self.current_endpoint_index % self.rpc_endpoints.len().max(1);
        self.rpc_endpoints
            .get(idx)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Hex chain id as wallets expect it (`0x33`)
    pub fn chain_id_hex(&self) -> String {
        chain_id_hex(self.chain_id)
    }

    pub fn explorer_tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_url.trim_end_matches('/'), tx_hash)
    }

    pub fn explorer_address_url(&self, address: &str) -> String {
        format!(
            "{}/address/{}",
            self.explorer_url.trim_end_matches('/'),
            address
        )
    }

    /// `wallet_addEthereumChain` payload for this network
    pub fn add_chain_params(&self) -> AddChainParams {
        AddChainParams {
            chain_id: self.chain_id_hex(),
            chain_name: self.display_name.clone(),
            native_currency: self.native_currency.clone(),
            rpc_urls: self.rpc_endpoints.clone(),
            block_explorer_urls: vec![self.explorer_url.clone()],
        }
    }
}

/// EIP-3085 `wallet_addEthereumChain` parameter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AddChainParams {
    pub chain_id: String,
    pub chain_name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    pub block_explorer_urls: Vec<String>,
}

fn validate_endpoints(endpoints: &[String]) -> Result<(), validator::ValidationError> {
    for endpoint in endpoints {
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(validator::ValidationError::new("rpc_endpoint_scheme"));
        }
    }
    Ok(())
}

fn validate_address(address: &str) -> Result<(), validator::ValidationError> {
    if is_valid_address(address) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("evm_address"))
    }
}

/// True for a `0x`-prefixed 20-byte hex address
pub fn is_valid_address(address: &str) -> bool {
    address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .map(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(false)
}

/// Lowercases an address so comparisons ignore checksum casing
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

/// Parses `0x`-prefixed hex or plain decimal chain ids
pub fn parse_chain_id(value: &str) -> Option<u64> {
    let value = value.trim();
    match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

pub fn chain_id_hex(chain_id: u64) -> String {
    format!("0x{chain_id:x}")
}

// ============================================================================
// PROVIDER EVENTS
// ============================================================================

/// Events emitted by an EIP-1193 provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    AccountsChanged(Vec<String>),
    ChainChanged(u64),
    Disconnect(String),
}

// ============================================================================
// SESSION
// ============================================================================

/// Lifecycle phase of the wallet session
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Idle,
    Connecting,
    Connected,
    SwitchingNetwork,
    Disconnected,
    /// Recoverable: account may be retained while contracts are null
    Error(String),
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::SwitchingNetwork => "switching_network",
            Self::Disconnected => "disconnected",
            Self::Error(_) => "error",
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// In-flight work flags surfaced to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LoadingFlag {
    Connecting,
    RequestingAccounts,
    BindingContracts,
    SwitchingNetwork,
    Reconnecting,
}

/// Typed handles to the token and game contracts for one (chain, account)
#[derive(Clone)]
pub struct ContractBindings {
    pub chain_id: u64,
    pub account: String,
    pub addresses: ContractAddresses,
    pub token: Arc<dyn TokenContract>,
    pub game: Arc<dyn GameContract>,
}

impl std::fmt::Debug for ContractBindings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractBindings")
            .field("chain_id", &self.chain_id)
            .field("account", &self.account)
            .field("addresses", &self.addresses)
            .finish_non_exhaustive()
    }
}

/// The single source of truth for wallet/session/network identity
#[derive(Clone, Default)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub provider: Option<Arc<dyn WalletProvider>>,
    pub account: Option<String>,
    pub chain_id: Option<u64>,
    pub contracts: Option<ContractBindings>,
    pub loading: BTreeSet<LoadingFlag>,
    pub is_connecting: bool,
    /// Bumped on every reset; results tagged with an older epoch are stale.
    pub epoch: u64,
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("phase", &self.phase)
            .field("provider", &self.provider.as_ref().map(|_| "attached"))
            .field("account", &self.account)
            .field("chain_id", &self.chain_id)
            .field("contracts", &self.contracts)
            .field("loading", &self.loading)
            .field("is_connecting", &self.is_connecting)
            .field("epoch", &self.epoch)
            .finish()
    }
}

impl SessionState {
    /// Contracts are bound and tagged with the committed chain and account
    pub fn has_live_contracts(&self) -> bool {
        match (&self.contracts, self.chain_id, &self.account) {
            (Some(c), Some(chain_id), Some(account)) => {
                c.chain_id == chain_id && c.account == *account
            }
            _ => false,
        }
    }

    /// Key the poller caches snapshots under, present only when reads are allowed
    pub fn poll_key(&self) -> Option<PollKey> {
        if self.phase != SessionPhase::Connected || !self.has_live_contracts() {
            return None;
        }
        Some(PollKey {
            account: self.account.clone()?,
            chain_id: self.chain_id?,
            epoch: self.epoch,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.account.is_some()
            && matches!(
                self.phase,
                SessionPhase::Connected | SessionPhase::SwitchingNetwork | SessionPhase::Error(_)
            )
    }
}

/// Identity of one polled game stream
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PollKey {
    pub account: String,
    pub chain_id: u64,
    pub epoch: u64,
}

/// Persisted "last connected" marker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionMarker {
    pub account: String,
    pub connected_at: DateTime<Utc>,
    pub auto_connect: bool,
}

impl SessionMarker {
    #[must_use]
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            connected_at: Utc::now(),
            auto_connect: true,
        }
    }

    /// Eligible for silent reconnect
    pub fn is_fresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        let Ok(window) = chrono::Duration::from_std(window) else {
            return false;
        };
        self.auto_connect && now.signed_duration_since(self.connected_at) < window
    }
}

// ============================================================================
// GAME STATE
// ============================================================================

/// Raw `getGameStatus(address)` result
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameStatus {
    pub is_active: bool,
    pub is_win: bool,
    pub is_completed: bool,
    pub chosen_number: u8,
    pub amount: u128,
    pub result: u8,
    pub payout: u128,
    pub request_id: String,
    pub request_exists: bool,
    pub request_processed: bool,
    pub recovery_eligible: bool,
    /// Unix seconds
    pub last_play_timestamp: u64,
}

/// Client-side cached view of one account's game state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub is_active: bool,
    pub is_completed: bool,
    pub is_win: bool,
    pub chosen_number: u8,
    pub amount: u128,
    pub result_code: u8,
    pub payout: u128,
    pub request_id: String,
    pub request_exists: bool,
    pub request_processed: bool,
    /// On-chain flag; authoritative for gating the recovery action
    pub recovery_eligible: bool,
    pub last_play_timestamp: u64,
    pub fetched_at: DateTime<Utc>,
}

impl GameSnapshot {
    #[must_use]
    pub fn from_status(status: GameStatus, fetched_at: DateTime<Utc>) -> Self {
        Self {
            is_active: status.is_active,
            is_completed: status.is_completed,
            is_win: status.is_win,
            chosen_number: status.chosen_number,
            amount: status.amount,
            result_code: status.result,
            payout: status.payout,
            request_id: status.request_id,
            request_exists: status.request_exists,
            request_processed: status.request_processed,
            // An inactive game can never be recovered, whatever the contract says.
            recovery_eligible: status.recovery_eligible && status.is_active,
            last_play_timestamp: status.last_play_timestamp,
            fetched_at,
        }
    }

    pub fn last_play_at(&self) -> Option<DateTime<Utc>> {
        if self.last_play_timestamp == 0 {
            return None;
        }
        Utc.timestamp_opt(self.last_play_timestamp as i64, 0).single()
    }

    /// Waiting on the VRF oracle
    pub fn is_awaiting_vrf(&self) -> bool {
        self.is_active && self.request_exists && !self.request_processed
    }

    pub fn is_stale(&self, now: DateTime<Utc>, horizon: Duration) -> bool {
        chrono::Duration::from_std(horizon)
            .map(|h| now.signed_duration_since(self.fetched_at) > h)
            .unwrap_or(true)
    }
}

/// One row of `getBetHistory(address)`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BetRecord {
    pub chosen_number: u8,
    pub rolled_number: u8,
    pub timestamp: u64,
    pub amount: u128,
    pub payout: u128,
}

impl BetRecord {
    pub fn is_win(&self) -> bool {
        self.payout > 0
    }
}

/// Aggregate contract statistics (optional read)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContractStats {
    pub total_games: u64,
    pub total_volume: u128,
    pub total_payouts: u128,
    pub house_balance: u128,
}

// ============================================================================
// RPC HEALTH
// ============================================================================

/// Result of a single endpoint probe
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndpointHealth {
    pub url: String,
    pub healthy: bool,
    pub latency_ms: u64,
    pub block_number: Option<u64>,
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl EndpointHealth {
    pub fn healthy(url: impl Into<String>, latency_ms: u64, block_number: u64) -> Self {
        Self {
            url: url.into(),
            healthy: true,
            latency_ms,
            block_number: Some(block_number),
            error: None,
            checked_at: Utc::now(),
        }
    }

    pub fn unhealthy(url: impl Into<String>, latency_ms: u64, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            healthy: false,
            latency_ms,
            block_number: None,
            error: Some(error.into()),
            checked_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network() -> NetworkConfig {
        NetworkConfig {
            id: "apothem".to_string(),
            chain_id: 51,
            display_name: "XDC Apothem".to_string(),
            native_currency: NativeCurrency {
                name: "TXDC".to_string(),
                symbol: "TXDC".to_string(),
                decimals: 18,
            },
            rpc_endpoints: vec!["https://rpc.apothem.network".to_string()],
            current_endpoint_index: 0,
            explorer_url: "https://testnet.xdcscan.io".to_string(),
            contracts: ContractAddresses {
                token: "0x1111111111111111111111111111111111111111".to_string(),
                game: "0x2222222222222222222222222222222222222222".to_string(),
            },
        }
    }

    #[test]
    fn test_network_config_valid() {
        assert!(network().validate().is_ok());
    }

    #[test]
    fn test_network_config_rejects_bad_address() {
        let mut config = network();
        config.contracts.game = "0x1234".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_network_config_rejects_empty_endpoints() {
        let mut config = network();
        config.rpc_endpoints.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_network_config_rejects_non_http_endpoint() {
        let mut config = network();
        config.rpc_endpoints.push("wss://ws.apothem.network".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_add_chain_params_serialization() {
        let params = network().add_chain_params();
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["chainId"], "0x33");
        assert_eq!(json["chainName"], "XDC Apothem");
        assert_eq!(json["rpcUrls"][0], "https://rpc.apothem.network");
        assert_eq!(json["blockExplorerUrls"][0], "https://testnet.xdcscan.io");
    }

    #[test]
    fn test_parse_chain_id() {
        assert_eq!(parse_chain_id("0x33"), Some(51));
        assert_eq!(parse_chain_id("0X32"), Some(50));
        assert_eq!(parse_chain_id("51"), Some(51));
        assert_eq!(parse_chain_id("0xzz"), None);
        assert_eq!(chain_id_hex(51), "0x33");
    }

    #[test]
    fn test_address_helpers() {
        assert!(is_valid_address("0xAbCd000000000000000000000000000000000001"));
        assert!(!is_valid_address("AbCd000000000000000000000000000000000001"));
        assert_eq!(normalize_address(" 0xABC "), "0xabc");
    }

    #[test]
    fn test_snapshot_masks_recovery_for_inactive_game() {
        let status = GameStatus {
            is_active: false,
            recovery_eligible: true,
            ..Default::default()
        };
        let snapshot = GameSnapshot::from_status(status, Utc::now());
        assert!(!snapshot.recovery_eligible);
    }

    #[test]
    fn test_session_marker_freshness() {
        let mut marker = SessionMarker::new("0xabc");
        let now = marker.connected_at + chrono::Duration::hours(5);
        assert!(marker.is_fresh(now, Duration::from_secs(6 * 3600)));
        let later = marker.connected_at + chrono::Duration::hours(7);
        assert!(!marker.is_fresh(later, Duration::from_secs(6 * 3600)));
        marker.auto_connect = false;
        assert!(!marker.is_fresh(now, Duration::from_secs(6 * 3600)));
    }

    #[test]
    fn test_active_endpoint_follows_index() {
        let mut config = network();
        config.rpc_endpoints.push("https://erpc.apothem.network".to_string());
        config.current_endpoint_index = 1;
        assert_eq!(config.active_endpoint(), "https://erpc.apothem.network");
    }
}
