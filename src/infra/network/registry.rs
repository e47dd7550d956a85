//! Table of supported networks.
//!
//! Two networks ship built in (XDC mainnet and the Apothem testnet). Endpoint
//! lists can be overridden from the environment or by the user at runtime; the
//! active endpoint index is only moved by [`crate::infra::rpc::RpcFailover`].

use dashmap::DashMap;
use std::env;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::domain::{
    AppError, ConfigError, ContractAddresses, NativeCurrency, NetworkConfig, types::parse_chain_id,
};

/// Chain id of the primary network
pub const XDC_MAINNET_CHAIN_ID: u64 = 50;

/// Chain id of the test network
pub const XDC_APOTHEM_CHAIN_ID: u64 = 51;

const MAINNET_TOKEN: &str = "0x8f9920283470f52128bf11b0c14e798be704fd15";
const MAINNET_GAME: &str = "0x3c5b7a40c4f0f1a2c6e3c5a1b2d4e6f8a0c2e4f6";
const APOTHEM_TOKEN: &str = "0xb3db178db835b4dfcb4149b2161644058393267d";
const APOTHEM_GAME: &str = "0x6c4f2a7e95d1b3c8a0f9e2d4c6b8a1e3f5d7c9b2";

/// Built-in XDC mainnet configuration
pub fn xdc_mainnet() -> NetworkConfig {
    NetworkConfig {
        id: "xdc".to_string(),
        chain_id: XDC_MAINNET_CHAIN_ID,
        display_name: "XDC Network".to_string(),
        native_currency: NativeCurrency {
            name: "XDC".to_string(),
            symbol: "XDC".to_string(),
            decimals: 18,
        },
        rpc_endpoints: vec![
            "https://rpc.xinfin.network".to_string(),
            "https://erpc.xinfin.network".to_string(),
            "https://rpc.xdcrpc.com".to_string(),
        ],
        current_endpoint_index: 0,
        explorer_url: "https://xdcscan.io".to_string(),
        contracts: ContractAddresses {
            token: MAINNET_TOKEN.to_string(),
            game: MAINNET_GAME.to_string(),
        },
    }
}

/// Built-in XDC Apothem testnet configuration
pub fn xdc_apothem() -> NetworkConfig {
    NetworkConfig {
        id: "apothem".to_string(),
        chain_id: XDC_APOTHEM_CHAIN_ID,
        display_name: "XDC Apothem Testnet".to_string(),
        native_currency: NativeCurrency {
            name: "TXDC".to_string(),
            symbol: "TXDC".to_string(),
            decimals: 18,
        },
        rpc_endpoints: vec![
            "https://rpc.apothem.network".to_string(),
            "https://erpc.apothem.network".to_string(),
            "https://apothem.xdcrpc.com".to_string(),
        ],
        current_endpoint_index: 0,
        explorer_url: "https://testnet.xdcscan.io".to_string(),
        contracts: ContractAddresses {
            token: APOTHEM_TOKEN.to_string(),
            game: APOTHEM_GAME.to_string(),
        },
    }
}

/// Registry of supported networks keyed by chain id
#[derive(Debug)]
pub struct NetworkRegistry {
    networks: DashMap<u64, NetworkConfig>,
    /// Endpoint lists as loaded, used to undo user overrides
    defaults: DashMap<u64, Vec<String>>,
}

impl NetworkRegistry {
    /// Create a registry from validated network entries
    pub fn new(networks: Vec<NetworkConfig>) -> Result<Self, AppError> {
        let registry = Self {
            networks: DashMap::new(),
            defaults: DashMap::new(),
        };

        for network in networks {
            network.validate().map_err(|e| {
                AppError::Config(ConfigError::InvalidNetwork {
                    network: network.id.clone(),
                    message: e.to_string(),
                })
            })?;
            if registry.by_id(&network.id).is_some() {
                return Err(AppError::Config(ConfigError::InvalidNetwork {
                    network: network.id.clone(),
                    message: "duplicate network id".to_string(),
                }));
            }
            registry
                .defaults
                .insert(network.chain_id, network.rpc_endpoints.clone());
            registry.networks.insert(network.chain_id, network);
        }

        Ok(registry)
    }

    /// Registry with the two built-in networks
    pub fn builtin() -> Self {
        let networks = [xdc_mainnet(), xdc_apothem()];
        let registry = Self {
            networks: DashMap::new(),
            defaults: DashMap::new(),
        };
        for network in networks {
            registry
                .defaults
                .insert(network.chain_id, network.rpc_endpoints.clone());
            registry.networks.insert(network.chain_id, network);
        }
        registry
    }

    /// Built-in networks with environment overrides applied.
    ///
    /// For a network with id `apothem` the recognized variables are
    /// `VRF_DICE_APOTHEM_RPC_URLS` (comma separated), `VRF_DICE_APOTHEM_TOKEN_ADDRESS`,
    /// `VRF_DICE_APOTHEM_GAME_ADDRESS` and `VRF_DICE_APOTHEM_EXPLORER_URL`.
    pub fn from_env() -> Result<Self, AppError> {
        let networks = [xdc_mainnet(), xdc_apothem()]
            .into_iter()
            .map(apply_env_overrides)
            .collect();
        let registry = Self::new(networks)?;
        info!(
            networks = ?registry.supported_chain_ids(),
            "Network registry loaded"
        );
        Ok(registry)
    }

    pub fn get(&self, chain_id: u64) -> Option<NetworkConfig> {
        self.networks.get(&chain_id).map(|n| n.value().clone())
    }

    pub fn by_id(&self, id: &str) -> Option<NetworkConfig> {
        self.networks
            .iter()
            .find(|n| n.value().id.eq_ignore_ascii_case(id))
            .map(|n| n.value().clone())
    }

    /// Look up by network id, or by chain id in hex or decimal form
    pub fn resolve(&self, key: &str) -> Option<NetworkConfig> {
        self.by_id(key)
            .or_else(|| parse_chain_id(key).and_then(|chain_id| self.get(chain_id)))
    }

    pub fn is_supported(&self, chain_id: u64) -> bool {
        self.networks.contains_key(&chain_id)
    }

    pub fn supported_chain_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.networks.iter().map(|n| *n.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// All networks ordered by chain id
    pub fn networks(&self) -> Vec<NetworkConfig> {
        let mut networks: Vec<NetworkConfig> =
            self.networks.iter().map(|n| n.value().clone()).collect();
        networks.sort_by_key(|n| n.chain_id);
        networks
    }

    pub fn active_endpoint(&self, chain_id: u64) -> Option<String> {
        self.networks
            .get(&chain_id)
            .map(|n| n.value().active_endpoint().to_string())
    }

    /// Put a user-supplied endpoint in front of the list and make it active
    pub fn apply_rpc_override(&self, network_id: &str, url: &str) -> Result<(), AppError> {
        let url = url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(AppError::Config(ConfigError::InvalidValue {
                key: format!("{network_id}.rpc_override"),
                value: url.to_string(),
            }));
        }

        let chain_id = self
            .by_id(network_id)
            .map(|n| n.chain_id)
            .ok_or_else(|| AppError::Config(ConfigError::InvalidNetwork {
                network: network_id.to_string(),
                message: "unknown network".to_string(),
            }))?;

        if let Some(mut network) = self.networks.get_mut(&chain_id) {
            network.rpc_endpoints.retain(|e| e != url);
            network.rpc_endpoints.insert(0, url.to_string());
            network.current_endpoint_index = 0;
            info!(network = %network_id, url = %url, "RPC override applied");
        }
        Ok(())
    }

    /// Restore the endpoint list the network was loaded with
    pub fn clear_rpc_override(&self, network_id: &str) {
        let Some(chain_id) = self.by_id(network_id).map(|n| n.chain_id) else {
            return;
        };
        let Some(defaults) = self.defaults.get(&chain_id).map(|d| d.value().clone()) else {
            return;
        };
        if let Some(mut network) = self.networks.get_mut(&chain_id) {
            network.rpc_endpoints = defaults;
            network.current_endpoint_index = 0;
            debug!(network = %network_id, "RPC override cleared");
        }
    }

    /// Advance the active endpoint, wrapping after the last one.
    /// Returns the new index and URL.
    pub(crate) fn rotate_endpoint(&self, chain_id: u64) -> Option<(usize, String)> {
        let mut network = self.networks.get_mut(&chain_id)?;
        let len = network.rpc_endpoints.len();
        if len == 0 {
            return None;
        }
        network.current_endpoint_index = (network.current_endpoint_index + 1) % len;
        let idx = network.current_endpoint_index;
        Some((idx, network.rpc_endpoints[idx].clone()))
    }
}

impl Default for NetworkRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn apply_env_overrides(mut network: NetworkConfig) -> NetworkConfig {
    let prefix = format!("VRF_DICE_{}", network.id.to_uppercase());

    if let Ok(urls) = env::var(format!("{prefix}_RPC_URLS")) {
        let urls: Vec<String> = urls
            .split(',')
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .collect();
        if urls.is_empty() {
            warn!(network = %network.id, "Empty RPC URL override ignored");
        } else {
            network.rpc_endpoints = urls;
            network.current_endpoint_index = 0;
        }
    }

    if let Ok(token) = env::var(format!("{prefix}_TOKEN_ADDRESS")) {
        network.contracts.token = token.trim().to_lowercase();
    }
    if let Ok(game) = env::var(format!("{prefix}_GAME_ADDRESS")) {
        network.contracts.game = game.trim().to_lowercase();
    }
    if let Ok(explorer) = env::var(format!("{prefix}_EXPLORER_URL")) {
        network.explorer_url = explorer.trim().to_string();
    }

    network
}
