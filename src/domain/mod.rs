//! Domain layer containing core types, traits, and error definitions.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{
    AppError, ConfigError, ContractError, ProviderError, RpcError, UNRECOGNIZED_CHAIN_CODE,
    USER_REJECTED_CODE,
};
pub use traits::{
    ContractBackend, EndpointProbe, GameContract, ProviderDiscovery, SessionStore, TokenContract,
    WalletProvider,
};
pub use types::{
    AddChainParams, BetRecord, ContractAddresses, ContractBindings, ContractStats, EndpointHealth,
    GameSnapshot, GameStatus, LoadingFlag, NativeCurrency, NetworkConfig, PollKey, ProviderEvent,
    SessionMarker, SessionPhase, SessionState, Severity, Toast,
};
