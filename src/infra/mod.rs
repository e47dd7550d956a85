//! Infrastructure layer implementations.

pub mod evm;
pub mod network;
pub mod rpc;
pub mod storage;
pub mod wallet;

pub use evm::EvmContractBackend;
pub use network::NetworkRegistry;
pub use rpc::{
    FailoverConfig, HealthCheckConfig, HttpRpcHealthChecker, JsonRpcHttpClient, RpcFailover,
};
pub use storage::{JsonFileSessionStore, MemorySessionStore};
pub use wallet::{ProxyWalletConfig, ProxyWalletProvider, StaticProviderDiscovery};
