//! EVM contract access over JSON-RPC.

pub mod abi;
pub mod contracts;

pub use contracts::{EvmContractBackend, EvmGameContract, EvmTokenContract};
