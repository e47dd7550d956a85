//! Test helpers, compiled for unit tests and behind the `test-utils` feature.

pub mod mocks;

pub use mocks::{
    MockConfig, MockContractBackend, MockEndpointProbe, MockGameContract, MockTokenContract,
    MockWalletProvider, SwitchBehavior,
};
