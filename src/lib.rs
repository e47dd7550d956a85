//! Client-side state synchronization engine for a VRF-resolved on-chain dice game.
//!
//! Layers:
//! - [`domain`]: types, traits and the error taxonomy
//! - [`infra`]: JSON-RPC, EVM contract access, wallet bridge, persistence
//! - [`app`]: session state machine, network switching, polling, recovery
//!   tracking and notifications, bundled by [`app::SyncEngine`]

pub mod app;
pub mod config;
pub mod domain;
pub mod infra;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
