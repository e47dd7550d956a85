//! Wallet provider adapters.

pub mod proxy;

use std::sync::{Arc, RwLock};
use tracing::info;

use crate::domain::{ProviderDiscovery, WalletProvider};

pub use proxy::{DISCONNECTED_CODE, ProxyWalletConfig, ProxyWalletProvider};

/// Discovery slot filled by whoever owns the injected provider
#[derive(Default)]
pub struct StaticProviderDiscovery {
    slot: RwLock<Option<Arc<dyn WalletProvider>>>,
}

impl StaticProviderDiscovery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_provider(provider: Arc<dyn WalletProvider>) -> Self {
        Self {
            slot: RwLock::new(Some(provider)),
        }
    }

    pub fn install(&self, provider: Arc<dyn WalletProvider>) {
        *self
            .slot
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(provider);
        info!("Wallet provider installed");
    }

    pub fn remove(&self) {
        *self
            .slot
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = None;
    }
}

impl ProviderDiscovery for StaticProviderDiscovery {
    fn discover(&self) -> Option<Arc<dyn WalletProvider>> {
        self.slot
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockWalletProvider;

    #[test]
    fn test_static_discovery_slot() {
        let discovery = StaticProviderDiscovery::new();
        assert!(discovery.discover().is_none());

        discovery.install(Arc::new(MockWalletProvider::new(51)));
        assert!(discovery.discover().is_some());

        discovery.remove();
        assert!(discovery.discover().is_none());
    }
}
