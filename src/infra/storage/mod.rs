//! Advisory client-side persistence.
//!
//! Nothing stored here is authoritative: the session marker only decides
//! whether a silent reconnect is attempted, and RPC overrides and the preferred
//! network are re-validated against live reads before use.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::{AppError, SessionMarker, SessionStore};

const MARKER_KEY: &str = "session_marker";
const PREFERRED_NETWORK_KEY: &str = "preferred_network";
const RPC_OVERRIDE_PREFIX: &str = "rpc_override:";

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// Thread-safe in-memory store
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    store: DashMap<String, String>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load_marker(&self) -> Result<Option<SessionMarker>, AppError> {
        let Some(raw) = self.store.get(MARKER_KEY).map(|v| v.value().clone()) else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(marker) => Ok(Some(marker)),
            Err(e) => {
                warn!(error = %e, "Discarding unreadable session marker");
                self.store.remove(MARKER_KEY);
                Ok(None)
            }
        }
    }

    async fn save_marker(&self, marker: &SessionMarker) -> Result<(), AppError> {
        let raw = serde_json::to_string(marker).map_err(|e| AppError::Storage(e.to_string()))?;
        self.store.insert(MARKER_KEY.to_string(), raw);
        Ok(())
    }

    async fn clear_marker(&self) -> Result<(), AppError> {
        self.store.remove(MARKER_KEY);
        Ok(())
    }

    async fn rpc_override(&self, network_id: &str) -> Result<Option<String>, AppError> {
        Ok(self
            .store
            .get(&format!("{RPC_OVERRIDE_PREFIX}{network_id}"))
            .map(|v| v.value().clone()))
    }

    async fn set_rpc_override(
        &self,
        network_id: &str,
        url: Option<&str>,
    ) -> Result<(), AppError> {
        let key = format!("{RPC_OVERRIDE_PREFIX}{network_id}");
        match url {
            Some(url) => {
                self.store.insert(key, url.to_string());
            }
            None => {
                self.store.remove(&key);
            }
        }
        Ok(())
    }

    async fn preferred_network(&self) -> Result<Option<String>, AppError> {
        Ok(self
            .store
            .get(PREFERRED_NETWORK_KEY)
            .map(|v| v.value().clone()))
    }

    async fn set_preferred_network(&self, network_id: &str) -> Result<(), AppError> {
        self.store
            .insert(PREFERRED_NETWORK_KEY.to_string(), network_id.to_string());
        Ok(())
    }
}

// ============================================================================
// JSON FILE STORE
// ============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredPreferences {
    marker: Option<SessionMarker>,
    preferred_network: Option<String>,
    #[serde(default)]
    rpc_overrides: HashMap<String, String>,
}

/// Store persisting to a single JSON file; every write rewrites the file
#[derive(Debug)]
pub struct JsonFileSessionStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Path from `VRF_DICE_STATE_FILE`, if set
    pub fn from_env() -> Option<Self> {
        std::env::var("VRF_DICE_STATE_FILE")
            .ok()
            .filter(|p| !p.is_empty())
            .map(Self::new)
    }

    async fn read(&self) -> Result<StoredPreferences, AppError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(prefs) => Ok(prefs),
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "Corrupt preferences file, starting empty");
                    Ok(StoredPreferences::default())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoredPreferences::default()),
            Err(e) => Err(AppError::Storage(e.to_string())),
        }
    }

    async fn write(&self, prefs: &StoredPreferences) -> Result<(), AppError> {
        let bytes =
            serde_json::to_vec_pretty(prefs).map_err(|e| AppError::Storage(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| AppError::Storage(e.to_string()))?;
            }
        }
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;
        debug!(path = %self.path.display(), "Preferences saved");
        Ok(())
    }

    async fn update<F>(&self, apply: F) -> Result<(), AppError>
    where
        F: FnOnce(&mut StoredPreferences) + Send,
    {
        let _guard = self.lock.lock().await;
        let mut prefs = self.read().await?;
        apply(&mut prefs);
        self.write(&prefs).await
    }
}

#[async_trait]
impl SessionStore for JsonFileSessionStore {
    async fn load_marker(&self) -> Result<Option<SessionMarker>, AppError> {
        Ok(self.read().await?.marker)
    }

    async fn save_marker(&self, marker: &SessionMarker) -> Result<(), AppError> {
        let marker = marker.clone();
        self.update(move |prefs| prefs.marker = Some(marker)).await
    }

    async fn clear_marker(&self) -> Result<(), AppError> {
        self.update(|prefs| prefs.marker = None).await
    }

    async fn rpc_override(&self, network_id: &str) -> Result<Option<String>, AppError> {
        Ok(self.read().await?.rpc_overrides.remove(network_id))
    }

    async fn set_rpc_override(
        &self,
        network_id: &str,
        url: Option<&str>,
    ) -> Result<(), AppError> {
        let network_id = network_id.to_string();
        let url = url.map(str::to_string);
        self.update(move |prefs| match url {
            Some(url) => {
                prefs.rpc_overrides.insert(network_id, url);
            }
            None => {
                prefs.rpc_overrides.remove(&network_id);
            }
        })
        .await
    }

    async fn preferred_network(&self) -> Result<Option<String>, AppError> {
        Ok(self.read().await?.preferred_network)
    }

    async fn set_preferred_network(&self, network_id: &str) -> Result<(), AppError> {
        let network_id = network_id.to_string();
        self.update(move |prefs| prefs.preferred_network = Some(network_id))
            .await
    }
}
