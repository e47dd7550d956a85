//! Error taxonomy for the synchronization engine.

use thiserror::Error;

use super::types::Severity;

/// EIP-1193 code returned when the user declines a wallet prompt.
pub const USER_REJECTED_CODE: i64 = 4001;

/// EIP-1193 code returned when the wallet does not know the requested chain.
pub const UNRECOGNIZED_CHAIN_CODE: i64 = 4902;

/// Raw error reported by a wallet provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("provider error {code}: {message}")]
pub struct ProviderError {
    pub code: i64,
    pub message: String,
}

impl ProviderError {
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn user_rejected() -> Self {
        Self::new(USER_REJECTED_CODE, "User rejected the request")
    }

    #[must_use]
    pub fn unrecognized_chain(chain_id: u64) -> Self {
        Self::new(
            UNRECOGNIZED_CHAIN_CODE,
            format!("Unrecognized chain ID 0x{chain_id:x}"),
        )
    }

    pub fn is_user_rejection(&self) -> bool {
        self.code == USER_REJECTED_CODE
    }

    /// Some wallets wrap 4902 inside an internal error, so the message is checked too.
    pub fn is_unrecognized_chain(&self) -> bool {
        self.code == UNRECOGNIZED_CHAIN_CODE
            || self.message.to_lowercase().contains("unrecognized chain")
    }
}

/// JSON-RPC transport errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RpcError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error("JSON-RPC error {code}: {message}")]
    JsonRpc { code: i64, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Contract-level read errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContractError {
    #[error("Call reverted: {0}")]
    Reverted(String),

    #[error("ABI decode failed: {0}")]
    Decode(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

/// Configuration errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid network configuration for {network}: {message}")]
    InvalidNetwork { network: String, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Top-level application error
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AppError {
    #[error("No wallet provider available")]
    ProviderUnavailable,

    #[error("Request rejected in wallet")]
    UserRejected,

    #[error("Unsupported network (chain id {0})")]
    UnsupportedNetwork(u64),

    #[error("Network switch to chain {chain_id} not confirmed within {timeout_secs}s")]
    NetworkSwitchTimeout { chain_id: u64, timeout_secs: u64 },

    #[error("Contract binding failed on chain {chain_id} at {address}: {reason}")]
    ContractBindingFailed {
        chain_id: u64,
        address: String,
        reason: String,
    },

    #[error("RPC unhealthy on chain {chain_id}: {reason}")]
    RpcUnhealthy { chain_id: u64, reason: String },

    #[error("Recovery not yet eligible ({seconds_remaining}s remaining)")]
    RecoveryNotYetEligible { seconds_remaining: u64 },

    #[error("Wallet returned no accounts")]
    NoAccounts,

    #[error(transparent)]
    Provider(ProviderError),

    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Contract error: {0}")]
    Contract(#[from] ContractError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Operation not supported: {0}")]
    NotSupported(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        Self::from_provider(err)
    }
}

impl AppError {
    /// Wraps a provider error, folding a 4001 into [`AppError::UserRejected`].
    pub fn from_provider(err: ProviderError) -> Self {
        if err.is_user_rejection() {
            Self::UserRejected
        } else {
            Self::Provider(err)
        }
    }

    /// Toast severity for this failure class.
    pub fn severity(&self) -> Severity {
        match self {
            Self::UserRejected
            | Self::UnsupportedNetwork(_)
            | Self::NetworkSwitchTimeout { .. }
            | Self::RecoveryNotYetEligible { .. }
            | Self::NoAccounts
            | Self::Cancelled => Severity::Warning,
            Self::ProviderUnavailable
            | Self::ContractBindingFailed { .. }
            | Self::RpcUnhealthy { .. }
            | Self::Provider(_)
            | Self::Rpc(_)
            | Self::Contract(_)
            | Self::Config(_)
            | Self::Storage(_)
            | Self::NotSupported(_) => Severity::Error,
        }
    }

    /// User-facing message. One message per failure class so the notifier can
    /// collapse repeats.
    pub fn user_message(&self) -> String {
        match self {
            Self::ProviderUnavailable => {
                "No wallet found. Install a browser wallet to continue.".to_string()
            }
            Self::UserRejected => "Request rejected in wallet".to_string(),
            Self::UnsupportedNetwork(_) => {
                "Unsupported network. Please switch to a supported network.".to_string()
            }
            Self::NetworkSwitchTimeout { .. } => {
                "Network switch timed out. Please switch network manually in your wallet."
                    .to_string()
            }
            Self::ContractBindingFailed { .. } => {
                "Game contracts are not available on this network".to_string()
            }
            Self::RpcUnhealthy { .. } => "All RPC endpoints are unreachable".to_string(),
            Self::RecoveryNotYetEligible { seconds_remaining } => {
                format!("Recovery available in {}", format_countdown(*seconds_remaining))
            }
            Self::NoAccounts => "No account available in wallet".to_string(),
            Self::Cancelled => "Operation cancelled".to_string(),
            Self::Provider(e) => format!("Wallet error: {}", e.message),
            Self::Rpc(_) => "Network request failed".to_string(),
            Self::Contract(_) => "Failed to read game contract".to_string(),
            Self::Config(_) => "Invalid network configuration".to_string(),
            Self::Storage(_) => "Failed to save preferences".to_string(),
            Self::NotSupported(op) => format!("Not supported: {op}"),
        }
    }

    /// True when the failure leaves `contracts` null.
    pub fn clears_contracts(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedNetwork(_)
                | Self::NetworkSwitchTimeout { .. }
                | Self::ContractBindingFailed { .. }
                | Self::RpcUnhealthy { .. }
        )
    }
}

/// Renders seconds as `"MMm SSs"` or `"SSs"`.
pub fn format_countdown(seconds: u64) -> String {
    if seconds >= 60 {
        format!("{}m {:02}s", seconds / 60, seconds % 60)
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_rejection_folds() {
        let err = AppError::from_provider(ProviderError::user_rejected());
        assert_eq!(err, AppError::UserRejected);
        assert_eq!(err.severity(), Severity::Warning);
        assert_eq!(AppError::from(ProviderError::user_rejected()), AppError::UserRejected);
    }

    #[test]
    fn test_other_provider_errors_are_kept() {
        let err = AppError::from_provider(ProviderError::new(-32603, "Internal error"));
        assert!(matches!(err, AppError::Provider(ref e) if e.code == -32603));
        assert_eq!(err.severity(), Severity::Error);
    }

    #[test]
    fn test_unrecognized_chain_detection() {
        assert!(ProviderError::unrecognized_chain(51).is_unrecognized_chain());
        assert!(
            ProviderError::new(-32603, "Unrecognized chain ID \"0x33\". Try adding the chain")
                .is_unrecognized_chain()
        );
        assert!(!ProviderError::user_rejected().is_unrecognized_chain());
    }

    #[test]
    fn test_user_message_is_stable_per_class() {
        assert_eq!(
            AppError::UnsupportedNetwork(1).user_message(),
            AppError::UnsupportedNetwork(137).user_message()
        );
    }

    #[test]
    fn test_clears_contracts() {
        assert!(AppError::UnsupportedNetwork(1).clears_contracts());
        assert!(!AppError::UserRejected.clears_contracts());
    }

    #[test]
    fn test_format_countdown() {
        assert_eq!(format_countdown(5), "5s");
        assert_eq!(format_countdown(125), "2m 05s");
    }
}
