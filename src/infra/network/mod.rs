//! Supported network table.

pub mod registry;

pub use registry::{
    NetworkRegistry, XDC_APOTHEM_CHAIN_ID, XDC_MAINNET_CHAIN_ID, xdc_apothem, xdc_mainnet,
};
