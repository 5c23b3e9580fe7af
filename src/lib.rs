//! Spending core for a 2-of-3 self-custody wallet.
//!
//! Pure Rust modules do the work; [`wasm`] exposes the pieces the JavaScript app needs.
pub mod config;
pub mod descriptor;
mod error;
pub mod fees;
pub mod frost;
pub mod keybox;
pub mod keys;
pub mod migration;
pub mod networks;
pub mod psbt;
pub mod signing;
pub mod store;
pub mod sweep;
#[cfg(test)]
mod test_utils;

// re-export bitcoin from the miniscript crate
pub use ::miniscript::bitcoin;

pub use error::WasmSpendingError;
pub use networks::{BitcoinNetworkType, F8eEnvironment};

pub mod wasm;
pub use wasm::{ConsolidationNamespace, DescriptorNamespace, FeeNamespace};
