//! Network argument type for CLI commands

use clap::ValueEnum;
use wasm_spending_core::BitcoinNetworkType;

/// CLI argument type for network selection
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum NetworkArg {
    Bitcoin,
    Testnet,
    Signet,
    Regtest,
}

impl From<NetworkArg> for BitcoinNetworkType {
    fn from(arg: NetworkArg) -> Self {
        match arg {
            NetworkArg::Bitcoin => BitcoinNetworkType::Bitcoin,
            NetworkArg::Testnet => BitcoinNetworkType::Testnet,
            NetworkArg::Signet => BitcoinNetworkType::Signet,
            NetworkArg::Regtest => BitcoinNetworkType::Regtest,
        }
    }
}
