//! Bitcoin network and server environment selection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The bitcoin network a keyset or keybox lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BitcoinNetworkType {
    Bitcoin,
    Testnet,
    Signet,
    Regtest,
}

impl BitcoinNetworkType {
    pub const ALL: [BitcoinNetworkType; 4] = [
        BitcoinNetworkType::Bitcoin,
        BitcoinNetworkType::Testnet,
        BitcoinNetworkType::Signet,
        BitcoinNetworkType::Regtest,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BitcoinNetworkType::Bitcoin => "bitcoin",
            BitcoinNetworkType::Testnet => "testnet",
            BitcoinNetworkType::Signet => "signet",
            BitcoinNetworkType::Regtest => "regtest",
        }
    }

    pub fn from_name(name: &str) -> Option<BitcoinNetworkType> {
        BitcoinNetworkType::ALL
            .iter()
            .copied()
            .find(|n| n.name() == name)
    }

    pub fn is_mainnet(&self) -> bool {
        matches!(self, BitcoinNetworkType::Bitcoin)
    }

    /// BIP44 coin type used in origin derivation paths (`84'/{coin}'/0'`).
    pub fn coin_type(&self) -> u32 {
        if self.is_mainnet() {
            0
        } else {
            1
        }
    }
}

impl fmt::Display for BitcoinNetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown network '{0}'. Expected one of: bitcoin, testnet, signet, regtest")]
pub struct NetworkParseError(pub String);

impl FromStr for BitcoinNetworkType {
    type Err = NetworkParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BitcoinNetworkType::from_name(s).ok_or_else(|| NetworkParseError(s.to_string()))
    }
}

impl From<BitcoinNetworkType> for crate::bitcoin::Network {
    fn from(network: BitcoinNetworkType) -> Self {
        match network {
            BitcoinNetworkType::Bitcoin => crate::bitcoin::Network::Bitcoin,
            BitcoinNetworkType::Testnet => crate::bitcoin::Network::Testnet,
            BitcoinNetworkType::Signet => crate::bitcoin::Network::Signet,
            BitcoinNetworkType::Regtest => crate::bitcoin::Network::Regtest,
        }
    }
}

/// Server (F8e) deployment an account talks to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum F8eEnvironment {
    Production,
    Staging,
    Development,
    Local,
    Custom(String),
}

impl F8eEnvironment {
    pub fn url(&self) -> &str {
        match self {
            F8eEnvironment::Production => "https://api.bitkey.world",
            F8eEnvironment::Staging => "https://api.bitkeystaging.com",
            F8eEnvironment::Development => "https://api.dev.wallet.build",
            F8eEnvironment::Local => "http://localhost:8080",
            F8eEnvironment::Custom(url) => url,
        }
    }
}

impl fmt::Display for F8eEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            F8eEnvironment::Production => write!(f, "production"),
            F8eEnvironment::Staging => write!(f, "staging"),
            F8eEnvironment::Development => write!(f, "development"),
            F8eEnvironment::Local => write!(f, "local"),
            F8eEnvironment::Custom(url) => write!(f, "custom({})", url),
        }
    }
}
