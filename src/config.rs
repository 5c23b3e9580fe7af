//! Runtime configuration for the spending core.
//!
//! Configuration is supplied by the host application as JSON:
//!
//! ```json
//! {
//!   "network": "signet",
//!   "f8eEnvironment": "staging",
//!   "featureFlags": { "privateWalletMigration": true }
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::networks::{BitcoinNetworkType, F8eEnvironment};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Feature flags that gate optional flows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlags {
    /// Allows migrating a 2-of-3 multisig wallet to a FROST private wallet.
    #[serde(default)]
    pub private_wallet_migration: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreConfig {
    pub network: BitcoinNetworkType,
    pub f8e_environment: F8eEnvironment,
    #[serde(default)]
    pub feature_flags: FeatureFlags,
}

impl CoreConfig {
    pub fn new(network: BitcoinNetworkType, f8e_environment: F8eEnvironment) -> Self {
        Self {
            network,
            f8e_environment,
            feature_flags: FeatureFlags::default(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_feature_flags(mut self, feature_flags: FeatureFlags) -> Self {
        self.feature_flags = feature_flags;
        self
    }
}
