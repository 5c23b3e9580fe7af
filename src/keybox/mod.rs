//! Spending keysets and the keybox that aggregates them for one full account.
mod consolidation;

pub use consolidation::{
    check_eligible_utxo_count, ConsolidationError, UtxoConsolidationParams,
    UtxoConsolidationType,
};

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::config::CoreConfig;
use crate::descriptor::{
    watching_change_descriptor, watching_receiving_descriptor, DescriptorError,
    WatchingDescriptor,
};
use crate::keys::{AppSpendingPublicKey, F8eSpendingPublicKey, HwSpendingPublicKey};
use crate::networks::{BitcoinNetworkType, F8eEnvironment};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyboxError {
    #[error("Active keyset '{0}' is not part of the keybox keysets")]
    ActiveKeysetMissing(String),
    #[error("Keyset '{local_id}' is for {actual}, keybox is for {expected}")]
    NetworkMismatch {
        local_id: String,
        expected: BitcoinNetworkType,
        actual: BitcoinNetworkType,
    },
}

/// Server-issued account identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FullAccountId(String);

impl FullAccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FullAccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The server's half of a keyset, as registered with F8e.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct F8eSpendingKeyset {
    pub keyset_id: String,
    pub spending_public_key: F8eSpendingPublicKey,
}

/// One generation of app, hardware and server spending keys. Never mutated; rotation
/// creates a new keyset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendingKeyset {
    pub local_id: String,
    pub f8e_spending_keyset: F8eSpendingKeyset,
    pub network_type: BitcoinNetworkType,
    pub app_key: AppSpendingPublicKey,
    pub hardware_key: HwSpendingPublicKey,
}

impl SpendingKeyset {
    pub fn keyset_id(&self) -> &str {
        &self.f8e_spending_keyset.keyset_id
    }

    pub fn server_key(&self) -> &F8eSpendingPublicKey {
        &self.f8e_spending_keyset.spending_public_key
    }

    pub fn receiving_descriptor(&self) -> Result<WatchingDescriptor, DescriptorError> {
        watching_receiving_descriptor(&self.app_key, &self.hardware_key, self.server_key())
    }

    pub fn change_descriptor(&self) -> Result<WatchingDescriptor, DescriptorError> {
        watching_change_descriptor(&self.app_key, &self.hardware_key, self.server_key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyboxConfig {
    pub network_type: BitcoinNetworkType,
    pub f8e_environment: F8eEnvironment,
}

impl From<&CoreConfig> for KeyboxConfig {
    fn from(config: &CoreConfig) -> Self {
        Self {
            network_type: config.network,
            f8e_environment: config.f8e_environment.clone(),
        }
    }
}

/// Compressed secp256k1 auth key, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthPublicKey(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppKeyBundle {
    pub local_id: String,
    pub spending_key: AppSpendingPublicKey,
    pub auth_key: AuthPublicKey,
    pub network_type: BitcoinNetworkType,
    pub recovery_auth_key: Option<AuthPublicKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HwKeyBundle {
    pub local_id: String,
    pub spending_key: HwSpendingPublicKey,
    pub auth_key: AuthPublicKey,
    pub network_type: BitcoinNetworkType,
}

/// Hardware signature over the app global auth key, binding the two identities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppGlobalAuthKeyHwSignature(pub String);

impl AppGlobalAuthKeyHwSignature {
    /// Placeholder used while recovering an orphaned key, before the hardware re-signs.
    pub fn orphaned_key_recovery() -> Self {
        Self(String::new())
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

/// Everything needed to construct a [`Keybox`]. Also the keybox's persisted form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyboxParts {
    pub local_id: String,
    pub config: KeyboxConfig,
    pub full_account_id: FullAccountId,
    pub active_spending_keyset: SpendingKeyset,
    pub active_app_key_bundle: AppKeyBundle,
    pub active_hw_key_bundle: HwKeyBundle,
    pub app_global_auth_key_hw_signature: AppGlobalAuthKeyHwSignature,
    /// Every keyset the account has had, oldest first. Must include the active one.
    pub keysets: Vec<SpendingKeyset>,
}

/// Persisted records are validated on load, the same as [`Keybox::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "KeyboxParts", into = "KeyboxParts")]
pub struct Keybox {
    local_id: String,
    config: KeyboxConfig,
    full_account_id: FullAccountId,
    active_spending_keyset: SpendingKeyset,
    active_app_key_bundle: AppKeyBundle,
    active_hw_key_bundle: HwKeyBundle,
    app_global_auth_key_hw_signature: AppGlobalAuthKeyHwSignature,
    keysets: Vec<SpendingKeyset>,
}

impl Keybox {
    pub fn new(parts: KeyboxParts) -> Result<Self, KeyboxError> {
        if parts.app_global_auth_key_hw_signature.is_blank() {
            error!(
                keybox = %parts.local_id,
                "keybox created with a blank app global auth key hw signature"
            );
        }
        Self::build(parts)
    }

    /// Builds a keybox whose hardware has not yet signed the app global auth key.
    pub fn for_orphaned_key_recovery(mut parts: KeyboxParts) -> Result<Self, KeyboxError> {
        parts.app_global_auth_key_hw_signature = AppGlobalAuthKeyHwSignature::orphaned_key_recovery();
        Self::build(parts)
    }

    fn build(parts: KeyboxParts) -> Result<Self, KeyboxError> {
        if !parts.keysets.contains(&parts.active_spending_keyset) {
            return Err(KeyboxError::ActiveKeysetMissing(
                parts.active_spending_keyset.local_id,
            ));
        }
        let expected = parts.config.network_type;
        if let Some(keyset) = parts.keysets.iter().find(|k| k.network_type != expected) {
            return Err(KeyboxError::NetworkMismatch {
                local_id: keyset.local_id.clone(),
                expected,
                actual: keyset.network_type,
            });
        }

        Ok(Self {
            local_id: parts.local_id,
            config: parts.config,
            full_account_id: parts.full_account_id,
            active_spending_keyset: parts.active_spending_keyset,
            active_app_key_bundle: parts.active_app_key_bundle,
            active_hw_key_bundle: parts.active_hw_key_bundle,
            app_global_auth_key_hw_signature: parts.app_global_auth_key_hw_signature,
            keysets: parts.keysets,
        })
    }

    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    pub fn config(&self) -> &KeyboxConfig {
        &self.config
    }

    pub fn full_account_id(&self) -> &FullAccountId {
        &self.full_account_id
    }

    pub fn active_spending_keyset(&self) -> &SpendingKeyset {
        &self.active_spending_keyset
    }

    pub fn active_app_key_bundle(&self) -> &AppKeyBundle {
        &self.active_app_key_bundle
    }

    pub fn active_hw_key_bundle(&self) -> &HwKeyBundle {
        &self.active_hw_key_bundle
    }

    pub fn app_global_auth_key_hw_signature(&self) -> &AppGlobalAuthKeyHwSignature {
        &self.app_global_auth_key_hw_signature
    }

    pub fn keysets(&self) -> &[SpendingKeyset] {
        &self.keysets
    }

    /// Keysets other than the active one, in the order they were created.
    pub fn inactive_keysets(&self) -> impl Iterator<Item = &SpendingKeyset> {
        self.keysets
            .iter()
            .filter(move |k| k.local_id != self.active_spending_keyset.local_id)
    }

    pub fn into_parts(self) -> KeyboxParts {
        KeyboxParts {
            local_id: self.local_id,
            config: self.config,
            full_account_id: self.full_account_id,
            active_spending_keyset: self.active_spending_keyset,
            active_app_key_bundle: self.active_app_key_bundle,
            active_hw_key_bundle: self.active_hw_key_bundle,
            app_global_auth_key_hw_signature: self.app_global_auth_key_hw_signature,
            keysets: self.keysets,
        }
    }
}

impl TryFrom<KeyboxParts> for Keybox {
    type Error = KeyboxError;

    fn try_from(parts: KeyboxParts) -> Result<Self, Self::Error> {
        Keybox::new(parts)
    }
}

impl From<Keybox> for KeyboxParts {
    fn from(keybox: Keybox) -> Self {
        keybox.into_parts()
    }
}
