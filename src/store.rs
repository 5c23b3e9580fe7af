//! Access to the device's encrypted key-value store.
//!
//! The store is injected as a [`SecureStore`] handle; typed wrappers decide the key layout
//! and encoding for each kind of secret.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::warn;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::keys::{
    AppSpendingPrivateKey, AppSpendingPublicKey, ExtendedPrivateKey, HwSpendingPublicKey,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Secure store unavailable: {0}")]
    Unavailable(String),
    #[error("Corrupt entry for '{key}': {reason}")]
    Corrupt { key: String, reason: String },
}

/// Raw byte storage backed by the platform keychain/keystore.
pub trait SecureStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Zeroizing<Vec<u8>>>, StoreError>;
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

impl<S: SecureStore + ?Sized> SecureStore for std::sync::Arc<S> {
    fn get(&self, key: &str) -> Result<Option<Zeroizing<Vec<u8>>>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }
}

/// Process-local store. Values are zeroized when overwritten or removed.
#[derive(Default)]
pub struct InMemorySecureStore {
    entries: Mutex<HashMap<String, Zeroizing<Vec<u8>>>>,
}

impl InMemorySecureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .map(|e| e.contains_key(key))
            .unwrap_or(false)
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, Zeroizing<Vec<u8>>>>, StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
    }
}

impl SecureStore for InMemorySecureStore {
    fn get(&self, key: &str) -> Result<Option<Zeroizing<Vec<u8>>>, StoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.lock()?
            .insert(key.to_string(), Zeroizing::new(value.to_vec()));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

fn decode<T: serde::de::DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T, StoreError> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

fn encode<T: Serialize>(key: &str, value: &T) -> Result<Zeroizing<Vec<u8>>, StoreError> {
    serde_json::to_vec(value)
        .map(Zeroizing::new)
        .map_err(|e| StoreError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })
}

/// App spending private keys, keyed by their public key.
pub struct AppPrivateKeyStore<S> {
    store: S,
}

impl<S: SecureStore> AppPrivateKeyStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn entry_key(public_key: &AppSpendingPublicKey) -> String {
        format!("app-spending-key:{}", public_key)
    }

    pub fn store_app_spending_key_pair(
        &self,
        public_key: &AppSpendingPublicKey,
        private_key: &AppSpendingPrivateKey,
    ) -> Result<(), StoreError> {
        let key = Self::entry_key(public_key);
        let bytes = encode(&key, &private_key.0)?;
        self.store.set(&key, &bytes)
    }

    pub fn get_app_spending_private_key(
        &self,
        public_key: &AppSpendingPublicKey,
    ) -> Result<Option<AppSpendingPrivateKey>, StoreError> {
        let key = Self::entry_key(public_key);
        match self.store.get(&key)? {
            Some(bytes) => Ok(Some(AppSpendingPrivateKey::new(decode::<ExtendedPrivateKey>(
                &key, &bytes,
            )?))),
            None => Ok(None),
        }
    }

    pub fn has_app_spending_private_key(
        &self,
        public_key: &AppSpendingPublicKey,
    ) -> Result<bool, StoreError> {
        Ok(self.store.get(&Self::entry_key(public_key))?.is_some())
    }

    pub fn remove_app_spending_key(
        &self,
        public_key: &AppSpendingPublicKey,
    ) -> Result<(), StoreError> {
        self.store.remove(&Self::entry_key(public_key))
    }
}

/// Server-side storage encryption key, in the clear and sealed by the hardware.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct MigrationSecrets {
    pub ssek: Vec<u8>,
    pub sealed_ssek: Vec<u8>,
}

impl std::fmt::Debug for MigrationSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationSecrets")
            .field("ssek", &"<redacted>")
            .field("sealed_ssek_len", &self.sealed_ssek.len())
            .finish()
    }
}

const PENDING_HW_KEY: &str = "private-wallet-migration:new-hw-spending-key";
const PENDING_SECRETS: &str = "private-wallet-migration:ssek";

/// Material created when a private-wallet migration starts and released when it ends.
pub struct MigrationSecretStore<S> {
    store: S,
}

impl<S: SecureStore> MigrationSecretStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Writes the pending hardware key and secrets. If either write fails, whatever was
    /// written is removed again before the error is returned.
    pub fn store_pending(
        &self,
        new_hw_key: &HwSpendingPublicKey,
        secrets: &MigrationSecrets,
    ) -> Result<(), StoreError> {
        let written = encode(PENDING_HW_KEY, new_hw_key)
            .and_then(|bytes| self.store.set(PENDING_HW_KEY, &bytes))
            .and_then(|()| encode(PENDING_SECRETS, secrets))
            .and_then(|bytes| self.store.set(PENDING_SECRETS, &bytes));
        if let Err(err) = written {
            if let Err(cleanup) = self.clear() {
                warn!(%cleanup, "failed to roll back partially stored migration secrets");
            }
            return Err(err);
        }
        Ok(())
    }

    pub fn pending_hw_key(&self) -> Result<Option<HwSpendingPublicKey>, StoreError> {
        match self.store.get(PENDING_HW_KEY)? {
            Some(bytes) => Ok(Some(decode(PENDING_HW_KEY, &bytes)?)),
            None => Ok(None),
        }
    }

    pub fn pending_secrets(&self) -> Result<Option<MigrationSecrets>, StoreError> {
        match self.store.get(PENDING_SECRETS)? {
            Some(bytes) => Ok(Some(decode(PENDING_SECRETS, &bytes)?)),
            None => Ok(None),
        }
    }

    /// Removes both entries, attempting the second even if the first removal fails.
    pub fn clear(&self) -> Result<(), StoreError> {
        let hw_key = self.store.remove(PENDING_HW_KEY);
        let secrets = self.store.remove(PENDING_SECRETS);
        hw_key.and(secrets)
    }
}
