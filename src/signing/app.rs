use std::collections::BTreeMap;

use tracing::debug;

use crate::bitcoin::psbt::{SigningKeys, SigningKeysMap};
use crate::bitcoin::secp256k1::Secp256k1;
use crate::descriptor::DescriptorError;
use crate::keys::AppSpendingPublicKey;
use crate::psbt::{Psbt, PsbtError};
use crate::store::{AppPrivateKeyStore, SecureStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppSignError {
    #[error("No app private key stored for {0}")]
    MissingPrivateKey(String),
    #[error("Stored app private key is invalid: {0}")]
    InvalidPrivateKey(DescriptorError),
    #[error("App key does not sign any input")]
    NoInputsSigned,
    #[error("Failed to sign input(s): {0}")]
    Signing(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Psbt(#[from] PsbtError),
}

/// Adds the app factor's signature to a PSBT.
pub trait AppSpendingWalletSigner: Send + Sync {
    fn sign_psbt(&self, psbt: &Psbt, app_key: &AppSpendingPublicKey) -> Result<Psbt, AppSignError>;
}

/// Signs with the app private key found in the secure store for `app_key`.
pub struct KeyStoreAppSigner<S> {
    keys: AppPrivateKeyStore<S>,
}

impl<S: SecureStore> KeyStoreAppSigner<S> {
    pub fn new(keys: AppPrivateKeyStore<S>) -> Self {
        Self { keys }
    }

    pub fn key_store(&self) -> &AppPrivateKeyStore<S> {
        &self.keys
    }
}

fn signed_input_count(map: &SigningKeysMap) -> usize {
    map.values()
        .filter(|keys| match keys {
            SigningKeys::Ecdsa(keys) => !keys.is_empty(),
            SigningKeys::Schnorr(keys) => !keys.is_empty(),
        })
        .count()
}

impl<S: SecureStore> AppSpendingWalletSigner for KeyStoreAppSigner<S> {
    fn sign_psbt(&self, psbt: &Psbt, app_key: &AppSpendingPublicKey) -> Result<Psbt, AppSignError> {
        let private_key = self
            .keys
            .get_app_spending_private_key(app_key)?
            .ok_or_else(|| AppSignError::MissingPrivateKey(app_key.to_string()))?;
        let xpriv = private_key
            .0
            .to_xpriv()
            .map_err(AppSignError::InvalidPrivateKey)?;

        let secp = Secp256k1::new();
        let mut inner = psbt.inner().clone();
        let signed = inner.sign(&xpriv, &secp).map_err(|(_, errors)| {
            let errors: BTreeMap<usize, String> = errors
                .into_iter()
                .map(|(index, e)| (index, e.to_string()))
                .collect();
            AppSignError::Signing(format!("{:?}", errors))
        })?;

        let count = signed_input_count(&signed);
        if count == 0 {
            return Err(AppSignError::NoInputsSigned);
        }
        debug!(psbt = %psbt.id, inputs = count, "app signed psbt");
        Ok(psbt.with_signed(inner)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{AppSpendingPrivateKey, ExtendedPrivateKey};
    use crate::store::InMemorySecureStore;
    use crate::test_utils::{keyset_app_private_key, keyset_psbt, spending_keyset};

    fn signer_with_key(local_id: &str) -> KeyStoreAppSigner<InMemorySecureStore> {
        let keys = AppPrivateKeyStore::new(InMemorySecureStore::new());
        keys.store_app_spending_key_pair(
            &spending_keyset(local_id).app_key,
            &keyset_app_private_key(local_id),
        )
        .unwrap();
        KeyStoreAppSigner::new(keys)
    }

    #[test]
    fn test_signs_with_stored_key() {
        let keyset = spending_keyset("active");
        let psbt = Psbt::from_psbt(keyset_psbt(&keyset, 60_000, 59_000, 3), None).unwrap();
        let signer = signer_with_key("active");

        let signed = signer.sign_psbt(&psbt, &keyset.app_key).unwrap();
        assert_eq!(signed.id, psbt.id);
        assert_eq!(signed.fee, psbt.fee);
        assert_eq!(signed.inner().inputs[0].partial_sigs.len(), 1);
        assert_ne!(signed.base64, psbt.base64);
    }

    #[test]
    fn test_missing_key() {
        let keyset = spending_keyset("active");
        let psbt = Psbt::from_psbt(keyset_psbt(&keyset, 60_000, 59_000, 3), None).unwrap();
        let signer = KeyStoreAppSigner::new(AppPrivateKeyStore::new(InMemorySecureStore::new()));
        assert!(matches!(
            signer.sign_psbt(&psbt, &keyset.app_key),
            Err(AppSignError::MissingPrivateKey(_))
        ));
    }

    #[test]
    fn test_key_from_other_keyset_signs_nothing() {
        let keyset = spending_keyset("active");
        let psbt = Psbt::from_psbt(keyset_psbt(&keyset, 60_000, 59_000, 3), None).unwrap();
        let signer = signer_with_key("old");
        let old_app_key = spending_keyset("old").app_key;
        assert_eq!(
            signer.sign_psbt(&psbt, &old_app_key),
            Err(AppSignError::NoInputsSigned)
        );
    }

    #[test]
    fn test_corrupt_stored_key() {
        let keyset = spending_keyset("active");
        let psbt = Psbt::from_psbt(keyset_psbt(&keyset, 60_000, 59_000, 3), None).unwrap();
        let keys = AppPrivateKeyStore::new(InMemorySecureStore::new());
        keys.store_app_spending_key_pair(
            &keyset.app_key,
            &AppSpendingPrivateKey::new(ExtendedPrivateKey::new(
                "xprv123".to_string(),
                String::new(),
            )),
        )
        .unwrap();
        assert!(matches!(
            KeyStoreAppSigner::new(keys).sign_psbt(&psbt, &keyset.app_key),
            Err(AppSignError::InvalidPrivateKey(DescriptorError::InvalidXprv(_)))
        ));
    }
}
