use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::bitcoin::bip32::Xpriv;
use crate::descriptor::DescriptorError;
use crate::keys::DescriptorPublicKey;

/// Capability shared by every spending factor's public key.
pub trait SpendingKey {
    fn descriptor_key(&self) -> &DescriptorPublicKey;
}

/// The three factors that hold a share of spending authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpendingFactor {
    App,
    Hardware,
    Server,
}

macro_rules! spending_public_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub DescriptorPublicKey);

        impl $name {
            pub fn new(key: DescriptorPublicKey) -> Self {
                Self(key)
            }
        }

        impl SpendingKey for $name {
            fn descriptor_key(&self) -> &DescriptorPublicKey {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = crate::descriptor::DescriptorError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(DescriptorPublicKey::from_str(s)?))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

spending_public_key!(
    /// Spending public key held by the mobile app.
    AppSpendingPublicKey
);
spending_public_key!(
    /// Spending public key held by the hardware device.
    HwSpendingPublicKey
);
spending_public_key!(
    /// Spending public key held by the server co-signer (F8e).
    F8eSpendingPublicKey
);

/// A spending public key tagged with the factor that holds it.
///
/// Equality and hashing only consider the wrapped key, so the same key reported under
/// two different factors compares equal.
#[derive(Debug, Clone)]
pub enum SpendingPublicKey {
    App(AppSpendingPublicKey),
    Hardware(HwSpendingPublicKey),
    Server(F8eSpendingPublicKey),
}

impl SpendingPublicKey {
    pub fn factor(&self) -> SpendingFactor {
        match self {
            SpendingPublicKey::App(_) => SpendingFactor::App,
            SpendingPublicKey::Hardware(_) => SpendingFactor::Hardware,
            SpendingPublicKey::Server(_) => SpendingFactor::Server,
        }
    }
}

impl SpendingKey for SpendingPublicKey {
    fn descriptor_key(&self) -> &DescriptorPublicKey {
        match self {
            SpendingPublicKey::App(key) => key.descriptor_key(),
            SpendingPublicKey::Hardware(key) => key.descriptor_key(),
            SpendingPublicKey::Server(key) => key.descriptor_key(),
        }
    }
}

impl PartialEq for SpendingPublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.descriptor_key() == other.descriptor_key()
    }
}

impl Eq for SpendingPublicKey {}

impl Hash for SpendingPublicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.descriptor_key().hash(state)
    }
}

impl From<AppSpendingPublicKey> for SpendingPublicKey {
    fn from(key: AppSpendingPublicKey) -> Self {
        SpendingPublicKey::App(key)
    }
}

impl From<HwSpendingPublicKey> for SpendingPublicKey {
    fn from(key: HwSpendingPublicKey) -> Self {
        SpendingPublicKey::Hardware(key)
    }
}

impl From<F8eSpendingPublicKey> for SpendingPublicKey {
    fn from(key: F8eSpendingPublicKey) -> Self {
        SpendingPublicKey::Server(key)
    }
}

/// BIP32 extended private key and the mnemonic it was generated from.
///
/// Only ever stored in the local secure store. `Debug` never prints the key material.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct ExtendedPrivateKey {
    xprv: String,
    mnemonic: String,
}

impl ExtendedPrivateKey {
    pub fn new(xprv: String, mnemonic: String) -> Self {
        Self { xprv, mnemonic }
    }

    pub fn xprv(&self) -> &str {
        &self.xprv
    }

    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    pub fn to_xpriv(&self) -> Result<Xpriv, DescriptorError> {
        Xpriv::from_str(&self.xprv).map_err(|e| DescriptorError::InvalidXprv(e.to_string()))
    }
}

impl fmt::Debug for ExtendedPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendedPrivateKey")
            .field("xprv", &"<redacted>")
            .field("mnemonic", &"<redacted>")
            .finish()
    }
}

/// The app factor's spending private key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSpendingPrivateKey(pub ExtendedPrivateKey);

impl AppSpendingPrivateKey {
    pub fn new(key: ExtendedPrivateKey) -> Self {
        Self(key)
    }

    /// The key as it appears inside a spending descriptor, before a chain is chosen.
    pub fn descriptor_key(&self) -> Zeroizing<String> {
        Zeroizing::new(format!("{}/*", self.0.xprv()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSpendingKeypair {
    pub public_key: AppSpendingPublicKey,
    pub private_key: AppSpendingPrivateKey,
}
