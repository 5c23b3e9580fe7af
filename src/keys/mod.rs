//! Typed key material for the app, hardware and server spending factors.
mod descriptor_public_key;
mod spending_keys;

pub use descriptor_public_key::{DescriptorPublicKey, KeyOrigin, Wildcard};
pub use spending_keys::{
    AppSpendingKeypair, AppSpendingPrivateKey, AppSpendingPublicKey, ExtendedPrivateKey,
    F8eSpendingPublicKey, HwSpendingPublicKey, SpendingFactor, SpendingKey, SpendingPublicKey,
};
