//! 2-of-3 sorted multisig descriptors over the app, hardware and server spending keys.
//!
//! Descriptors are rendered as `wsh(sortedmulti(2,<app>,<hardware>,<server>))` with each
//! key ending in `/0/*` (receiving) or `/1/*` (change). The wallet engine consumes this
//! exact text, so no whitespace or checksum is added.

use std::fmt;
use std::str::FromStr;

use miniscript::Descriptor;
use zeroize::Zeroizing;

use crate::bitcoin::{Address, ScriptBuf};
use crate::keys::{
    AppSpendingPrivateKey, AppSpendingPublicKey, F8eSpendingPublicKey, HwSpendingPublicKey,
};
use crate::networks::BitcoinNetworkType;

/// Signatures required to spend from a keyset. Not configurable.
pub const SPENDING_THRESHOLD: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    #[error("Descriptor key has no key origin")]
    MissingOrigin,
    #[error("Unsupported descriptor key: {0}")]
    UnsupportedKey(String),
    #[error("Hardened derivation step after an xpub")]
    HardenedDerivation,
    #[error("Invalid extended private key: {0}")]
    InvalidXprv(String),
    #[error("Descriptor key has no wildcard step")]
    MissingWildcard,
    #[error("Miniscript error: {0}")]
    Miniscript(String),
    #[error("Address derivation failed: {0}")]
    Address(String),
}

/// Whether a descriptor is for receiving (external) or change (internal) addresses.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Scope {
    /// Receiving chain, child index 0.
    External,
    /// Change chain, child index 1.
    Internal,
}

impl Scope {
    pub const fn child(&self) -> u32 {
        match self {
            Scope::External => 0,
            Scope::Internal => 1,
        }
    }
}

const WILDCARDS: [&str; 3] = ["/*", "/*h", "/*'"];

/// Rewrites the trailing wildcard of `key` to `/<chain>/<wildcard>`.
///
/// Keys that already end with the chain step are returned unchanged, so applying this
/// twice is the same as applying it once.
pub fn with_chain(key: &str, scope: Scope) -> Result<String, DescriptorError> {
    let child = scope.child();
    for wildcard in WILDCARDS {
        let target = format!("/{}{}", child, wildcard);
        if key.ends_with(&target) {
            return Ok(key.to_string());
        }
        if let Some(base) = key.strip_suffix(wildcard) {
            return Ok(format!("{}{}", base, target));
        }
    }
    Err(DescriptorError::MissingWildcard)
}

fn sorted_multi(keys: [&str; 3]) -> String {
    format!(
        "wsh(sortedmulti({},{},{},{}))",
        SPENDING_THRESHOLD, keys[0], keys[1], keys[2]
    )
}

/// Descriptor that includes the app's extended private key.
///
/// Only handed to the local wallet engine; `Debug` does not print it.
#[derive(Clone, PartialEq, Eq)]
pub struct SpendingDescriptor(Zeroizing<String>);

impl SpendingDescriptor {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SpendingDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpendingDescriptor(<redacted>)")
    }
}

/// Descriptor over public keys only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchingDescriptor(String);

impl WatchingDescriptor {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_miniscript(
        &self,
    ) -> Result<Descriptor<miniscript::DescriptorPublicKey>, DescriptorError> {
        Descriptor::<miniscript::DescriptorPublicKey>::from_str(&self.0)
            .map_err(|e| DescriptorError::Miniscript(e.to_string()))
    }

    pub fn script_pubkey_at(&self, index: u32) -> Result<ScriptBuf, DescriptorError> {
        let derived = self
            .to_miniscript()?
            .at_derivation_index(index)
            .map_err(|e| DescriptorError::Address(e.to_string()))?;
        Ok(derived.script_pubkey())
    }

    pub fn address_at(
        &self,
        index: u32,
        network: BitcoinNetworkType,
    ) -> Result<Address, DescriptorError> {
        let derived = self
            .to_miniscript()?
            .at_derivation_index(index)
            .map_err(|e| DescriptorError::Address(e.to_string()))?;
        derived
            .address(network.into())
            .map_err(|e| DescriptorError::Address(e.to_string()))
    }
}

impl fmt::Display for WatchingDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn spending_descriptor(
    app_private_key: &AppSpendingPrivateKey,
    hardware_key: &HwSpendingPublicKey,
    server_key: &F8eSpendingPublicKey,
    scope: Scope,
) -> Result<SpendingDescriptor, DescriptorError> {
    let app = Zeroizing::new(with_chain(&app_private_key.descriptor_key(), scope)?);
    let hardware = with_chain(&hardware_key.to_string(), scope)?;
    let server = with_chain(&server_key.to_string(), scope)?;
    Ok(SpendingDescriptor(Zeroizing::new(sorted_multi([
        app.as_str(),
        hardware.as_str(),
        server.as_str(),
    ]))))
}

pub fn watching_descriptor(
    app_public_key: &AppSpendingPublicKey,
    hardware_key: &HwSpendingPublicKey,
    server_key: &F8eSpendingPublicKey,
    scope: Scope,
) -> Result<WatchingDescriptor, DescriptorError> {
    let app = with_chain(&app_public_key.to_string(), scope)?;
    let hardware = with_chain(&hardware_key.to_string(), scope)?;
    let server = with_chain(&server_key.to_string(), scope)?;
    Ok(WatchingDescriptor(sorted_multi([
        app.as_str(),
        hardware.as_str(),
        server.as_str(),
    ])))
}

pub fn spending_receiving_descriptor(
    app_private_key: &AppSpendingPrivateKey,
    hardware_key: &HwSpendingPublicKey,
    server_key: &F8eSpendingPublicKey,
) -> Result<SpendingDescriptor, DescriptorError> {
    spending_descriptor(app_private_key, hardware_key, server_key, Scope::External)
}

pub fn spending_change_descriptor(
    app_private_key: &AppSpendingPrivateKey,
    hardware_key: &HwSpendingPublicKey,
    server_key: &F8eSpendingPublicKey,
) -> Result<SpendingDescriptor, DescriptorError> {
    spending_descriptor(app_private_key, hardware_key, server_key, Scope::Internal)
}

pub fn watching_receiving_descriptor(
    app_public_key: &AppSpendingPublicKey,
    hardware_key: &HwSpendingPublicKey,
    server_key: &F8eSpendingPublicKey,
) -> Result<WatchingDescriptor, DescriptorError> {
    watching_descriptor(app_public_key, hardware_key, server_key, Scope::External)
}

pub fn watching_change_descriptor(
    app_public_key: &AppSpendingPublicKey,
    hardware_key: &HwSpendingPublicKey,
    server_key: &F8eSpendingPublicKey,
) -> Result<WatchingDescriptor, DescriptorError> {
    watching_descriptor(app_public_key, hardware_key, server_key, Scope::Internal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::ExtendedPrivateKey;
    use crate::test_utils::{
        app_public_key, hw_public_key, server_public_key, xprv_string, TestFactor,
    };
    use rstest::rstest;

    fn placeholder_app_key() -> AppSpendingPrivateKey {
        AppSpendingPrivateKey::new(ExtendedPrivateKey::new(
            "xprv123".to_string(),
            String::new(),
        ))
    }

    #[rstest]
    #[case("xprv123/*", Scope::External, "xprv123/0/*")]
    #[case("xprv123/*", Scope::Internal, "xprv123/1/*")]
    #[case("xprv123/0/*", Scope::External, "xprv123/0/*")]
    #[case("xprv123/1/*", Scope::Internal, "xprv123/1/*")]
    #[case("[a0a76f7a/84'/0'/0']xpub/*h", Scope::External, "[a0a76f7a/84'/0'/0']xpub/0/*h")]
    #[case("xprv123/0/*", Scope::Internal, "xprv123/0/1/*")]
    fn test_with_chain(#[case] key: &str, #[case] scope: Scope, #[case] expected: &str) {
        assert_eq!(with_chain(key, scope).unwrap(), expected);
    }

    #[rstest]
    #[case(Scope::External)]
    #[case(Scope::Internal)]
    fn test_with_chain_idempotent(#[case] scope: Scope) {
        let key = hw_public_key().to_string();
        let once = with_chain(&key, scope).unwrap();
        let twice = with_chain(&once, scope).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_with_chain_rejects_missing_wildcard() {
        assert_eq!(
            with_chain("xprv123", Scope::External),
            Err(DescriptorError::MissingWildcard)
        );
        assert_eq!(
            with_chain("[a0a76f7a/84'/0'/0']xpub/0", Scope::Internal),
            Err(DescriptorError::MissingWildcard)
        );
    }

    #[test]
    fn test_spending_receiving_descriptor() {
        let hw = hw_public_key();
        let server = server_public_key();
        let descriptor =
            spending_receiving_descriptor(&placeholder_app_key(), &hw, &server).unwrap();

        let expected = format!(
            "wsh(sortedmulti(2,xprv123/0/*,{},{}))",
            with_chain(&hw.to_string(), Scope::External).unwrap(),
            with_chain(&server.to_string(), Scope::External).unwrap(),
        );
        assert_eq!(descriptor.as_str(), expected);
        assert!(!descriptor.as_str().contains(' '));
        assert!(descriptor.as_str().contains("]tpub"));
    }

    #[test]
    fn test_spending_change_descriptor() {
        let descriptor = spending_change_descriptor(
            &placeholder_app_key(),
            &hw_public_key(),
            &server_public_key(),
        )
        .unwrap();
        assert!(descriptor.as_str().starts_with("wsh(sortedmulti(2,xprv123/1/*,["));
        assert_eq!(descriptor.as_str().matches("/1/*").count(), 3);
    }

    #[test]
    fn test_spending_descriptor_debug_is_redacted() {
        let descriptor = spending_receiving_descriptor(
            &placeholder_app_key(),
            &hw_public_key(),
            &server_public_key(),
        )
        .unwrap();
        assert!(!format!("{:?}", descriptor).contains("xprv123"));
    }

    #[test]
    fn test_spending_descriptor_with_real_xprv_parses() {
        let app = AppSpendingPrivateKey::new(ExtendedPrivateKey::new(
            xprv_string(TestFactor::App),
            String::new(),
        ));
        let descriptor =
            spending_receiving_descriptor(&app, &hw_public_key(), &server_public_key()).unwrap();
        let secp = crate::bitcoin::secp256k1::Secp256k1::new();
        let (parsed, key_map) = Descriptor::parse_descriptor(&secp, descriptor.as_str()).unwrap();
        assert_eq!(key_map.len(), 1);
        assert!(parsed.has_wildcard());
    }

    #[test]
    fn test_watching_descriptors_parse_and_differ() {
        let receiving =
            watching_receiving_descriptor(&app_public_key(), &hw_public_key(), &server_public_key())
                .unwrap();
        let change =
            watching_change_descriptor(&app_public_key(), &hw_public_key(), &server_public_key())
                .unwrap();

        assert!(receiving.to_miniscript().is_ok());
        assert!(change.to_miniscript().is_ok());

        let receive_address = receiving
            .address_at(0, BitcoinNetworkType::Signet)
            .unwrap();
        let change_address = change.address_at(0, BitcoinNetworkType::Signet).unwrap();
        assert_ne!(receive_address, change_address);
        assert!(receive_address.to_string().starts_with("tb1q"));
    }

    #[test]
    fn test_key_order_does_not_change_script() {
        let a = watching_receiving_descriptor(
            &app_public_key(),
            &hw_public_key(),
            &server_public_key(),
        )
        .unwrap();
        let b = watching_receiving_descriptor(
            &AppSpendingPublicKey::new(server_public_key().0),
            &hw_public_key(),
            &F8eSpendingPublicKey::new(app_public_key().0),
        )
        .unwrap();
        assert_ne!(a.as_str(), b.as_str());
        assert_eq!(a.script_pubkey_at(7).unwrap(), b.script_pubkey_at(7).unwrap());
    }

    #[test]
    fn test_mainnet_address() {
        let descriptor = watching_receiving_descriptor(
            &app_public_key(),
            &hw_public_key(),
            &server_public_key(),
        )
        .unwrap();
        let address = descriptor.address_at(0, BitcoinNetworkType::Bitcoin).unwrap();
        assert!(address.to_string().starts_with("bc1q"));
    }
}
