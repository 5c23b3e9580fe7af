use std::str::FromStr;

use wasm_bindgen::prelude::*;

use crate::descriptor::{self, Scope};
use crate::error::WasmSpendingError;
use crate::keys::{
    AppSpendingPublicKey, DescriptorPublicKey, F8eSpendingPublicKey, HwSpendingPublicKey,
};
use crate::networks::BitcoinNetworkType;

fn scope(change: bool) -> Scope {
    if change {
        Scope::Internal
    } else {
        Scope::External
    }
}

fn parse_network(network: &str) -> Result<BitcoinNetworkType, WasmSpendingError> {
    BitcoinNetworkType::from_str(network).map_err(|e| WasmSpendingError::new(&e.to_string()))
}

fn parse_keys(
    app: &str,
    hardware: &str,
    server: &str,
) -> Result<
    (
        AppSpendingPublicKey,
        HwSpendingPublicKey,
        F8eSpendingPublicKey,
    ),
    WasmSpendingError,
> {
    Ok((
        AppSpendingPublicKey::from_str(app)?,
        HwSpendingPublicKey::from_str(hardware)?,
        F8eSpendingPublicKey::from_str(server)?,
    ))
}

/// Namespace for 2-of-3 spending descriptors
#[wasm_bindgen]
pub struct DescriptorNamespace;

#[wasm_bindgen]
impl DescriptorNamespace {
    /// Parse a descriptor public key and render it in canonical form.
    ///
    /// Hardened steps are written with `'` and the fingerprint in lowercase hex.
    #[wasm_bindgen(js_name = normalizeKey)]
    pub fn normalize_key(key: &str) -> Result<String, WasmSpendingError> {
        Ok(DescriptorPublicKey::from_str(key)?.to_canonical_string())
    }

    /// Insert the receiving (`/0`) or change (`/1`) step before the key's wildcard
    #[wasm_bindgen(js_name = withChain)]
    pub fn with_chain(key: &str, change: bool) -> Result<String, WasmSpendingError> {
        Ok(descriptor::with_chain(key, scope(change))?)
    }

    /// Build the watch-only descriptor for the given keys
    ///
    /// # Arguments
    /// * `app` - The app's spending public key
    /// * `hardware` - The hardware's spending public key
    /// * `server` - The server's spending public key
    /// * `change` - true for the change descriptor, false for receiving
    #[wasm_bindgen(js_name = watchingDescriptor)]
    pub fn watching_descriptor(
        app: &str,
        hardware: &str,
        server: &str,
        change: bool,
    ) -> Result<String, WasmSpendingError> {
        let (app, hardware, server) = parse_keys(app, hardware, server)?;
        let descriptor = descriptor::watching_descriptor(&app, &hardware, &server, scope(change))?;
        Ok(descriptor.as_str().to_string())
    }

    /// Derive the address at `index` of the receiving or change chain.
    #[wasm_bindgen(js_name = addressAt)]
    pub fn address_at(
        app: &str,
        hardware: &str,
        server: &str,
        change: bool,
        index: u32,
        network: &str,
    ) -> Result<String, WasmSpendingError> {
        let network = parse_network(network)?;
        let (app, hardware, server) = parse_keys(app, hardware, server)?;
        let descriptor = descriptor::watching_descriptor(&app, &hardware, &server, scope(change))?;
        Ok(descriptor.address_at(index, network)?.to_string())
    }
}
