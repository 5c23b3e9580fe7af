//! Deterministic keys, keysets and PSBTs shared by unit tests.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use miniscript::psbt::PsbtExt;

use crate::bitcoin::bip32::{DerivationPath, Fingerprint, Xpriv, Xpub};
use crate::bitcoin::hashes::{sha256, Hash};
use crate::bitcoin::secp256k1::Secp256k1;
use crate::bitcoin::{
    absolute, psbt, transaction, Amount, Network, OutPoint, ScriptBuf, Sequence, Transaction,
    TxIn, TxOut, Txid, WScriptHash, Witness,
};
use crate::fees::{Fee, FeePolicy, FeeRate};
use crate::keybox::{
    AppGlobalAuthKeyHwSignature, AppKeyBundle, AuthPublicKey, F8eSpendingKeyset, FullAccountId,
    HwKeyBundle, KeyboxConfig, KeyboxParts, SpendingKeyset,
};
use crate::keys::{
    AppSpendingPrivateKey, AppSpendingPublicKey, DescriptorPublicKey, ExtendedPrivateKey,
    F8eSpendingPublicKey, HwSpendingPublicKey, KeyOrigin, Wildcard,
};
use crate::networks::{BitcoinNetworkType, F8eEnvironment};
use crate::psbt::Psbt;
use crate::store::{InMemorySecureStore, SecureStore, StoreError};
use crate::sweep::{PreparedSweepPsbt, SweepError, SweepGenerator};

pub const TEST_NETWORK: BitcoinNetworkType = BitcoinNetworkType::Signet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestFactor {
    App,
    Hardware,
    Server,
}

impl TestFactor {
    pub fn seed(&self) -> &'static str {
        match self {
            TestFactor::App => "app",
            TestFactor::Hardware => "hardware",
            TestFactor::Server => "server",
        }
    }
}

pub fn get_xpriv_from_seed(seed: &str) -> Xpriv {
    let seed_hash = sha256::Hash::hash(seed.as_bytes()).to_byte_array();
    Xpriv::new_master(Network::Testnet, &seed_hash).expect("could not create xpriv from seed")
}

pub fn account_path() -> DerivationPath {
    DerivationPath::from_str("m/84'/1'/0'").unwrap()
}

fn seeded_fingerprint(seed: &str) -> Fingerprint {
    get_xpriv_from_seed(seed).fingerprint(&Secp256k1::new())
}

fn seeded_account_xpub(seed: &str) -> Xpub {
    let secp = Secp256k1::new();
    let account = get_xpriv_from_seed(seed)
        .derive_priv(&secp, &account_path())
        .unwrap();
    Xpub::from_priv(&secp, &account)
}

/// `[fp/84'/1'/0']tpub.../*` for the master key derived from `seed`.
pub fn seeded_descriptor_key(seed: &str) -> DescriptorPublicKey {
    DescriptorPublicKey::new(
        KeyOrigin {
            fingerprint: seeded_fingerprint(seed),
            derivation_path: account_path(),
        },
        seeded_account_xpub(seed),
        DerivationPath::master(),
        Wildcard::Unhardened,
    )
    .unwrap()
}

fn seeded_app_private_key(seed: &str) -> AppSpendingPrivateKey {
    AppSpendingPrivateKey::new(ExtendedPrivateKey::new(
        get_xpriv_from_seed(seed).to_string(),
        format!("{} mnemonic", seed),
    ))
}

pub fn master_fingerprint(factor: TestFactor) -> Fingerprint {
    seeded_fingerprint(factor.seed())
}

pub fn account_xpub(factor: TestFactor) -> Xpub {
    seeded_account_xpub(factor.seed())
}

/// Master tprv for `factor`.
pub fn xprv_string(factor: TestFactor) -> String {
    get_xpriv_from_seed(factor.seed()).to_string()
}

pub fn descriptor_key(factor: TestFactor) -> DescriptorPublicKey {
    seeded_descriptor_key(factor.seed())
}

pub fn app_public_key() -> AppSpendingPublicKey {
    AppSpendingPublicKey::new(descriptor_key(TestFactor::App))
}

pub fn hw_public_key() -> HwSpendingPublicKey {
    HwSpendingPublicKey::new(descriptor_key(TestFactor::Hardware))
}

pub fn server_public_key() -> F8eSpendingPublicKey {
    F8eSpendingPublicKey::new(descriptor_key(TestFactor::Server))
}

/// A keyset whose keys are all derived from `local_id`, so distinct ids give distinct keys.
pub fn spending_keyset(local_id: &str) -> SpendingKeyset {
    SpendingKeyset {
        local_id: local_id.to_string(),
        f8e_spending_keyset: F8eSpendingKeyset {
            keyset_id: format!("{}-f8e", local_id),
            spending_public_key: F8eSpendingPublicKey::new(seeded_descriptor_key(&format!(
                "{}/server",
                local_id
            ))),
        },
        network_type: TEST_NETWORK,
        app_key: AppSpendingPublicKey::new(seeded_descriptor_key(&format!("{}/app", local_id))),
        hardware_key: HwSpendingPublicKey::new(seeded_descriptor_key(&format!(
            "{}/hardware",
            local_id
        ))),
    }
}

/// The app private key matching `spending_keyset(local_id).app_key`.
pub fn keyset_app_private_key(local_id: &str) -> AppSpendingPrivateKey {
    seeded_app_private_key(&format!("{}/app", local_id))
}

pub fn keybox_config() -> KeyboxConfig {
    KeyboxConfig {
        network_type: TEST_NETWORK,
        f8e_environment: F8eEnvironment::Local,
    }
}

/// Parts of a keybox whose only keyset is `spending_keyset("active")`.
pub fn keybox_parts() -> KeyboxParts {
    let active = spending_keyset("active");
    KeyboxParts {
        local_id: "keybox".to_string(),
        config: keybox_config(),
        full_account_id: FullAccountId::new("urn:wallet-account:test"),
        active_app_key_bundle: AppKeyBundle {
            local_id: "app-bundle".to_string(),
            spending_key: active.app_key.clone(),
            auth_key: AuthPublicKey("02".repeat(33)),
            network_type: TEST_NETWORK,
            recovery_auth_key: None,
        },
        active_hw_key_bundle: HwKeyBundle {
            local_id: "hw-bundle".to_string(),
            spending_key: active.hardware_key.clone(),
            auth_key: AuthPublicKey("03".repeat(33)),
            network_type: TEST_NETWORK,
        },
        app_global_auth_key_hw_signature: AppGlobalAuthKeyHwSignature("3044".to_string()),
        keysets: vec![active.clone()],
        active_spending_keyset: active,
    }
}

fn build_psbt(
    input_script: ScriptBuf,
    input_sats: u64,
    output_script: ScriptBuf,
    output_sats: u64,
    variant: u8,
) -> psbt::Psbt {
    let tx = Transaction {
        version: transaction::Version::TWO,
        lock_time: absolute::LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint {
                txid: Txid::from_byte_array([variant; 32]),
                vout: 0,
            },
            script_sig: ScriptBuf::new(),
            sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
            witness: Witness::new(),
        }],
        output: vec![TxOut {
            value: Amount::from_sat(output_sats),
            script_pubkey: output_script,
        }],
    };
    let mut psbt = psbt::Psbt::from_unsigned_tx(tx).unwrap();
    psbt.inputs[0].witness_utxo = Some(TxOut {
        value: Amount::from_sat(input_sats),
        script_pubkey: input_script,
    });
    psbt
}

/// One-input, one-output PSBT over placeholder P2WSH scripts. `variant` changes the txid.
pub fn unsigned_psbt(input_sats: u64, output_sats: u64, variant: u8) -> psbt::Psbt {
    build_psbt(
        ScriptBuf::new_p2wsh(&WScriptHash::from_byte_array([1; 32])),
        input_sats,
        ScriptBuf::new_p2wsh(&WScriptHash::from_byte_array([2; 32])),
        output_sats,
        variant,
    )
}

/// PSBT spending receive index 0 of `keyset`, with witness script and key origins filled in
/// the way the wallet engine would.
pub fn keyset_psbt(
    keyset: &SpendingKeyset,
    input_sats: u64,
    output_sats: u64,
    variant: u8,
) -> psbt::Psbt {
    let descriptor = keyset
        .receiving_descriptor()
        .unwrap()
        .to_miniscript()
        .unwrap()
        .at_derivation_index(0)
        .unwrap();
    let change = keyset.change_descriptor().unwrap().script_pubkey_at(0).unwrap();
    let mut psbt = build_psbt(
        descriptor.script_pubkey(),
        input_sats,
        change,
        output_sats,
        variant,
    );
    psbt.update_input_with_descriptor(0, &descriptor).unwrap();
    psbt
}

/// Sweep generator that returns a fixed set of PSBTs regardless of the request.
pub struct FixedSweepGenerator {
    pub psbts: Vec<PreparedSweepPsbt>,
}

#[async_trait]
impl SweepGenerator for FixedSweepGenerator {
    async fn generate_sweep_psbts(
        &self,
        _source_keysets: &[SpendingKeyset],
        _destination: &SpendingKeyset,
        _fee_policy: Option<&FeePolicy>,
    ) -> Result<Vec<PreparedSweepPsbt>, SweepError> {
        Ok(self.psbts.clone())
    }
}

/// A prepared sweep PSBT out of `spending_keyset(local_id)` paying `fee_sats`.
pub fn prepared_sweep_psbt(local_id: &str, fee_sats: u64, variant: u8) -> PreparedSweepPsbt {
    let fee = Fee::new(Amount::from_sat(fee_sats), FeeRate::new(2.0).unwrap());
    PreparedSweepPsbt {
        psbt: Psbt::from_psbt(unsigned_psbt(10_000, 10_000 - fee_sats, variant), Some(fee))
            .unwrap(),
        source_keyset: spending_keyset(local_id),
        destination_address: spending_keyset("active")
            .receiving_descriptor()
            .unwrap()
            .address_at(0, TEST_NETWORK)
            .unwrap(),
    }
}

/// In-memory store that can be told to fail a given `set` call or every `remove`.
#[derive(Default)]
pub struct FailingSecureStore {
    inner: InMemorySecureStore,
    sets: AtomicUsize,
    fail_set_at: AtomicUsize,
    fail_removes: AtomicBool,
}

impl FailingSecureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the `n`th `set` call from now on (1-based). `0` disables.
    pub fn fail_nth_set(&self, n: usize) {
        self.sets.store(0, Ordering::SeqCst);
        self.fail_set_at.store(n, Ordering::SeqCst);
    }

    pub fn fail_removes(&self, fail: bool) {
        self.fail_removes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl SecureStore for FailingSecureStore {
    fn get(&self, key: &str) -> Result<Option<zeroize::Zeroizing<Vec<u8>>>, StoreError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let call = self.sets.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_set_at.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("disk full".to_string()));
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        if self.fail_removes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("keychain locked".to_string()));
        }
        self.inner.remove(key)
    }
}

#[test]
fn test_seeded_keys_are_distinct() {
    assert_ne!(app_public_key().0, hw_public_key().0);
    assert_ne!(spending_keyset("a").app_key, spending_keyset("b").app_key);
    assert_eq!(
        master_fingerprint(TestFactor::App),
        app_public_key().0.origin().fingerprint
    );
}
