//! Sweeps move funds out of inactive keysets into the active one.
//!
//! Each PSBT in a sweep is tagged with the pair of factors that must sign it. Keysets whose
//! app key is still in the secure store are signed by app and server; keysets from before an
//! app-key rotation need the hardware instead.
mod signer;

pub use signer::{SweepSignError, SweepSigner};

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bitcoin::{Address, Amount};
use crate::descriptor::DescriptorError;
use crate::fees::FeePolicy;
use crate::keybox::{Keybox, SpendingKeyset};
use crate::psbt::Psbt;
use crate::store::{AppPrivateKeyStore, SecureStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SweepError {
    #[error("A sweep needs at least one PSBT")]
    Empty,
    #[error("Sweep PSBTs pay to different destinations: {expected} and {found}")]
    MixedDestinations { expected: String, found: String },
    #[error("Keyset '{0}' is active and cannot be swept")]
    SourceIsActiveKeyset(String),
    #[error("Failed to generate sweep PSBTs: {0}")]
    Generation(String),
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SweepSignaturePlan {
    AppAndServer,
    HardwareAndServer,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SweepPsbt {
    pub psbt: Psbt,
    pub signature_plan: SweepSignaturePlan,
    pub source_keyset: SpendingKeyset,
    pub destination_address: Address,
}

/// A non-empty set of sweep PSBTs that all pay to one destination.
#[derive(Debug, Clone, PartialEq)]
pub struct Sweep {
    unsigned_psbts: Vec<SweepPsbt>,
}

impl Sweep {
    /// PSBTs with the same txid are kept once.
    pub fn new(unsigned_psbts: impl IntoIterator<Item = SweepPsbt>) -> Result<Self, SweepError> {
        let mut seen = HashSet::new();
        let unsigned_psbts: Vec<SweepPsbt> = unsigned_psbts
            .into_iter()
            .filter(|p| seen.insert(p.psbt.id))
            .collect();

        let first = unsigned_psbts.first().ok_or(SweepError::Empty)?;
        if let Some(other) = unsigned_psbts
            .iter()
            .find(|p| p.destination_address != first.destination_address)
        {
            return Err(SweepError::MixedDestinations {
                expected: first.destination_address.to_string(),
                found: other.destination_address.to_string(),
            });
        }

        Ok(Self { unsigned_psbts })
    }

    pub fn unsigned_psbts(&self) -> &[SweepPsbt] {
        &self.unsigned_psbts
    }

    pub fn psbts_requiring_hw_sign(&self) -> Vec<&SweepPsbt> {
        self.unsigned_psbts
            .iter()
            .filter(|p| p.signature_plan == SweepSignaturePlan::HardwareAndServer)
            .collect()
    }

    pub fn total_fee_amount(&self) -> Amount {
        self.unsigned_psbts.iter().map(|p| p.psbt.fee.amount).sum()
    }

    pub fn destination_address(&self) -> &Address {
        &self.unsigned_psbts[0].destination_address
    }
}

/// A sweep PSBT built by the wallet engine, before it is assigned a signature plan.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSweepPsbt {
    pub psbt: Psbt,
    pub source_keyset: SpendingKeyset,
    pub destination_address: Address,
}

/// Builds one PSBT per keyset that still holds funds, paying into `destination`.
#[async_trait]
pub trait SweepGenerator: Send + Sync {
    async fn generate_sweep_psbts(
        &self,
        source_keysets: &[SpendingKeyset],
        destination: &SpendingKeyset,
        fee_policy: Option<&FeePolicy>,
    ) -> Result<Vec<PreparedSweepPsbt>, SweepError>;
}

pub struct SweepPlanner<S, G> {
    keys: AppPrivateKeyStore<S>,
    generator: G,
}

impl<S: SecureStore, G: SweepGenerator> SweepPlanner<S, G> {
    pub fn new(keys: AppPrivateKeyStore<S>, generator: G) -> Self {
        Self { keys, generator }
    }

    pub fn signature_plan(&self, keyset: &SpendingKeyset) -> Result<SweepSignaturePlan, SweepError> {
        if self.keys.has_app_spending_private_key(&keyset.app_key)? {
            Ok(SweepSignaturePlan::AppAndServer)
        } else {
            Ok(SweepSignaturePlan::HardwareAndServer)
        }
    }

    /// Returns `None` when no inactive keyset has funds to move.
    pub async fn prepare_sweep(
        &self,
        keybox: &Keybox,
        fee_policy: Option<&FeePolicy>,
    ) -> Result<Option<Sweep>, SweepError> {
        let active = keybox.active_spending_keyset();
        let sources: Vec<SpendingKeyset> = keybox.inactive_keysets().cloned().collect();
        if sources.is_empty() {
            debug!(keybox = keybox.local_id(), "no inactive keysets to sweep");
            return Ok(None);
        }

        let prepared = self
            .generator
            .generate_sweep_psbts(&sources, active, fee_policy)
            .await?;
        if prepared.is_empty() {
            debug!(keybox = keybox.local_id(), "inactive keysets hold no funds");
            return Ok(None);
        }

        let mut members = Vec::with_capacity(prepared.len());
        for p in prepared {
            if p.source_keyset.local_id == active.local_id {
                return Err(SweepError::SourceIsActiveKeyset(p.source_keyset.local_id));
            }
            let signature_plan = self.signature_plan(&p.source_keyset)?;
            debug!(
                psbt = %p.psbt.id,
                keyset = %p.source_keyset.local_id,
                ?signature_plan,
                "classified sweep psbt"
            );
            members.push(SweepPsbt {
                psbt: p.psbt,
                signature_plan,
                source_keyset: p.source_keyset,
                destination_address: p.destination_address,
            });
        }

        let sweep = Sweep::new(members)?;
        info!(
            psbts = sweep.unsigned_psbts().len(),
            requiring_hw = sweep.psbts_requiring_hw_sign().len(),
            total_fee = %sweep.total_fee_amount(),
            "prepared sweep"
        );
        Ok(Some(sweep))
    }
}
