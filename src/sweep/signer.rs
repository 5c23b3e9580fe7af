use std::collections::HashMap;

use tracing::{debug, info};

use super::{Sweep, SweepPsbt, SweepSignaturePlan};
use crate::bitcoin::Txid;
use crate::keybox::FullAccountId;
use crate::networks::F8eEnvironment;
use crate::psbt::Psbt;
use crate::signing::{AppSignError, AppSpendingWalletSigner, NetworkingError, SpendingSigningService};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SweepSignError {
    #[error("App signing failed: {0}")]
    App(#[from] AppSignError),
    #[error("No hardware-signed PSBT supplied for {0}")]
    MissingHardwareSignature(Txid),
    #[error("Server signing with keyset '{keyset_id}' failed: {source}")]
    Server {
        keyset_id: String,
        #[source]
        source: NetworkingError,
    },
    #[error("Signed PSBT {actual} does not match sweep PSBT {expected}")]
    TransactionMismatch { expected: Txid, actual: Txid },
}

/// Drives every PSBT of a sweep through its signature plan and the server co-signer.
pub struct SweepSigner<A, V> {
    app_signer: A,
    server: V,
    f8e_environment: F8eEnvironment,
    full_account_id: FullAccountId,
}

impl<A: AppSpendingWalletSigner, V: SpendingSigningService> SweepSigner<A, V> {
    pub fn new(
        app_signer: A,
        server: V,
        f8e_environment: F8eEnvironment,
        full_account_id: FullAccountId,
    ) -> Self {
        Self {
            app_signer,
            server,
            f8e_environment,
            full_account_id,
        }
    }

    /// Signs one member. `hw_signed` must be the hardware-signed PSBT when the plan is
    /// [`SweepSignaturePlan::HardwareAndServer`] and is ignored otherwise.
    pub async fn sign_member(
        &self,
        member: &SweepPsbt,
        hw_signed: Option<&Psbt>,
    ) -> Result<Psbt, SweepSignError> {
        let expected = member.psbt.id;
        let first_signature = match member.signature_plan {
            SweepSignaturePlan::AppAndServer => self
                .app_signer
                .sign_psbt(&member.psbt, &member.source_keyset.app_key)?,
            SweepSignaturePlan::HardwareAndServer => {
                hw_signed
                    .cloned()
                    .ok_or(SweepSignError::MissingHardwareSignature(expected))?
            }
        };
        check_id(expected, &first_signature)?;

        let keyset_id = member.source_keyset.keyset_id();
        let signed = self
            .server
            .sign_with_specific_keyset(
                &self.f8e_environment,
                &self.full_account_id,
                keyset_id,
                &first_signature,
                None,
            )
            .await
            .map_err(|source| SweepSignError::Server {
                keyset_id: keyset_id.to_string(),
                source,
            })?;
        check_id(expected, &signed)?;

        debug!(psbt = %expected, keyset = keyset_id, plan = ?member.signature_plan, "signed sweep psbt");
        Ok(signed)
    }

    /// Signs every member in order, stopping at the first failure.
    pub async fn sign_sweep(
        &self,
        sweep: &Sweep,
        hw_signed: &HashMap<Txid, Psbt>,
    ) -> Result<Vec<Psbt>, SweepSignError> {
        let mut signed = Vec::with_capacity(sweep.unsigned_psbts().len());
        for member in sweep.unsigned_psbts() {
            signed.push(self.sign_member(member, hw_signed.get(&member.psbt.id)).await?);
        }
        info!(psbts = signed.len(), "sweep fully signed");
        Ok(signed)
    }
}

fn check_id(expected: Txid, psbt: &Psbt) -> Result<(), SweepSignError> {
    if psbt.id != expected {
        return Err(SweepSignError::TransactionMismatch {
            expected,
            actual: psbt.id,
        });
    }
    Ok(())
}
