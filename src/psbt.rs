//! PSBTs as they move between the wallet engine, the signers and the server.

use base64::prelude::BASE64_STANDARD;
use base64::Engine;

use crate::bitcoin::{psbt, Amount, Txid};
use crate::fees::Fee;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PsbtError {
    #[error("Invalid base64: {0}")]
    Base64(String),
    #[error("Failed to decode PSBT: {0}")]
    Decode(String),
    #[error("Cannot compute fee: {0}")]
    Fee(String),
    #[error("Output value overflow")]
    OutputValueOverflow,
    #[error("PSBT {actual} does not match transaction {expected}")]
    TransactionMismatch { expected: Txid, actual: Txid },
}

/// A PSBT together with the values the wallet engine reported for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Psbt {
    /// Txid of the unsigned transaction. Stable across signing rounds.
    pub id: Txid,
    pub base64: String,
    pub fee: Fee,
    pub base_size: u64,
    pub num_of_inputs: usize,
    /// Sum of all output values.
    pub amount: Amount,
    inner: psbt::Psbt,
}

impl Psbt {
    /// Wraps a decoded PSBT. When `fee` is `None` it is computed from the input UTXOs.
    pub fn from_psbt(inner: psbt::Psbt, fee: Option<Fee>) -> Result<Self, PsbtError> {
        let tx = &inner.unsigned_tx;
        let vsize = tx.vsize() as u64;
        let fee = match fee {
            Some(fee) => fee,
            None => {
                let amount = inner.fee().map_err(|e| PsbtError::Fee(e.to_string()))?;
                Fee::from_amount_and_vsize(amount, vsize)
                    .map_err(|e| PsbtError::Fee(e.to_string()))?
            }
        };
        let amount = tx
            .output
            .iter()
            .try_fold(Amount::ZERO, |total, output| total.checked_add(output.value))
            .ok_or(PsbtError::OutputValueOverflow)?;

        Ok(Self {
            id: tx.compute_txid(),
            base64: BASE64_STANDARD.encode(inner.serialize()),
            fee,
            base_size: tx.base_size() as u64,
            num_of_inputs: tx.input.len(),
            amount,
            inner,
        })
    }

    pub fn from_base64(base64: &str, fee: Option<Fee>) -> Result<Self, PsbtError> {
        let bytes = BASE64_STANDARD
            .decode(base64.trim())
            .map_err(|e| PsbtError::Base64(e.to_string()))?;
        let inner = psbt::Psbt::deserialize(&bytes).map_err(|e| PsbtError::Decode(e.to_string()))?;
        Self::from_psbt(inner, fee)
    }

    /// Replaces the PSBT contents with a newer signing round of the same transaction.
    pub fn with_signed(&self, signed: psbt::Psbt) -> Result<Self, PsbtError> {
        let actual = signed.unsigned_tx.compute_txid();
        if actual != self.id {
            return Err(PsbtError::TransactionMismatch {
                expected: self.id,
                actual,
            });
        }
        Self::from_psbt(signed, Some(self.fee))
    }

    /// Like [`Psbt::with_signed`], for a PSBT returned as base64.
    pub fn with_signed_base64(&self, base64: &str) -> Result<Self, PsbtError> {
        let signed = Self::from_base64(base64, Some(self.fee))?;
        self.with_signed(signed.inner)
    }

    pub fn inner(&self) -> &psbt::Psbt {
        &self.inner
    }

    pub fn into_inner(self) -> psbt::Psbt {
        self.inner
    }
}
