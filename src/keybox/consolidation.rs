use serde::{Deserialize, Serialize};

use crate::bitcoin::{Address, Amount};
use crate::fees::EstimatedTransactionPriority;
use crate::psbt::Psbt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsolidationError {
    #[error("Consolidation needs more than one eligible UTXO, got {0}")]
    NotEnoughUtxos(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UtxoConsolidationType {
    /// Merge every confirmed UTXO into one output.
    ConsolidateAll,
    /// Merge only the UTXOs above the wallet's max UTXO count.
    ExceedsMaxUtxoCount,
}

/// Everything the consolidation flow shows the user before asking for confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct UtxoConsolidationParams {
    pub consolidation_type: UtxoConsolidationType,
    pub target_address: Address,
    eligible_utxo_count: usize,
    pub balance: Amount,
    pub consolidation_cost: Amount,
    pub app_signed_psbt: Psbt,
    pub transaction_priority: EstimatedTransactionPriority,
    pub wallet_has_unconfirmed_utxos: bool,
    pub wallet_exceeds_max_utxo_count: bool,
    pub max_utxo_count: usize,
}

impl UtxoConsolidationParams {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        consolidation_type: UtxoConsolidationType,
        target_address: Address,
        eligible_utxo_count: usize,
        balance: Amount,
        consolidation_cost: Amount,
        app_signed_psbt: Psbt,
        transaction_priority: EstimatedTransactionPriority,
        wallet_has_unconfirmed_utxos: bool,
        wallet_exceeds_max_utxo_count: bool,
        max_utxo_count: usize,
    ) -> Result<Self, ConsolidationError> {
        check_eligible_utxo_count(eligible_utxo_count)?;
        Ok(Self {
            consolidation_type,
            target_address,
            eligible_utxo_count,
            balance,
            consolidation_cost,
            app_signed_psbt,
            transaction_priority,
            wallet_has_unconfirmed_utxos,
            wallet_exceeds_max_utxo_count,
            max_utxo_count,
        })
    }

    pub fn eligible_utxo_count(&self) -> usize {
        self.eligible_utxo_count
    }
}

/// Fails unless there are at least two UTXOs to merge.
pub fn check_eligible_utxo_count(count: usize) -> Result<(), ConsolidationError> {
    if count <= 1 {
        return Err(ConsolidationError::NotEnoughUtxos(count));
    }
    Ok(())
}
