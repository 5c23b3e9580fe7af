use wasm_bindgen::prelude::*;

use crate::error::WasmSpendingError;
use crate::keybox::check_eligible_utxo_count;

/// Namespace for UTXO consolidation checks
#[wasm_bindgen]
pub struct ConsolidationNamespace;

#[wasm_bindgen]
impl ConsolidationNamespace {
    /// Fails unless there is more than one eligible UTXO to consolidate.
    #[wasm_bindgen(js_name = checkEligibleUtxoCount)]
    pub fn check_eligible_utxo_count(count: u32) -> Result<(), WasmSpendingError> {
        Ok(check_eligible_utxo_count(count as usize)?)
    }
}
