use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

use crate::bitcoin::Amount;
use crate::error::WasmSpendingError;
use crate::fees::{Fee, FeePolicy, FeeRate, FeeRateError, FeeTarget};

/// Fee policy as passed from JavaScript, e.g. `{ type: "rate", satsPerVbyte: 5 }`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FeePolicyInput {
    #[serde(rename_all = "camelCase")]
    Absolute { amount_sats: u64, sats_per_vbyte: f64 },
    #[serde(rename_all = "camelCase")]
    Rate { sats_per_vbyte: f64 },
    MinRelayRate,
}

impl TryFrom<FeePolicyInput> for FeePolicy {
    type Error = FeeRateError;

    fn try_from(input: FeePolicyInput) -> Result<Self, Self::Error> {
        Ok(match input {
            FeePolicyInput::Absolute {
                amount_sats,
                sats_per_vbyte,
            } => FeePolicy::Absolute(Fee::new(
                Amount::from_sat(amount_sats),
                FeeRate::new(sats_per_vbyte)?,
            )),
            FeePolicyInput::Rate { sats_per_vbyte } => {
                FeePolicy::Rate(FeeRate::new(sats_per_vbyte)?)
            }
            FeePolicyInput::MinRelayRate => FeePolicy::MinRelayRate,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FeeTargetOutput {
    #[serde(rename_all = "camelCase")]
    Absolute { amount_sats: u64 },
    #[serde(rename_all = "camelCase")]
    Rate { sat_per_kwu: u64 },
}

impl From<FeeTarget> for FeeTargetOutput {
    fn from(target: FeeTarget) -> Self {
        match target {
            FeeTarget::Absolute(amount) => FeeTargetOutput::Absolute {
                amount_sats: amount.to_sat(),
            },
            FeeTarget::Rate(rate) => FeeTargetOutput::Rate {
                sat_per_kwu: rate.to_sat_per_kwu(),
            },
        }
    }
}

fn policy_from_js(policy: JsValue) -> Result<Option<FeePolicy>, WasmSpendingError> {
    if policy.is_null() || policy.is_undefined() {
        return Ok(None);
    }
    let input: FeePolicyInput = serde_wasm_bindgen::from_value(policy)?;
    Ok(Some(FeePolicy::try_from(input)?))
}

/// Namespace for fee policy resolution
#[wasm_bindgen]
pub struct FeeNamespace;

#[wasm_bindgen]
impl FeeNamespace {
    /// Resolve a fee policy into what the transaction builder applies.
    ///
    /// `null` or `undefined` resolves to the minimum relay rate.
    #[wasm_bindgen(js_name = resolvePolicy)]
    pub fn resolve_policy(policy: JsValue) -> Result<JsValue, WasmSpendingError> {
        let policy = policy_from_js(policy)?;
        let target = FeeTargetOutput::from(FeePolicy::resolve(policy.as_ref()));
        Ok(serde_wasm_bindgen::to_value(&target)?)
    }

    /// Total fee in satoshis the policy charges for `vsize` virtual bytes
    #[wasm_bindgen(js_name = feeForVsize)]
    pub fn fee_for_vsize(policy: JsValue, vsize: u64) -> Result<u64, WasmSpendingError> {
        let policy = policy_from_js(policy)?.unwrap_or(FeePolicy::MinRelayRate);
        Ok(policy.fee_for_vsize(vsize).to_sat())
    }
}
