//! Fee rates, fees and the policy applied when building a transaction.
mod estimator;

pub use estimator::{
    BitcoinFeeRateEstimator, EstimatedTransactionPriority, FeeEstimationError, FeeRatesByPriority,
    MempoolFeeRateEstimator, RecommendedFees, RecommendedFeesSource,
};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bitcoin::Amount;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeeRateError {
    #[error("Fee rate must be a finite number of sat/vB, got {0}")]
    NotFinite(String),
    #[error("Fee rate must be positive, got {0} sat/vB")]
    NotPositive(String),
    #[error("Cannot derive a fee rate for an empty transaction")]
    EmptyTransaction,
}

/// Fee rate in satoshis per virtual byte. Always finite and positive.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct FeeRate {
    sats_per_vbyte: f64,
}

impl FeeRate {
    /// Minimum relay fee rate accepted by default node policy.
    pub const MIN_RELAY: FeeRate = FeeRate {
        sats_per_vbyte: 1.0,
    };

    pub fn new(sats_per_vbyte: f64) -> Result<Self, FeeRateError> {
        if !sats_per_vbyte.is_finite() {
            return Err(FeeRateError::NotFinite(sats_per_vbyte.to_string()));
        }
        if sats_per_vbyte <= 0.0 {
            return Err(FeeRateError::NotPositive(sats_per_vbyte.to_string()));
        }
        Ok(Self { sats_per_vbyte })
    }

    pub fn sats_per_vbyte(&self) -> f64 {
        self.sats_per_vbyte
    }

    /// Rounds up to the nearest sat per 1000 weight units.
    pub fn to_bitcoin_fee_rate(&self) -> crate::bitcoin::FeeRate {
        let sat_per_kwu = (self.sats_per_vbyte * 250.0).ceil() as u64;
        crate::bitcoin::FeeRate::from_sat_per_kwu(sat_per_kwu)
    }

    /// Total fee for a transaction of `vsize` virtual bytes, rounded up.
    pub fn fee_for_vsize(&self, vsize: u64) -> Amount {
        Amount::from_sat((self.sats_per_vbyte * vsize as f64).ceil() as u64)
    }
}

impl TryFrom<f64> for FeeRate {
    type Error = FeeRateError;

    fn try_from(sats_per_vbyte: f64) -> Result<Self, Self::Error> {
        FeeRate::new(sats_per_vbyte)
    }
}

impl From<FeeRate> for f64 {
    fn from(rate: FeeRate) -> Self {
        rate.sats_per_vbyte
    }
}

impl fmt::Display for FeeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} sat/vB", self.sats_per_vbyte)
    }
}

/// A fee the wallet engine computed for a concrete transaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fee {
    pub amount: Amount,
    pub fee_rate: FeeRate,
}

impl Fee {
    pub fn new(amount: Amount, fee_rate: FeeRate) -> Self {
        Self { amount, fee_rate }
    }

    /// Derives the fee rate as `amount / vsize`. A zero fee has no valid rate.
    pub fn from_amount_and_vsize(amount: Amount, vsize: u64) -> Result<Self, FeeRateError> {
        if vsize == 0 {
            return Err(FeeRateError::EmptyTransaction);
        }
        let fee_rate = FeeRate::new(amount.to_sat() as f64 / vsize as f64)?;
        Ok(Self { amount, fee_rate })
    }
}

/// How the transaction builder should pay fees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeePolicy {
    /// Pay exactly this total, independent of the final size.
    Absolute(Fee),
    /// Pay this rate; the total scales with the final vsize.
    Rate(FeeRate),
    /// Pay the chain's minimum relay rate. Used for dummy PSBTs built only to estimate fees.
    MinRelayRate,
}

/// What the transaction builder applies once a policy has been resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeTarget {
    Absolute(Amount),
    Rate(crate::bitcoin::FeeRate),
}

impl FeePolicy {
    /// Resolves an optional policy; no policy falls back to the minimum relay rate.
    pub fn resolve(policy: Option<&FeePolicy>) -> FeeTarget {
        match policy {
            Some(FeePolicy::Absolute(fee)) => FeeTarget::Absolute(fee.amount),
            Some(FeePolicy::Rate(rate)) => FeeTarget::Rate(rate.to_bitcoin_fee_rate()),
            Some(FeePolicy::MinRelayRate) | None => {
                FeeTarget::Rate(FeeRate::MIN_RELAY.to_bitcoin_fee_rate())
            }
        }
    }

    pub fn target(&self) -> FeeTarget {
        FeePolicy::resolve(Some(self))
    }

    /// Total fee this policy charges for a transaction of `vsize` virtual bytes.
    pub fn fee_for_vsize(&self, vsize: u64) -> Amount {
        match self {
            FeePolicy::Absolute(fee) => fee.amount,
            FeePolicy::Rate(rate) => rate.fee_for_vsize(vsize),
            FeePolicy::MinRelayRate => FeeRate::MIN_RELAY.fee_for_vsize(vsize),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_no_policy_falls_back_to_min_relay() {
        assert_eq!(
            FeePolicy::resolve(None),
            FeeTarget::Rate(crate::bitcoin::FeeRate::from_sat_per_vb_unchecked(1))
        );
        assert_eq!(FeePolicy::resolve(None), FeePolicy::MinRelayRate.target());
    }

    #[test]
    fn test_absolute_ignores_size() {
        let fee = Fee::from_amount_and_vsize(Amount::from_sat(500), 100).unwrap();
        let policy = FeePolicy::Absolute(fee);
        assert_eq!(policy.target(), FeeTarget::Absolute(Amount::from_sat(500)));
        assert_eq!(policy.fee_for_vsize(10), Amount::from_sat(500));
        assert_eq!(policy.fee_for_vsize(10_000), Amount::from_sat(500));
    }

    #[rstest]
    #[case(2.0, 141, 282)]
    #[case(1.5, 141, 212)]
    #[case(10.0, 0, 0)]
    fn test_rate_scales_with_vsize(
        #[case] rate: f64,
        #[case] vsize: u64,
        #[case] expected_sats: u64,
    ) {
        let policy = FeePolicy::Rate(FeeRate::new(rate).unwrap());
        assert_eq!(policy.fee_for_vsize(vsize), Amount::from_sat(expected_sats));
    }

    #[test]
    fn test_fractional_rate_rounds_up() {
        let rate = FeeRate::new(1.001).unwrap();
        assert_eq!(rate.to_bitcoin_fee_rate().to_sat_per_kwu(), 251);
    }

    #[test]
    fn test_fee_rate_from_amount_and_vsize() {
        let fee = Fee::from_amount_and_vsize(Amount::from_sat(1_000), 200).unwrap();
        assert_eq!(fee.fee_rate, FeeRate::new(5.0).unwrap());
        assert_eq!(
            Fee::from_amount_and_vsize(Amount::from_sat(1_000), 0),
            Err(FeeRateError::EmptyTransaction)
        );
        assert!(matches!(
            Fee::from_amount_and_vsize(Amount::ZERO, 200),
            Err(FeeRateError::NotPositive(_))
        ));
    }

    #[rstest]
    #[case::nan(f64::NAN)]
    #[case::infinite(f64::INFINITY)]
    #[case::negative_infinite(f64::NEG_INFINITY)]
    fn test_non_finite_rate_is_rejected(#[case] rate: f64) {
        assert!(matches!(FeeRate::new(rate), Err(FeeRateError::NotFinite(_))));
    }

    #[rstest]
    #[case::zero(0.0)]
    #[case::negative(-2.5)]
    fn test_non_positive_rate_is_rejected(#[case] rate: f64) {
        assert!(matches!(FeeRate::new(rate), Err(FeeRateError::NotPositive(_))));
    }

    #[test]
    fn test_fee_rate_serde_validates() {
        let rate: FeeRate = serde_json::from_str("2.5").unwrap();
        assert_eq!(rate.sats_per_vbyte(), 2.5);
        assert_eq!(serde_json::to_string(&rate).unwrap(), "2.5");
        assert!(serde_json::from_str::<FeeRate>("-1.0").is_err());
    }
}
