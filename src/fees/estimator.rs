//! Fee rate estimation by confirmation priority.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::FeeRate;
use crate::networks::BitcoinNetworkType;
use crate::signing::NetworkingError;

/// How quickly a transaction should confirm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EstimatedTransactionPriority {
    Fastest,
    ThirtyMinutes,
    SixtyMinutes,
}

impl EstimatedTransactionPriority {
    pub const ALL: [EstimatedTransactionPriority; 3] = [
        EstimatedTransactionPriority::Fastest,
        EstimatedTransactionPriority::ThirtyMinutes,
        EstimatedTransactionPriority::SixtyMinutes,
    ];

    /// Confirmation target in blocks.
    pub const fn target_blocks(&self) -> u32 {
        match self {
            EstimatedTransactionPriority::Fastest => 1,
            EstimatedTransactionPriority::ThirtyMinutes => 3,
            EstimatedTransactionPriority::SixtyMinutes => 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeeEstimationError {
    #[error("Fee estimation request failed: {0}")]
    Network(#[from] NetworkingError),
    #[error("Fee estimation returned an invalid rate for {priority:?}: {rate}")]
    InvalidResponse {
        priority: EstimatedTransactionPriority,
        rate: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeeRatesByPriority {
    pub fastest: FeeRate,
    pub thirty_minutes: FeeRate,
    pub sixty_minutes: FeeRate,
}

impl FeeRatesByPriority {
    pub fn uniform(rate: FeeRate) -> Self {
        Self {
            fastest: rate,
            thirty_minutes: rate,
            sixty_minutes: rate,
        }
    }

    pub fn get(&self, priority: EstimatedTransactionPriority) -> FeeRate {
        match priority {
            EstimatedTransactionPriority::Fastest => self.fastest,
            EstimatedTransactionPriority::ThirtyMinutes => self.thirty_minutes,
            EstimatedTransactionPriority::SixtyMinutes => self.sixty_minutes,
        }
    }
}

#[async_trait]
pub trait BitcoinFeeRateEstimator: Send + Sync {
    async fn estimated_fee_rate_for_priority(
        &self,
        priority: EstimatedTransactionPriority,
        network: BitcoinNetworkType,
    ) -> Result<FeeRate, FeeEstimationError>;

    async fn estimated_fee_rates(
        &self,
        network: BitcoinNetworkType,
    ) -> Result<FeeRatesByPriority, FeeEstimationError>;
}

/// Response shape of a mempool.space `/api/v1/fees/recommended` call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedFees {
    pub fastest_fee: f64,
    pub half_hour_fee: f64,
    pub hour_fee: f64,
    #[serde(default)]
    pub economy_fee: Option<f64>,
    #[serde(default)]
    pub minimum_fee: Option<f64>,
}

#[async_trait]
pub trait RecommendedFeesSource: Send + Sync {
    async fn recommended_fees(
        &self,
        network: BitcoinNetworkType,
    ) -> Result<RecommendedFees, NetworkingError>;
}

/// Estimator backed by a mempool.space style recommended-fees endpoint.
///
/// Regtest has no mempool to ask, so every bucket is the minimum relay rate.
pub struct MempoolFeeRateEstimator<S> {
    source: S,
}

impl<S: RecommendedFeesSource> MempoolFeeRateEstimator<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    fn validate(
        priority: EstimatedTransactionPriority,
        sats_per_vbyte: f64,
    ) -> Result<FeeRate, FeeEstimationError> {
        FeeRate::new(sats_per_vbyte).map_err(|_| FeeEstimationError::InvalidResponse {
            priority,
            rate: sats_per_vbyte.to_string(),
        })
    }
}

#[async_trait]
impl<S: RecommendedFeesSource> BitcoinFeeRateEstimator for MempoolFeeRateEstimator<S> {
    async fn estimated_fee_rate_for_priority(
        &self,
        priority: EstimatedTransactionPriority,
        network: BitcoinNetworkType,
    ) -> Result<FeeRate, FeeEstimationError> {
        Ok(self.estimated_fee_rates(network).await?.get(priority))
    }

    async fn estimated_fee_rates(
        &self,
        network: BitcoinNetworkType,
    ) -> Result<FeeRatesByPriority, FeeEstimationError> {
        if network == BitcoinNetworkType::Regtest {
            return Ok(FeeRatesByPriority::uniform(FeeRate::MIN_RELAY));
        }

        let fees = self.source.recommended_fees(network).await?;
        debug!(?fees, %network, "received recommended fees");

        Ok(FeeRatesByPriority {
            fastest: Self::validate(EstimatedTransactionPriority::Fastest, fees.fastest_fee)?,
            thirty_minutes: Self::validate(
                EstimatedTransactionPriority::ThirtyMinutes,
                fees.half_hour_fee,
            )?,
            sixty_minutes: Self::validate(
                EstimatedTransactionPriority::SixtyMinutes,
                fees.hour_fee,
            )?,
        })
    }
}
