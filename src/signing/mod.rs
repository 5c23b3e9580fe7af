//! Signers for the app and server factors.
//!
//! The server co-signer is reached through [`SpendingSigningService`]; the app factor signs
//! locally with the private key held in the secure store.
mod app;

pub use app::{AppSignError, AppSpendingWalletSigner, KeyStoreAppSigner};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::keybox::FullAccountId;
use crate::networks::F8eEnvironment;
use crate::psbt::Psbt;

/// Failure talking to F8e or another remote service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkingError {
    #[error("Connectivity error: {0}")]
    Connectivity(String),
    #[error("Request timed out")]
    Timeout,
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

impl NetworkingError {
    /// Whether the request may succeed if the caller tries again.
    pub fn is_transient(&self) -> bool {
        match self {
            NetworkingError::Connectivity(_) | NetworkingError::Timeout => true,
            NetworkingError::Http { status, .. } => *status >= 500,
            NetworkingError::InvalidResponse(_) => false,
        }
    }
}

/// Hardware-approved grant the server requires before co-signing under a transaction
/// verification policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxVerificationApproval {
    pub version: u8,
    pub hw_auth_public_key: String,
    pub commitment: String,
    pub signature: String,
}

/// The server co-signer.
#[async_trait]
pub trait SpendingSigningService: Send + Sync {
    /// Asks the server to add its signature using the keys of `keyset_id`, which need not
    /// be the account's active keyset.
    async fn sign_with_specific_keyset(
        &self,
        f8e_environment: &F8eEnvironment,
        full_account_id: &FullAccountId,
        keyset_id: &str,
        psbt: &Psbt,
        grant: Option<&TxVerificationApproval>,
    ) -> Result<Psbt, NetworkingError>;
}
