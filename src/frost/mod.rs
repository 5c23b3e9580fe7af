//! FROST threshold signing for the private-wallet keybox.
//!
//! A [`LocalFrostSigner`] owns the local share. Each PSBT is signed through a
//! [`FrostSigningAttempt`], which exclusively borrows the signer for its lifetime, so one
//! share never has two attempts (and two sets of nonces) in flight. An attempt that fails
//! cannot be resumed; start a new one.
mod ffi;

pub use ffi::{NativeFrostSigner, NativeFrostSignerFactory, NativeSigningException};

use std::fmt;

use tracing::{debug, info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::keybox::AuthPublicKey;
use crate::networks::BitcoinNetworkType;
use crate::psbt::{Psbt, PsbtError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCommitments {
    pub vss_commitments: Vec<Vec<u8>>,
    pub aggregate_public_key: Vec<u8>,
}

/// The local participant's secret share and the group's public commitments.
///
/// Not `Clone`: the share has a single owner and is lent out by reference.
#[derive(PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ShareDetails {
    secret_share: Vec<u8>,
    #[zeroize(skip)]
    key_commitments: KeyCommitments,
}

impl ShareDetails {
    pub fn new(secret_share: Vec<u8>, key_commitments: KeyCommitments) -> Self {
        Self {
            secret_share,
            key_commitments,
        }
    }

    pub fn secret_share(&self) -> &[u8] {
        &self.secret_share
    }

    pub fn key_commitments(&self) -> &KeyCommitments {
        &self.key_commitments
    }
}

impl fmt::Debug for ShareDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShareDetails")
            .field("secret_share", &"<redacted>")
            .field("key_commitments", &self.key_commitments)
            .finish()
    }
}

/// Keybox of a private (FROST) wallet.
#[derive(Debug, PartialEq, Eq)]
pub struct SoftwareKeybox {
    pub id: String,
    pub network_type: BitcoinNetworkType,
    pub auth_key: AuthPublicKey,
    pub recovery_auth_key: AuthPublicKey,
    pub share_details: ShareDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SigningError {
    #[error("Commitment mismatch: {0}")]
    CommitmentMismatch(String),
    #[error("Invalid counterparty commitments: {0}")]
    InvalidCounterpartyCommitments(String),
    #[error("Invalid PSBT: {0}")]
    InvalidPsbt(String),
    #[error("Missing counterparty nonces: {0}")]
    MissingCounterpartyNonces(String),
    #[error("Nonce already used: {0}")]
    NonceAlreadyUsed(String),
    #[error("Unable to retrieve sighash: {0}")]
    UnableToRetrieveSighash(String),
    #[error("Unable to finalize PSBT: {0}")]
    UnableToFinalizePsbt(String),
}

impl SigningError {
    /// Errors that mean the counterparty or this share's nonce state can't be trusted.
    pub fn is_security_critical(&self) -> bool {
        matches!(
            self,
            SigningError::CommitmentMismatch(_)
                | SigningError::InvalidCounterpartyCommitments(_)
                | SigningError::NonceAlreadyUsed(_)
        )
    }
}

impl From<NativeSigningException> for SigningError {
    fn from(e: NativeSigningException) -> Self {
        match e {
            NativeSigningException::CommitmentMismatch(m) => SigningError::CommitmentMismatch(m),
            NativeSigningException::InvalidCounterpartyCommitments(m) => {
                SigningError::InvalidCounterpartyCommitments(m)
            }
            NativeSigningException::InvalidPsbt(m) => SigningError::InvalidPsbt(m),
            NativeSigningException::MissingCounterpartyNonces(m) => {
                SigningError::MissingCounterpartyNonces(m)
            }
            NativeSigningException::NonceAlreadyUsed(m) => SigningError::NonceAlreadyUsed(m),
            NativeSigningException::UnableToRetrieveSighash(m) => {
                SigningError::UnableToRetrieveSighash(m)
            }
            NativeSigningException::UnableToFinalizePsbt(m) => {
                SigningError::UnableToFinalizePsbt(m)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrostAttemptStatus {
    Idle,
    RequestGenerated,
    Signed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrostAttemptError {
    #[error("Signing attempt is {actual:?}, expected {expected:?}")]
    InvalidState {
        expected: FrostAttemptStatus,
        actual: FrostAttemptStatus,
    },
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error("Signer returned an unusable PSBT: {0}")]
    Psbt(#[from] PsbtError),
}

enum AttemptState<S> {
    Idle,
    RequestGenerated(S),
    Signed(Psbt),
    Failed,
}

impl<S> AttemptState<S> {
    fn status(&self) -> FrostAttemptStatus {
        match self {
            AttemptState::Idle => FrostAttemptStatus::Idle,
            AttemptState::RequestGenerated(_) => FrostAttemptStatus::RequestGenerated,
            AttemptState::Signed(_) => FrostAttemptStatus::Signed,
            AttemptState::Failed => FrostAttemptStatus::Failed,
        }
    }
}

pub struct LocalFrostSigner<F> {
    keybox: SoftwareKeybox,
    factory: F,
}

impl<F: NativeFrostSignerFactory> LocalFrostSigner<F> {
    pub fn new(keybox: SoftwareKeybox, factory: F) -> Self {
        Self { keybox, factory }
    }

    pub fn keybox(&self) -> &SoftwareKeybox {
        &self.keybox
    }

    pub fn begin_attempt(&mut self, psbt: Psbt) -> FrostSigningAttempt<'_, F> {
        debug!(psbt = %psbt.id, keybox = %self.keybox.id, "frost signing attempt started");
        FrostSigningAttempt {
            signer: self,
            psbt,
            state: AttemptState::Idle,
        }
    }
}

/// One request/response round with the counterparty signer.
pub struct FrostSigningAttempt<'a, F: NativeFrostSignerFactory> {
    signer: &'a mut LocalFrostSigner<F>,
    psbt: Psbt,
    state: AttemptState<F::Signer>,
}

impl<F: NativeFrostSignerFactory> FrostSigningAttempt<'_, F> {
    pub fn status(&self) -> FrostAttemptStatus {
        self.state.status()
    }

    pub fn signed_psbt(&self) -> Option<&Psbt> {
        match &self.state {
            AttemptState::Signed(psbt) => Some(psbt),
            _ => None,
        }
    }

    fn fail(&mut self, error: SigningError) -> FrostAttemptError {
        self.state = AttemptState::Failed;
        if error.is_security_critical() {
            warn!(psbt = %self.psbt.id, %error, "frost signing attempt aborted, discard it and start over");
        } else {
            warn!(psbt = %self.psbt.id, %error, "frost signing attempt failed");
        }
        FrostAttemptError::Signing(error)
    }

    /// Produces the sealed request for the counterparty. Only valid while idle.
    pub fn generate_sealed_sign_psbt_request(&mut self) -> Result<Vec<u8>, FrostAttemptError> {
        if !matches!(self.state, AttemptState::Idle) {
            return Err(FrostAttemptError::InvalidState {
                expected: FrostAttemptStatus::Idle,
                actual: self.status(),
            });
        }

        let created = self
            .signer
            .factory
            .new_signer(&self.psbt.base64, &self.signer.keybox.share_details);
        let mut native = match created {
            Ok(native) => native,
            Err(e) => return Err(self.fail(e.into())),
        };
        match native.sign_psbt_request() {
            Ok(request) => {
                self.state = AttemptState::RequestGenerated(native);
                debug!(psbt = %self.psbt.id, bytes = request.len(), "sealed sign request generated");
                Ok(request)
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Completes the attempt with the counterparty's unsealed response.
    pub fn sign_psbt(&mut self, unsealed_response: &[u8]) -> Result<Psbt, FrostAttemptError> {
        let mut native = match std::mem::replace(&mut self.state, AttemptState::Failed) {
            AttemptState::RequestGenerated(native) => native,
            other => {
                let actual = other.status();
                self.state = other;
                return Err(FrostAttemptError::InvalidState {
                    expected: FrostAttemptStatus::RequestGenerated,
                    actual,
                });
            }
        };

        let signed_base64 = match native.sign_psbt(unsealed_response) {
            Ok(signed) => signed,
            Err(e) => return Err(self.fail(e.into())),
        };
        let signed = match self.psbt.with_signed_base64(&signed_base64) {
            Ok(signed) => signed,
            Err(e) => {
                warn!(psbt = %self.psbt.id, error = %e, "frost signer returned an unusable psbt");
                return Err(FrostAttemptError::Psbt(e));
            }
        };

        info!(psbt = %signed.id, "frost signing attempt completed");
        self.state = AttemptState::Signed(signed.clone());
        Ok(signed)
    }
}
