//! Boundary with the native FROST signer library.

use super::ShareDetails;

/// Every failure the native signer can report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeSigningException {
    CommitmentMismatch(String),
    InvalidCounterpartyCommitments(String),
    InvalidPsbt(String),
    MissingCounterpartyNonces(String),
    NonceAlreadyUsed(String),
    UnableToRetrieveSighash(String),
    UnableToFinalizePsbt(String),
}

/// Native signer bound to one PSBT and one share. Holds the attempt's nonces.
pub trait NativeFrostSigner {
    /// Sealed request for the counterparty signer.
    fn sign_psbt_request(&mut self) -> Result<Vec<u8>, NativeSigningException>;

    /// Aggregates the counterparty's unsealed response and returns the finalized PSBT as
    /// base64.
    fn sign_psbt(&mut self, unsealed_response: &[u8]) -> Result<String, NativeSigningException>;
}

pub trait NativeFrostSignerFactory {
    type Signer: NativeFrostSigner;

    fn new_signer(
        &self,
        psbt_base64: &str,
        share_details: &ShareDetails,
    ) -> Result<Self::Signer, NativeSigningException>;
}
