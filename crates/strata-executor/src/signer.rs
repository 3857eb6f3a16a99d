//! Signing collaborator seam.
//!
//! Formatting prices and sizes and producing the signature are outside the
//! scheduler. It only needs a pure function from (batch, nonce) to a
//! wire-ready payload.

use thiserror::Error;

use strata_core::ActionBatch;

use crate::transport::SignedPayload;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignError {
    #[error("No signing key available")]
    NoKey,

    #[error("Action serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),
}

/// Builds and signs the request body for one batch.
///
/// Called on the tick path, so implementations must not block.
#[cfg_attr(test, mockall::automock)]
pub trait ActionSigner: Send + Sync {
    fn sign_and_build(
        &self,
        batch: &ActionBatch,
        nonce: u64,
        correlation_id: u64,
    ) -> Result<SignedPayload, SignError>;
}
