//! Error taxonomy for the provenance protocol.
//!
//! Verification outcomes (`NoRecord`, `Tampered`, ...) are ordinary values,
//! not errors; see `verify::VerificationOutcome`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    /// The secure store (or the key material in it) cannot be used.
    /// Recoverable by retrying later; never bypassed with a weaker key.
    #[error("signing key unavailable: {0}")]
    KeyUnavailable(String),

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("metadata embed failed: {0}")]
    EmbedFailed(String),

    /// A payload field would make the canonical payload ambiguous.
    #[error("field rejected: {0}")]
    FieldRejected(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("record serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AuthError>;
