//! External verification of sealed images.
//!
//! Verification needs only the sealed bytes and the device's public key.
//! Integrity must be provable without trusting the device that signed: the
//! verifier re-derives the pre-embedding byte stream, recomputes the content
//! hash, and checks the signature over the reconstructed canonical payload.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use p256::ecdsa::signature::Verifier as _;
use p256::ecdsa::{Signature, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::embed::EmbeddedMetadata;
use crate::error::{AuthError, Result};
use crate::{content_hash_hex, jpeg, AuthenticationRecord};

/// Outcome of verifying a candidate byte stream.
///
/// Failed outcomes still return the extracted record so callers can inspect
/// what the image claims about itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// No parseable provenance record in the container.
    NoRecord,
    /// The bytes no longer match the signed content hash.
    Tampered(AuthenticationRecord),
    /// The bytes match the hash, but the signature does not check out
    /// against the device key (field altered without re-signing, or signed
    /// by a different key).
    InvalidSignature(AuthenticationRecord),
    Valid(AuthenticationRecord),
}

impl VerificationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerificationOutcome::Valid(_))
    }

    pub fn record(&self) -> Option<&AuthenticationRecord> {
        match self {
            VerificationOutcome::NoRecord => None,
            VerificationOutcome::Tampered(record)
            | VerificationOutcome::InvalidSignature(record)
            | VerificationOutcome::Valid(record) => Some(record),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            VerificationOutcome::NoRecord => "no-record",
            VerificationOutcome::Tampered(_) => "tampered",
            VerificationOutcome::InvalidSignature(_) => "invalid-signature",
            VerificationOutcome::Valid(_) => "valid",
        }
    }

    /// Structured per-check result for tool output.
    pub fn report(&self) -> VerificationReport {
        VerificationReport {
            valid: self.is_valid(),
            outcome: self.label().to_string(),
            content_hash_valid: !matches!(
                self,
                VerificationOutcome::NoRecord | VerificationOutcome::Tampered(_)
            ),
            signature_valid: self.is_valid(),
            record: self.record().cloned(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerificationReport {
    pub valid: bool,
    pub outcome: String,
    pub content_hash_valid: bool,
    pub signature_valid: bool,
    pub record: Option<AuthenticationRecord>,
}

/// Verifies `candidate` against the device public key.
///
/// The signed hash covers the pre-embedding byte stream, so the candidate is
/// canonicalized (provenance segments stripped) before hashing. Any byte
/// edit outside the provenance segment therefore lands in `Tampered`; edits
/// inside it land in `NoRecord`, `Tampered` or `InvalidSignature` depending
/// on the field. Nothing edited verifies as `Valid`.
pub fn verify_bytes(candidate: &[u8], verifying_key: &VerifyingKey) -> VerificationOutcome {
    let Some((record, canonical)) = extract_with_canonical(candidate) else {
        return VerificationOutcome::NoRecord;
    };

    if content_hash_hex(&canonical) != record.image_hash {
        return VerificationOutcome::Tampered(record);
    }

    let Ok(der) = STANDARD.decode(&record.signature) else {
        return VerificationOutcome::InvalidSignature(record);
    };
    let Ok(signature) = Signature::from_der(&der) else {
        return VerificationOutcome::InvalidSignature(record);
    };

    let payload = record.canonical_payload();
    match verifying_key.verify(payload.as_bytes(), &signature) {
        Ok(()) => VerificationOutcome::Valid(record),
        Err(_) => VerificationOutcome::InvalidSignature(record),
    }
}

/// Extracts the embedded record without verifying anything.
pub fn extract_record(candidate: &[u8]) -> Option<AuthenticationRecord> {
    extract_with_canonical(candidate).map(|(record, _)| record)
}

fn extract_with_canonical(candidate: &[u8]) -> Option<(AuthenticationRecord, Vec<u8>)> {
    let (payloads, canonical) = jpeg::extract_provenance(candidate).ok()?;
    let payload = payloads.first()?;
    let metadata: EmbeddedMetadata = serde_json::from_slice(payload).ok()?;
    Some((metadata.into_record(), canonical))
}

/// Loads the device public key from a hex string or a file containing one
/// (SEC1 point encoding, as `DeviceKey::public_key_hex` exports it).
pub fn load_verifying_key(
    public_key: Option<&str>,
    public_key_file: Option<&Path>,
) -> Result<VerifyingKey> {
    let encoded = match (public_key, public_key_file) {
        (Some(hex_key), _) => hex_key.trim().to_string(),
        (None, Some(path)) => std::fs::read_to_string(path)?.trim().to_string(),
        (None, None) => {
            return Err(AuthError::KeyUnavailable(
                "no public key provided (pass a hex key or a key file)".into(),
            ))
        }
    };

    let bytes = hex::decode(&encoded)
        .map_err(|e| AuthError::KeyUnavailable(format!("public key is not valid hex: {}", e)))?;
    VerifyingKey::from_sec1_bytes(&bytes)
        .map_err(|e| AuthError::KeyUnavailable(format!("invalid P-256 public key: {}", e)))
}
