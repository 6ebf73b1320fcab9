//! PhotoSeal
//!
//! On-device photo provenance: sign freshly captured JPEG bytes with a
//! per-device ECDSA P-256 key, embed the evidence in the image container,
//! and verify sealed images with structured tamper detection.
//!
//! # Protocol invariants
//!
//! 1. **Hash before embed**: the signed content hash covers the exact
//!    pre-embedding byte stream; verification reconstructs that stream by
//!    stripping the provenance segment.
//! 2. **Canonical payload**: signing input is a deterministic, order-fixed,
//!    pipe-delimited string; any reordering or re-serialization breaks
//!    signature compatibility.
//! 3. **Immutable records**: a record never changes after signing; its only
//!    durable form is the bytes embedded in the container.
//! 4. **One key, one id**: the signing key and device identifier are created
//!    at most once per installation and reused.
//! 5. **No silent fallback**: an unreachable key store is an error, never a
//!    substituted weaker key; a non-durable device id is explicit, never
//!    disguised as persisted.
//!
//! # Module Structure
//!
//! - `store`: secure key/value storage (filesystem + in-memory)
//! - `keys` / `identity`: device signing key and device identifier
//! - `engine`: hash, canonical payload, sign, assemble record
//! - `jpeg` / `embed`: container segment surgery and record embedding
//! - `verify`: record extraction and tamper detection

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

use crate::error::{AuthError, Result};

pub mod config;
pub mod embed;
pub mod engine;
pub mod error;
pub mod identity;
pub mod jpeg;
pub mod keys;
pub mod store;
pub mod verify;

pub use config::StoreConfig;
pub use embed::embed_record;
pub use engine::AuthenticationEngine;
pub use error::AuthError as Error;
pub use identity::{DeviceId, DeviceIdentity, DEVICE_ID_TAG};
pub use keys::{DeviceKey, KeyManager, Signer, SIGNING_KEY_TAG};
pub use store::{FilesystemSecureStore, InMemorySecureStore, SecureStore};
pub use verify::{
    extract_record, load_verifying_key, verify_bytes, VerificationOutcome, VerificationReport,
};

/// Protocol version carried in every record.
pub const PROTOCOL_VERSION: &str = "1.0";

// -------------------- Provenance Record --------------------

/// The unit of evidence for one image: what was captured, when, by which
/// device, and the signature binding it all together.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthenticationRecord {
    /// Lowercase hex SHA-256 of the pre-embedding image bytes.
    pub image_hash: String,
    /// Capture instant, canonical ISO-8601 (UTC, second precision).
    pub timestamp: String,
    /// Opaque stable device identifier.
    pub device_id: String,
    /// Base64 of the DER-encoded ECDSA signature over the canonical payload.
    pub signature: String,
    /// Protocol version, `PROTOCOL_VERSION` at signing time.
    pub version: String,
    /// Camera label supplied by the capture pipeline ("front"/"back").
    pub camera_position: String,
    /// Optional "lat,lon" string; absence is a valid state.
    pub location: Option<String>,
}

impl AuthenticationRecord {
    /// The exact string the signature covers.
    pub fn canonical_payload(&self) -> String {
        canonical_payload(
            &self.image_hash,
            &self.timestamp,
            &self.device_id,
            &self.camera_position,
            &self.version,
            self.location.as_deref(),
        )
    }
}

// -------------------- Canonical Payload --------------------

/// Builds the signing input. Field order is fixed; the location segment is
/// appended only when present, so its absence is itself signed content.
pub fn canonical_payload(
    image_hash: &str,
    timestamp: &str,
    device_id: &str,
    camera_position: &str,
    version: &str,
    location: Option<&str>,
) -> String {
    let mut payload = format!(
        "{}|{}|{}|{}|{}",
        image_hash, timestamp, device_id, camera_position, version
    );
    if let Some(location) = location {
        payload.push('|');
        payload.push_str(location);
    }
    payload
}

/// A conforming payload field MUST NOT contain the `|` delimiter or control
/// characters; an embedded delimiter would make the canonical payload
/// ambiguous. Positive allowlist, like zone-id discipline.
pub fn validate_payload_field(field: &str, value: &str) -> Result<()> {
    // Compile once for hot paths.
    static FIELD_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = FIELD_RE.get_or_init(|| regex::Regex::new(r"^[A-Za-z0-9 ._:,+-]{1,128}$").unwrap());

    if !re.is_match(value) {
        return Err(AuthError::FieldRejected(format!(
            "{} must match ^[A-Za-z0-9 ._:,+-]{{1,128}}$",
            field
        )));
    }
    Ok(())
}

// -------------------- Shared Digest / Time Helpers --------------------

/// Lowercase hex SHA-256 over `data`.
pub fn content_hash_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Current instant in the canonical textual form records carry.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}
