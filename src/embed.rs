//! Embeds a provenance record into a JPEG container.
//!
//! The record is serialized as a `"PhotoAuthentication"` sub-dictionary with
//! fixed field names and carried in one APP11 segment. Pixel data and every
//! pre-existing metadata segment are preserved byte-for-byte; embedding only
//! adds the one segment.

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};
use crate::jpeg;
use crate::AuthenticationRecord;

/// Wire form of the record under its namespace key.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct EmbeddedMetadata {
    #[serde(rename = "PhotoAuthentication")]
    photo_authentication: EmbeddedRecord,
}

#[derive(Debug, Serialize, Deserialize)]
struct EmbeddedRecord {
    #[serde(rename = "AuthHash")]
    image_hash: String,
    #[serde(rename = "AuthTimestamp")]
    timestamp: String,
    #[serde(rename = "AuthDeviceId")]
    device_id: String,
    #[serde(rename = "AuthSignature")]
    signature: String,
    #[serde(rename = "AuthVersion")]
    version: String,
    #[serde(rename = "AuthCameraPosition")]
    camera_position: String,
    #[serde(rename = "AuthLocation", skip_serializing_if = "Option::is_none")]
    location: Option<String>,
}

impl From<&AuthenticationRecord> for EmbeddedMetadata {
    fn from(record: &AuthenticationRecord) -> Self {
        Self {
            photo_authentication: EmbeddedRecord {
                image_hash: record.image_hash.clone(),
                timestamp: record.timestamp.clone(),
                device_id: record.device_id.clone(),
                signature: record.signature.clone(),
                version: record.version.clone(),
                camera_position: record.camera_position.clone(),
                location: record.location.clone(),
            },
        }
    }
}

impl EmbeddedMetadata {
    pub(crate) fn into_record(self) -> AuthenticationRecord {
        let fields = self.photo_authentication;
        AuthenticationRecord {
            image_hash: fields.image_hash,
            timestamp: fields.timestamp,
            device_id: fields.device_id,
            signature: fields.signature,
            version: fields.version,
            camera_position: fields.camera_position,
            location: fields.location,
        }
    }
}

/// Writes `record` into the container metadata of `original`.
///
/// Refuses images that already carry a provenance segment: the record's hash
/// covers the exact input bytes, and a stale segment inside them would make
/// the sealed image unverifiable. Re-sealing goes through
/// `AuthenticationEngine::authenticate_and_embed`, which strips first.
pub fn embed_record(original: &[u8], record: &AuthenticationRecord) -> Result<Vec<u8>> {
    let (segments, _tail) = jpeg::marker_segments(original)?;
    if segments.iter().any(|seg| seg.is_provenance(original)) {
        return Err(AuthError::EmbedFailed(
            "image already carries a provenance record".into(),
        ));
    }
    log::debug!(
        "embedding provenance record alongside {} existing metadata segment(s)",
        segments.iter().filter(|seg| seg.is_app()).count()
    );

    let payload = serde_json::to_vec(&EmbeddedMetadata::from(record))?;
    let segment = jpeg::provenance_segment(&payload)?;
    Ok(jpeg::insert_after_soi(original, &segment))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(location: Option<&str>) -> AuthenticationRecord {
        AuthenticationRecord {
            image_hash: "aa".repeat(32),
            timestamp: "2026-08-07T10:00:00Z".to_string(),
            device_id: "4dfc7783-0f4f-4a9f-9a4c-000000000001".to_string(),
            signature: "c2lnbmF0dXJl".to_string(),
            version: crate::PROTOCOL_VERSION.to_string(),
            camera_position: "back".to_string(),
            location: location.map(str::to_string),
        }
    }

    #[test]
    fn embedding_preserves_the_original_bytes() -> Result<()> {
        let original = jpeg::sample_jpeg();
        let sealed = embed_record(&original, &sample_record(None))?;

        let (payloads, stripped) = jpeg::extract_provenance(&sealed)?;
        assert_eq!(payloads.len(), 1);
        assert_eq!(stripped, original);
        Ok(())
    }

    #[test]
    fn embedded_fields_use_the_fixed_names() -> Result<()> {
        let original = jpeg::sample_jpeg();
        let sealed = embed_record(&original, &sample_record(Some("40.7128,-74.0060")))?;

        let (payloads, _) = jpeg::extract_provenance(&sealed)?;
        let value: serde_json::Value = serde_json::from_slice(&payloads[0])?;
        let entry = &value["PhotoAuthentication"];
        assert_eq!(entry["AuthCameraPosition"], "back");
        assert_eq!(entry["AuthVersion"], "1.0");
        assert_eq!(entry["AuthLocation"], "40.7128,-74.0060");
        assert!(entry["AuthHash"].is_string());
        assert!(entry["AuthSignature"].is_string());
        Ok(())
    }

    #[test]
    fn absent_location_is_omitted_not_empty() -> Result<()> {
        let sealed = embed_record(&jpeg::sample_jpeg(), &sample_record(None))?;
        let (payloads, _) = jpeg::extract_provenance(&sealed)?;
        let value: serde_json::Value = serde_json::from_slice(&payloads[0])?;
        assert!(value["PhotoAuthentication"].get("AuthLocation").is_none());
        Ok(())
    }

    #[test]
    fn refuses_to_double_seal() -> Result<()> {
        let sealed = embed_record(&jpeg::sample_jpeg(), &sample_record(None))?;
        let again = embed_record(&sealed, &sample_record(None));
        assert!(matches!(again, Err(AuthError::EmbedFailed(_))));
        Ok(())
    }

    #[test]
    fn refuses_non_jpeg_input() {
        let result = embed_record(b"ABC", &sample_record(None));
        assert!(matches!(result, Err(AuthError::EmbedFailed(_))));
    }
}
