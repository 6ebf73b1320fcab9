//! Authentication engine: hash, canonical payload, sign, assemble record.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::embed::embed_record;
use crate::error::Result;
use crate::identity::DeviceId;
use crate::jpeg;
use crate::keys::Signer;
use crate::{
    canonical_payload, content_hash_hex, now_timestamp, validate_payload_field,
    AuthenticationRecord, PROTOCOL_VERSION,
};

/// Produces provenance records for captured images.
///
/// The key and identity services are injected, so tests run against
/// software signers and in-memory identities instead of the device store.
pub struct AuthenticationEngine<S: Signer> {
    signer: S,
    device_id: DeviceId,
}

impl<S: Signer> AuthenticationEngine<S> {
    pub fn new(signer: S, device_id: DeviceId) -> Self {
        Self { signer, device_id }
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    pub fn signer(&self) -> &S {
        &self.signer
    }

    /// Builds and signs a provenance record over the exact bytes given.
    ///
    /// The input is never mutated, and no partial record is produced: any
    /// signing failure surfaces before a record exists.
    pub fn authenticate(
        &self,
        image_bytes: &[u8],
        camera_position: &str,
        location: Option<&str>,
    ) -> Result<AuthenticationRecord> {
        validate_payload_field("camera_position", camera_position)?;
        if let Some(location) = location {
            validate_payload_field("location", location)?;
        }

        let image_hash = content_hash_hex(image_bytes);
        let timestamp = now_timestamp();
        let payload = canonical_payload(
            &image_hash,
            &timestamp,
            self.device_id.as_str(),
            camera_position,
            PROTOCOL_VERSION,
            location,
        );

        let der = self.signer.sign(payload.as_bytes())?;
        log::debug!(
            "authenticated {} byte(s), hash {}",
            image_bytes.len(),
            &image_hash[..16]
        );

        Ok(AuthenticationRecord {
            image_hash,
            timestamp,
            device_id: self.device_id.as_str().to_string(),
            signature: STANDARD.encode(der),
            version: PROTOCOL_VERSION.to_string(),
            camera_position: camera_position.to_string(),
            location: location.map(str::to_string),
        })
    }

    /// One-call outward interface: authenticate the image and return the
    /// sealed bytes.
    ///
    /// A stale provenance segment in the input (a previously sealed copy) is
    /// stripped before hashing, so the signed hash always covers the byte
    /// stream that verification will reconstruct.
    pub fn authenticate_and_embed(
        &self,
        image_bytes: &[u8],
        camera_position: &str,
        location: Option<&str>,
    ) -> Result<Vec<u8>> {
        let (stale, canonical) = jpeg::extract_provenance(image_bytes)?;
        if !stale.is_empty() {
            log::warn!(
                "input already carried {} provenance record(s); re-sealing the stripped image",
                stale.len()
            );
        }

        let record = self.authenticate(&canonical, camera_position, location)?;
        embed_record(&canonical, &record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;
    use crate::keys::KeyManager;
    use crate::store::InMemorySecureStore;
    use base64::Engine as _;
    use p256::ecdsa::signature::Verifier as _;
    use p256::ecdsa::{Signature, VerifyingKey};
    use sha2::{Digest, Sha256};

    struct FailingSigner;

    impl Signer for FailingSigner {
        fn sign(&self, _payload: &[u8]) -> Result<Vec<u8>> {
            Err(AuthError::SigningFailed("secure element rejected".into()))
        }

        fn public_key(&self) -> VerifyingKey {
            unreachable!("failing signer has no key")
        }
    }

    fn test_engine() -> AuthenticationEngine<crate::keys::DeviceKey> {
        let key = KeyManager::new(InMemorySecureStore::new())
            .get_or_create_signing_key()
            .expect("key");
        AuthenticationEngine::new(key, DeviceId::Persisted("device-test-1".to_string()))
    }

    #[test]
    fn record_hashes_the_exact_input_bytes() -> Result<()> {
        let engine = test_engine();
        let record = engine.authenticate(b"ABC", "back", None)?;

        let expected = hex::encode(Sha256::digest(b"ABC"));
        assert_eq!(record.image_hash, expected);
        assert_eq!(record.camera_position, "back");
        assert_eq!(record.version, "1.0");
        assert_eq!(record.location, None);
        Ok(())
    }

    #[test]
    fn payload_has_five_segments_without_location() -> Result<()> {
        let engine = test_engine();
        let record = engine.authenticate(b"ABC", "back", None)?;

        let payload = record.canonical_payload();
        assert_eq!(payload.split('|').count(), 5);
        assert_eq!(
            payload,
            format!(
                "{}|{}|device-test-1|back|1.0",
                record.image_hash, record.timestamp
            )
        );
        Ok(())
    }

    #[test]
    fn location_adds_a_sixth_signed_segment() -> Result<()> {
        let engine = test_engine();
        let record = engine.authenticate(b"ABC", "back", Some("40.7128,-74.0060"))?;

        let payload = record.canonical_payload();
        assert_eq!(payload.split('|').count(), 6);
        assert!(payload.ends_with("|40.7128,-74.0060"));
        Ok(())
    }

    #[test]
    fn signature_verifies_against_the_device_key() -> Result<()> {
        let engine = test_engine();
        let record = engine.authenticate(b"some image bytes", "front", None)?;

        let der = base64::engine::general_purpose::STANDARD
            .decode(&record.signature)
            .expect("base64 signature");
        let signature = Signature::from_der(&der).expect("der signature");
        assert!(engine
            .signer()
            .public_key()
            .verify(record.canonical_payload().as_bytes(), &signature)
            .is_ok());
        Ok(())
    }

    #[test]
    fn signing_failure_yields_no_record() {
        let engine =
            AuthenticationEngine::new(FailingSigner, DeviceId::Persisted("device".to_string()));
        let result = engine.authenticate(b"ABC", "back", None);
        assert!(matches!(result, Err(AuthError::SigningFailed(_))));
    }

    #[test]
    fn delimiter_in_fields_is_rejected_before_signing() {
        let engine = test_engine();
        assert!(matches!(
            engine.authenticate(b"ABC", "back|front", None),
            Err(AuthError::FieldRejected(_))
        ));
        assert!(matches!(
            engine.authenticate(b"ABC", "back", Some("40.0|0.0")),
            Err(AuthError::FieldRejected(_))
        ));
        assert!(matches!(
            engine.authenticate(b"ABC", "", None),
            Err(AuthError::FieldRejected(_))
        ));
    }

    #[test]
    fn timestamps_are_canonical_utc_seconds() -> Result<()> {
        let engine = test_engine();
        let record = engine.authenticate(b"ABC", "back", None)?;

        assert!(record.timestamp.ends_with('Z'));
        assert_eq!(record.timestamp.len(), "2026-08-07T10:00:00Z".len());
        Ok(())
    }
}
