//! Device signing key management.
//!
//! The device key is an ECDSA P-256 key pair created lazily on first need
//! and bound to a fixed store tag for the lifetime of the installation.
//! Callers only ever see the `Signer` capability: they can sign and read
//! the public key, but the secret scalar never leaves this module.

use p256::ecdsa::signature::Signer as _;
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use zeroize::Zeroize;

use crate::error::{AuthError, Result};
use crate::store::SecureStore;

/// Store tag the signing key lives under.
pub const SIGNING_KEY_TAG: &str = "photoseal:device-signing-key:v1";

/// At-rest format marker for the stored scalar.
const KEY_PREFIX: &str = "p256:";

/// Signing capability over the canonical payload.
///
/// Production keys are non-exportable by construction; test doubles can
/// substitute software signers without touching the store.
pub trait Signer {
    /// Signs `payload` with ECDSA over SHA-256, returning the DER-encoded
    /// signature bytes.
    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>>;

    fn public_key(&self) -> VerifyingKey;
}

/// Handle to the device's P-256 signing key.
pub struct DeviceKey {
    signing_key: SigningKey,
}

impl DeviceKey {
    /// Hex of the SEC1 uncompressed public point, the form handed to the
    /// verifying side.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.signing_key.verifying_key().to_encoded_point(false).as_bytes())
    }
}

impl Signer for DeviceKey {
    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let signature: Signature = self.signing_key.sign(payload);
        Ok(signature.to_der().as_bytes().to_vec())
    }

    fn public_key(&self) -> VerifyingKey {
        *self.signing_key.verifying_key()
    }
}

pub struct KeyManager<S: SecureStore> {
    store: S,
}

impl<S: SecureStore> KeyManager<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Retrieves the device signing key, generating and persisting it on
    /// first use.
    ///
    /// Fails with `KeyUnavailable` when the store cannot be reached or the
    /// stored material is corrupt; no fallback key is substituted.
    pub fn get_or_create_signing_key(&self) -> Result<DeviceKey> {
        if let Some(stored) = self.read_stored_key()? {
            return Ok(stored);
        }

        let signing_key = SigningKey::random(&mut OsRng);
        let mut scalar: [u8; 32] = signing_key.to_bytes().into();
        let mut encoded = format!("{}{}", KEY_PREFIX, hex::encode(scalar));
        scalar.zeroize();

        let created = self.store.put_if_absent(SIGNING_KEY_TAG, encoded.as_bytes());
        encoded.zeroize();

        match created {
            Ok(true) => {
                log::info!("generated device signing key");
                Ok(DeviceKey { signing_key })
            }
            // Lost a first-use race; adopt whatever the winner persisted.
            Ok(false) => self.read_stored_key()?.ok_or_else(|| {
                AuthError::KeyUnavailable("store lost the signing key after creation".into())
            }),
            Err(e) => Err(AuthError::KeyUnavailable(format!(
                "failed to persist signing key: {}",
                e
            ))),
        }
    }

    fn read_stored_key(&self) -> Result<Option<DeviceKey>> {
        let Some(bytes) = self
            .store
            .get(SIGNING_KEY_TAG)
            .map_err(|e| AuthError::KeyUnavailable(format!("store unreachable: {}", e)))?
        else {
            return Ok(None);
        };

        let text = std::str::from_utf8(&bytes)
            .map_err(|_| AuthError::KeyUnavailable("stored key is not valid UTF-8".into()))?;
        let encoded = text.trim();
        let scalar_hex = encoded.strip_prefix(KEY_PREFIX).ok_or_else(|| {
            AuthError::KeyUnavailable("stored key has an unknown format marker".into())
        })?;

        let mut scalar = hex::decode(scalar_hex)
            .map_err(|_| AuthError::KeyUnavailable("stored key is not valid hex".into()))?;
        let signing_key = SigningKey::from_slice(&scalar)
            .map_err(|e| AuthError::KeyUnavailable(format!("stored key is corrupt: {}", e)));
        scalar.zeroize();

        Ok(Some(DeviceKey {
            signing_key: signing_key?,
        }))
    }
}
