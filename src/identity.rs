//! Stable per-device identity.
//!
//! The identifier is an opaque UUID, not a personal identifier. It is
//! generated once, persisted, and reused; callers can always see whether
//! the value they got is durable.

use uuid::Uuid;

use crate::store::SecureStore;

/// Store tag the device identifier lives under.
pub const DEVICE_ID_TAG: &str = "photoseal:device-id:v1";

/// A device identifier plus its durability.
///
/// `Ephemeral` means the store could not persist the value: it is valid for
/// this call but will not survive, and records signed with it will carry an
/// id that later calls may not reproduce. There is no silent fallback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceId {
    Persisted(String),
    Ephemeral(String),
}

impl DeviceId {
    pub fn as_str(&self) -> &str {
        match self {
            DeviceId::Persisted(id) | DeviceId::Ephemeral(id) => id,
        }
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self, DeviceId::Persisted(_))
    }
}

pub struct DeviceIdentity<S: SecureStore> {
    store: S,
}

impl<S: SecureStore> DeviceIdentity<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the device identifier, creating and persisting it on first
    /// use. Idempotent once a `Persisted` value has been returned.
    pub fn get_or_create_device_id(&self) -> DeviceId {
        match self.read_stored_id() {
            Some(id) => DeviceId::Persisted(id),
            None => self.create_id(),
        }
    }

    fn create_id(&self) -> DeviceId {
        let id = Uuid::new_v4().to_string();
        match self.store.put_if_absent(DEVICE_ID_TAG, id.as_bytes()) {
            Ok(true) => {
                log::info!("generated device identifier");
                DeviceId::Persisted(id)
            }
            // Lost a first-use race; the winner's id is the device id.
            Ok(false) => match self.read_stored_id() {
                Some(winner) => DeviceId::Persisted(winner),
                None => {
                    log::warn!("device id store lost the entry after creation; using ephemeral id");
                    DeviceId::Ephemeral(id)
                }
            },
            Err(e) => {
                log::warn!("device id store unavailable ({}); using ephemeral id", e);
                DeviceId::Ephemeral(id)
            }
        }
    }

    fn read_stored_id(&self) -> Option<String> {
        let bytes = self.store.get(DEVICE_ID_TAG).ok()??;
        let text = std::str::from_utf8(&bytes).ok()?;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(trimmed.to_string())
    }
}
