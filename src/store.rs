//! Secure storage for long-lived device state.
//!
//! The signing key and the device identifier are created at most once per
//! installation and reused for its lifetime. The store models the platform
//! keystore as tagged entries with create-new semantics: `put_if_absent`
//! never overwrites, so concurrent first-use races resolve to a single
//! winner that every caller then reads back.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{AuthError, Result};

pub trait SecureStore {
    /// Returns the stored value for `tag`, or `None` if absent.
    fn get(&self, tag: &str) -> Result<Option<Vec<u8>>>;

    /// Stores `value` under `tag` unless an entry already exists.
    ///
    /// Returns `true` when this call created the entry. A `false` return
    /// means another writer won; callers re-read and adopt the winner.
    fn put_if_absent(&self, tag: &str, value: &[u8]) -> Result<bool>;
}

/// File-per-tag store rooted at a local directory.
///
/// Entries are written create-new with mode `0o600` on unix and fsynced
/// before the create is reported, so a tag that `get` returns was durably
/// persisted.
pub struct FilesystemSecureStore {
    root: PathBuf,
}

impl FilesystemSecureStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, tag: &str) -> PathBuf {
        self.root.join(tag_file_name(tag))
    }
}

impl SecureStore for FilesystemSecureStore {
    fn get(&self, tag: &str) -> Result<Option<Vec<u8>>> {
        let path = self.entry_path(tag);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read(&path)?))
    }

    fn put_if_absent(&self, tag: &str, value: &[u8]) -> Result<bool> {
        let path = self.entry_path(tag);

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = match options.open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                return Ok(false);
            }
            Err(err) => return Err(AuthError::Io(err)),
        };

        file.write_all(value).and_then(|_| file.sync_all())?;
        Ok(true)
    }
}

/// Map a tag like `photoseal:device-id:v1` to a flat file name.
fn tag_file_name(tag: &str) -> String {
    tag.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[derive(Default)]
pub struct InMemorySecureStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemorySecureStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecureStore for InMemorySecureStore {
    fn get(&self, tag: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.lock().expect("store lock");
        Ok(entries.get(tag).cloned())
    }

    fn put_if_absent(&self, tag: &str, value: &[u8]) -> Result<bool> {
        let mut entries = self.entries.lock().expect("store lock");
        if entries.contains_key(tag) {
            return Ok(false);
        }
        entries.insert(tag.to_string(), value.to_vec());
        Ok(true)
    }
}

/// Write `data` to `path` via a temp file + rename so readers never observe
/// a partially written image.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filesystem_store_round_trips() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = FilesystemSecureStore::open(dir.path().join("store"))?;

        assert!(store.get("photoseal:test:v1")?.is_none());
        assert!(store.put_if_absent("photoseal:test:v1", b"value-a")?);
        assert_eq!(
            store.get("photoseal:test:v1")?.as_deref(),
            Some(b"value-a".as_ref())
        );
        Ok(())
    }

    #[test]
    fn put_if_absent_never_overwrites() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = FilesystemSecureStore::open(dir.path())?;

        assert!(store.put_if_absent("tag", b"first")?);
        assert!(!store.put_if_absent("tag", b"second")?);
        assert_eq!(store.get("tag")?.as_deref(), Some(b"first".as_ref()));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn filesystem_entries_are_owner_only() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir()?;
        let store = FilesystemSecureStore::open(dir.path())?;
        store.put_if_absent("tag", b"secret")?;

        let mode = fs::metadata(store.root().join("tag"))?.permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        Ok(())
    }

    #[test]
    fn tags_map_to_flat_file_names() {
        assert_eq!(
            tag_file_name("photoseal:device-id:v1"),
            "photoseal_device-id_v1"
        );
    }

    #[test]
    fn in_memory_store_matches_contract() -> Result<()> {
        let store = InMemorySecureStore::new();
        assert!(store.get("tag")?.is_none());
        assert!(store.put_if_absent("tag", b"a")?);
        assert!(!store.put_if_absent("tag", b"b")?);
        assert_eq!(store.get("tag")?.as_deref(), Some(b"a".as_ref()));
        Ok(())
    }

    #[test]
    fn write_atomic_replaces_content() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("sealed.jpg");
        write_atomic(&path, b"one")?;
        write_atomic(&path, b"two")?;
        assert_eq!(fs::read(&path)?, b"two");
        Ok(())
    }
}
