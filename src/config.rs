//! Store configuration for the command-line tools.
//!
//! Layering: optional JSON config file named by `PHOTOSEAL_CONFIG`, then
//! environment overrides, then validation.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{AuthError, Result};

const DEFAULT_STORE_DIR: &str = "photoseal_store";

#[derive(Debug, Deserialize, Default)]
struct StoreConfigFile {
    store_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory the secure store roots its entries under.
    pub store_dir: PathBuf,
}

impl StoreConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("PHOTOSEAL_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn with_dir(store_dir: impl Into<PathBuf>) -> Self {
        Self {
            store_dir: store_dir.into(),
        }
    }

    fn from_file(file: StoreConfigFile) -> Self {
        Self {
            store_dir: file
                .store_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIR)),
        }
    }

    fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var("PHOTOSEAL_STORE_DIR") {
            if !dir.trim().is_empty() {
                self.store_dir = PathBuf::from(dir);
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.store_dir.as_os_str().is_empty() {
            return Err(AuthError::Config("store_dir must not be empty".into()));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<StoreConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| AuthError::Config(format!("failed to read config file {}: {}", path.display(), e)))?;
    serde_json::from_str(&raw)
        .map_err(|e| AuthError::Config(format!("invalid config file {}: {}", path.display(), e)))
}
