//! device_info - Print the device identity and verifying key
//!
//! Run on the capturing device to provision the verifying side: the printed
//! public key is what `photo_verify` takes via --public-key/--public-key-file.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use photoseal::{DeviceIdentity, FilesystemSecureStore, KeyManager, StoreConfig};

#[derive(Parser, Debug)]
#[command(
    name = "device_info",
    about = "Print the device id and hex public key for this installation"
)]
struct Args {
    /// Secure store directory holding the device key and identifier
    #[arg(long, env = "PHOTOSEAL_STORE_DIR", value_name = "DIR")]
    store_dir: Option<PathBuf>,

    /// Emit JSON instead of text
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = match &args.store_dir {
        Some(dir) => StoreConfig::with_dir(dir),
        None => StoreConfig::load()?,
    };

    let key = KeyManager::new(FilesystemSecureStore::open(&cfg.store_dir)?)
        .get_or_create_signing_key()?;
    let device_id = DeviceIdentity::new(FilesystemSecureStore::open(&cfg.store_dir)?)
        .get_or_create_device_id();

    if args.json {
        let info = serde_json::json!({
            "device_id": device_id.as_str(),
            "persisted": device_id.is_persisted(),
            "public_key": key.public_key_hex(),
        });
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        let durability = if device_id.is_persisted() {
            "persisted"
        } else {
            "ephemeral"
        };
        println!("device_id:  {} ({})", device_id.as_str(), durability);
        println!("public_key: {}", key.public_key_hex());
    }
    Ok(())
}
