//! photo_sign - Seal a captured JPEG with device provenance evidence
//!
//! Reads the image, signs its exact bytes with the device key, embeds the
//! record in the container, and writes the sealed copy. The input file is
//! never modified.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

use photoseal::store::write_atomic;
use photoseal::{
    AuthenticationEngine, DeviceIdentity, FilesystemSecureStore, KeyManager, StoreConfig,
};

#[derive(Parser, Debug)]
#[command(
    name = "photo_sign",
    about = "Sign a captured JPEG and embed the provenance record"
)]
struct Args {
    /// Input JPEG
    input: PathBuf,

    /// Output path (defaults to <input>.sealed.jpg)
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Camera label recorded at capture time
    #[arg(long, default_value = "back")]
    camera_position: String,

    /// Optional "lat,lon" captured alongside the photo
    #[arg(long)]
    location: Option<String>,

    /// Secure store directory holding the device key and identifier
    #[arg(long, env = "PHOTOSEAL_STORE_DIR", value_name = "DIR")]
    store_dir: Option<PathBuf>,
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
    let engine = AuthenticationEngine::new(key, device_id);

    let image = std::fs::read(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let sealed =
        engine.authenticate_and_embed(&image, &args.camera_position, args.location.as_deref())?;

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output(&args.input));
    write_atomic(&output, &sealed)
        .with_context(|| format!("failed to write {}", output.display()))?;

    let record = photoseal::extract_record(&sealed)
        .context("sealed image does not carry its record")?;
    println!("sealed {} -> {}", args.input.display(), output.display());
    println!("  device_id: {}", record.device_id);
    println!("  timestamp: {}", record.timestamp);
    println!("  hash:      {}", record.image_hash);
    if let Some(location) = &record.location {
        println!("  location:  {}", location);
    }
    Ok(())
}

fn default_output(input: &Path) -> PathBuf {
    input.with_extension("sealed.jpg")
}
