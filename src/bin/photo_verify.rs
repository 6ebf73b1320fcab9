//! photo_verify - External verifier for sealed images
//!
//! This tool proves, without trusting the capturing device's runtime:
//! - The image still matches the content hash that was signed
//! - The provenance record was signed by the device key (ECDSA P-256)
//! - The record fields (time, camera, location) are the signed ones
//!
//! Exit code encodes the outcome so scripts can branch on it:
//! 0 valid, 2 no record, 3 tampered, 4 invalid signature.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use photoseal::{load_verifying_key, verify_bytes, VerificationOutcome, VerificationReport};

#[derive(Parser, Debug)]
#[command(
    name = "photo_verify",
    about = "Verify a sealed JPEG against the device public key"
)]
struct Args {
    /// Sealed image to verify
    image: PathBuf,

    /// Device public key (hex-encoded SEC1 P-256 point)
    #[arg(long, value_name = "HEX", conflicts_with = "public_key_file")]
    public_key: Option<String>,

    /// Path to file containing the hex-encoded device public key
    #[arg(long, value_name = "PATH", conflicts_with = "public_key")]
    public_key_file: Option<PathBuf>,

    /// Emit the structured report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let verifying_key = load_verifying_key(
        args.public_key.as_deref(),
        args.public_key_file.as_deref(),
    )?;
    let candidate = std::fs::read(&args.image)
        .with_context(|| format!("failed to read {}", args.image.display()))?;

    let outcome = verify_bytes(&candidate, &verifying_key);
    let report = outcome.report();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&args.image, &report);
    }

    std::process::exit(exit_code(&outcome));
}

fn print_report(image: &std::path::Path, report: &VerificationReport) {
    println!("photo_verify: checking {}", image.display());
    println!("outcome: {}", report.outcome);
    if let Some(record) = &report.record {
        println!("  device_id: {}", record.device_id);
        println!("  timestamp: {}", record.timestamp);
        println!("  camera:    {}", record.camera_position);
        if let Some(location) = &record.location {
            println!("  location:  {}", location);
        }
    }
    if report.valid {
        println!("OK: image bytes and signature verified.");
    } else {
        println!("FAILED: image is not verifiably authentic.");
    }
}

fn exit_code(outcome: &VerificationOutcome) -> i32 {
    match outcome {
        VerificationOutcome::Valid(_) => 0,
        VerificationOutcome::NoRecord => 2,
        VerificationOutcome::Tampered(_) => 3,
        VerificationOutcome::InvalidSignature(_) => 4,
    }
}
