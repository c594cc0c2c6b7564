//! Pickup CLI - issue and verify pickup tokens
//!
//! Usage:
//!   pickup keygen ec            - Print a fresh key file (stdout)
//!   pickup issue --field name=Lee --keys keys.json --out qr.png
//!   pickup verify --input @envelope.json --keys keys.json

mod keys;

use std::path::PathBuf;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use clap::{Parser, Subcommand, ValueEnum};
use pickup_core::{DataType, FieldSet, Issuer, PickupConfig, Verification, Verifier};
use pickup_crypto::{IntegrityKey, TotpSecret};
use pickup_qr::FileLogo;
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::keys::KeyFile;

#[derive(Parser)]
#[command(name = "pickup")]
#[command(author = "HeyBattle1")]
#[command(version)]
#[command(about = "Encrypted, short-lived pickup tokens as QR codes", long_about = None)]
struct Cli {
    /// JSON config file (issuer and verifier sections)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate key material
    Keygen {
        #[arg(value_enum)]
        kind: KeyKind,
    },

    /// Issue a token and render it as a QR code
    Issue {
        /// Identity field, repeatable
        #[arg(long = "field", value_name = "NAME=VALUE", value_parser = parse_field, required = true)]
        fields: Vec<(String, String)>,

        /// Key file with publicKey, totpKey and hmacKey
        #[arg(long)]
        keys: PathBuf,

        /// Key code written into the envelope
        #[arg(long, default_value = "")]
        key_code: String,

        /// Logo drawn in the centre of the code
        #[arg(long)]
        logo: Option<PathBuf>,

        /// Write the PNG here instead of printing it as base64
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Verify a scanned envelope
    Verify {
        /// Envelope or ciphertext text, or @path to read it from a file
        #[arg(long)]
        input: String,

        /// Key file with privateKey, totpKey and hmacKey
        #[arg(long)]
        keys: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KeyKind {
    /// P-256 key file (data type SS)
    Ec,
    /// RSA-2048 key file (data type RS)
    Rsa,
    /// One-time code secret only
    Totp,
    /// Integrity key only
    Hmac,
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))
}

fn read_input(input: &str) -> Result<String> {
    match input.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("Failed to read {path}")),
        None => Ok(input.to_string()),
    }
}

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries JSON only
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PickupConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PickupConfig::default(),
    };

    match cli.command {
        Commands::Keygen { kind } => {
            let output = match kind {
                KeyKind::Ec => serde_json::to_value(KeyFile::generate(DataType::Ecies)?)?,
                KeyKind::Rsa => serde_json::to_value(KeyFile::generate(DataType::Rsa)?)?,
                KeyKind::Totp => json!({ "totpKey": TotpSecret::generate().to_base64().as_str() }),
                KeyKind::Hmac => json!({ "hmacKey": IntegrityKey::generate_text().as_str() }),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Commands::Issue {
            fields,
            keys,
            key_code,
            logo,
            out,
        } => {
            let key_file = KeyFile::load(&keys)?;
            let fields = FieldSet::from_pairs(fields)?;

            let mut issuer = Issuer::new(config.issuer);
            if let Some(path) = logo {
                issuer = issuer.with_logo(FileLogo::new(path));
            }

            let data_type = key_file.key_type_or(issuer.config().data_type);
            let keys = key_file.issuer_keys(data_type)?;
            let issued = issuer.issue(&fields, &keys, &key_code, data_type)?;
            info!(
                data_type = data_type.as_tag(),
                logo_applied = issued.logo_applied,
                "Token issued"
            );

            let mut output = json!({
                "envelope": issued.envelope_json,
                "plaintext": issued.plaintext,
                "logoApplied": issued.logo_applied,
            });
            match out {
                Some(path) => {
                    let png = STANDARD.decode(&issued.qr_code)?;
                    std::fs::write(&path, png)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    output["qrFile"] = json!(path.display().to_string());
                }
                None => output["qrCode"] = json!(issued.qr_code),
            }
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Commands::Verify { input, keys } => {
            let key_file = KeyFile::load(&keys)?;
            let input = read_input(&input)?;

            let verifier = Verifier::new(config.verifier);
            let keys = key_file.verifier_keys(key_file.key_type_or(DataType::default()))?;
            let report = Verification::from(verifier.verify(&input, &keys));
            println!("{}", serde_json::to_string_pretty(&report)?);

            if !report.valid {
                warn!(
                    reason = report.reason.as_deref().unwrap_or_default(),
                    kind = ?report.kind,
                    "Token rejected"
                );
                std::process::exit(1);
            }
            info!("Token verified");
        }
    }

    Ok(())
}
