//! Veilpost CLI: scrub and inspect media, encrypt and decrypt fields.
//!
//! Configuration comes from the environment (see `PrivacyConfig`); the
//! encryption commands derive the key from ENCRYPTION_KEY.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use veilpost_cli::{init_tracing, summarize_segments};
use veilpost_core::{FieldEncryptionService, PrivacyConfig};
use veilpost_processing::{
    capture_snapshot, content_type_for, detect_format, MetadataScrubber, RawUpload, UploadPipeline,
    UploadSettings,
};
use veilpost_storage::LocalAssetStore;

#[derive(Parser)]
#[command(name = "veilpost", about = "Privacy pipeline for user-submitted media and records")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Remove metadata from an image
    Scrub {
        /// Path to the file to scrub
        file: PathBuf,
        /// Declared content type (e.g. image/jpeg)
        #[arg(long)]
        content_type: String,
        /// Write the scrubbed file here
        #[arg(long, conflicts_with = "store")]
        output: Option<PathBuf>,
        /// Run the full upload pipeline and persist into STORAGE_ROOT
        #[arg(long)]
        store: bool,
    },
    /// List JPEG marker segments and the EXIF fields present
    Inspect {
        /// Path to the file to inspect
        file: PathBuf,
    },
    /// Encrypt a text value
    Encrypt { plaintext: String },
    /// Decrypt an iv:tag:ciphertext envelope
    Decrypt { envelope: String },
    /// Encrypt a JSON document
    EncryptJson { json: String },
    /// Decrypt an envelope holding a JSON document
    DecryptJson { envelope: String },
}

#[derive(Serialize)]
struct ScrubSummary {
    format: veilpost_core::DetectedFormat,
    metadata_removed: bool,
    size_before: usize,
    size_after: usize,
    output: Option<PathBuf>,
    warnings: Vec<String>,
}

#[derive(Serialize)]
struct InspectReport {
    format: veilpost_core::DetectedFormat,
    /// Content type an upload of this file must declare.
    content_type: Option<&'static str>,
    segments: Option<Vec<veilpost_cli::SegmentSummary>>,
    exif: Option<std::collections::BTreeMap<String, String>>,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

fn encryption_service(config: &PrivacyConfig) -> anyhow::Result<FieldEncryptionService> {
    let key = config
        .key_material()
        .context("Failed to derive encryption key")?;
    Ok(FieldEncryptionService::new(&key))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = PrivacyConfig::from_env().context("Invalid configuration")?;

    match cli.command {
        Commands::Scrub {
            file,
            content_type,
            output,
            store,
        } => {
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;

            if store {
                let asset_store = LocalAssetStore::new(&config.storage_root)
                    .await
                    .context("Failed to open asset store")?;
                let pipeline =
                    UploadPipeline::new(Arc::new(asset_store), UploadSettings::from_config(&config));
                let result = pipeline.process(RawUpload::new(data, content_type)).await;
                print_json(&result)?;
            } else {
                let format = detect_format(&data, &content_type);
                let scrubber = MetadataScrubber::new(config.video_policy);
                let outcome = scrubber
                    .scrub(&data, format)
                    .with_context(|| format!("Failed to scrub {}", file.display()))?;

                if let Some(path) = &output {
                    tokio::fs::write(path, &outcome.bytes)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                }

                print_json(&ScrubSummary {
                    format,
                    metadata_removed: outcome.metadata_removed,
                    size_before: data.len(),
                    size_after: outcome.bytes.len(),
                    output,
                    warnings: outcome.warnings,
                })?;
            }
        }
        Commands::Inspect { file } => {
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let format = veilpost_processing::sniff(&data);
            let segments = if format == veilpost_core::DetectedFormat::Jpeg {
                Some(summarize_segments(&data).context("Failed to walk JPEG segments")?)
            } else {
                None
            };
            print_json(&InspectReport {
                format,
                content_type: content_type_for(format),
                segments,
                exif: capture_snapshot(&data),
            })?;
        }
        Commands::Encrypt { plaintext } => {
            let service = encryption_service(&config)?;
            let envelope = service
                .encrypt_field(&plaintext)
                .context("Encryption failed")?;
            println!("{}", envelope);
        }
        Commands::Decrypt { envelope } => {
            let service = encryption_service(&config)?;
            let plaintext = service
                .decrypt_field(&envelope)
                .context("Decryption failed")?;
            println!("{}", plaintext);
        }
        Commands::EncryptJson { json } => {
            let service = encryption_service(&config)?;
            let value: serde_json::Value =
                serde_json::from_str(&json).context("Input is not valid JSON")?;
            let envelope = service
                .encrypt_structured(&value)
                .context("Encryption failed")?;
            println!("{}", envelope);
        }
        Commands::DecryptJson { envelope } => {
            let service = encryption_service(&config)?;
            let value: serde_json::Value = service
                .decrypt_structured(&envelope)
                .context("Decryption failed")?;
            print_json(&value)?;
        }
    }

    Ok(())
}
