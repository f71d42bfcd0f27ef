//! Veilpost Core Library
//!
//! This crate provides the error taxonomy, configuration, field encryption and
//! shared domain types used by every part of the privacy pipeline.

pub mod config;
pub mod constants;
pub mod encryption;
pub mod error;
pub mod hooks;
pub mod models;

// Re-export commonly used types
pub use config::{PrivacyConfig, VideoPolicy};
pub use encryption::{
    derive_key_material, DecryptionError, EncryptionError, FieldEncryptionService, KdfParams,
    KeyMaterial,
};
pub use error::{log_error, AppError, ErrorMetadata, LogLevel};
pub use hooks::{PrivacyRepository, SessionTerminator};
pub use models::{
    DetectedFormat, RasterFormat, RecordKey, ScrubErrorKind, ScrubResult, SealedField,
    StorageIdentifier, StoragePath, UserId, VideoContainer,
};
