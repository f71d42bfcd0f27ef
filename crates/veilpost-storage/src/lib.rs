//! Veilpost Storage Library
//!
//! This crate provides the asset store abstraction, its local filesystem
//! implementation and the secure name generator.
//!
//! # Storage layout
//!
//! Everything lives under one storage root:
//!
//! - **Temp area**: `temp/{random}` holds pre-scrub bytes for the duration of one upload
//! - **Permanent area**: `uploads/{identifier}` holds scrubbed assets
//!
//! Keys must not contain `..` or a leading `/`. Permanent keys are only ever
//! built from a [`StorageIdentifier`](veilpost_core::StorageIdentifier), never
//! from a client-supplied filename.

pub mod keys;
pub mod local;
pub mod traits;

// Re-export commonly used types
pub use keys::generate_storage_identifier;
pub use local::LocalAssetStore;
pub use traits::{AssetStore, DeleteOutcome, StorageError, StorageResult, TempPath};
