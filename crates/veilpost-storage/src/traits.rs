//! Asset store abstraction trait
//!
//! This module defines the AssetStore trait that storage backends implement.

use async_trait::async_trait;
use std::fmt::{Display, Formatter, Result as FmtResult};
use thiserror::Error;
use veilpost_core::constants::TEMP_DIR;
use veilpost_core::{AppError, StorageIdentifier, StoragePath};

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO failure: {0}")]
    IoFailure(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::IoFailure(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ConfigError(msg) => AppError::Configuration(msg),
            other => AppError::IoFailure(other.to_string()),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result of a delete call. A missing file is not an error: the caller wanted
/// it gone and it is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    AlreadyAbsent,
}

/// Handle to bytes staged in the temp area.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TempPath {
    name: String,
}

impl TempPath {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Key relative to the storage root.
    pub fn key(&self) -> String {
        format!("{}/{}", TEMP_DIR, self.name)
    }
}

impl Display for TempPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}", TEMP_DIR, self.name)
    }
}

/// Asset store trait
///
/// The upload pipeline stages bytes in the temp area, then moves the scrubbed
/// result into the permanent area under a generated identifier. The purge
/// coordinator deletes permanent assets by path.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Stage bytes in the temp area under a fresh random name.
    async fn write_temp(&self, data: &[u8]) -> StorageResult<TempPath>;

    /// Read staged bytes back.
    async fn read_temp(&self, temp: &TempPath) -> StorageResult<Vec<u8>>;

    /// Remove a staged file. Removing an already-removed file succeeds.
    async fn cleanup_temp(&self, temp: &TempPath) -> StorageResult<()>;

    /// Move a staged file into the permanent area.
    async fn persist(
        &self,
        temp: &TempPath,
        identifier: &StorageIdentifier,
    ) -> StorageResult<StoragePath>;

    /// Delete a permanent asset.
    async fn delete(&self, path: &StoragePath) -> StorageResult<DeleteOutcome>;

    /// Read a permanent asset.
    async fn read(&self, path: &StoragePath) -> StorageResult<Vec<u8>>;

    /// Check if a permanent asset exists.
    async fn exists(&self, path: &StoragePath) -> StorageResult<bool>;
}
