//! Test helpers for service tests
//!
//! In-memory collaborators with failure injection, so purge and vault
//! scenarios run without a database or auth backend.

pub mod mock_collaborators;

pub use mock_collaborators::{FailingAssetStore, InMemoryRepository, RecordingSessions};

use veilpost_core::{FieldEncryptionService, KeyMaterial};

/// Field encryption under a fixed test key.
pub fn test_encryption() -> FieldEncryptionService {
    FieldEncryptionService::new(&KeyMaterial::from_bytes([42; 32]))
}
