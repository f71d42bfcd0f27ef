//! Veilpost Services Library
//!
//! This crate provides the workflows that sit on top of the core types: the
//! account purge and the sealed record vault.

pub mod purge;
pub mod vault;

// Test helpers (only available in test mode)
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

// Re-export commonly used types
pub use purge::{FileDeletion, FileOutcome, PurgeCoordinator, PurgeReport, PurgeStatus, StepOutcome};
pub use vault::{PostFields, RecordVault};
