//! Hooks for the systems the pipeline does not own
//!
//! The account purge needs to find and delete a user's records and end their
//! sessions. Those live in the host application's database and auth layer; the
//! host implements these traits and hands them to the services.

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{RecordKey, StoragePath, UserId};

/// Access to the records that reference a user's stored assets.
#[async_trait]
pub trait PrivacyRepository: Send + Sync {
    /// Storage paths of every asset referenced by the user's records.
    async fn find_paths_for_user(&self, user_id: UserId) -> Result<Vec<StoragePath>, AppError>;

    /// Delete every record owned by the user. Returns the number of rows removed.
    async fn delete_all_for_user(&self, user_id: UserId) -> Result<u64, AppError>;

    /// Read one encrypted field as stored (an envelope string), if present.
    async fn read_encrypted_field(&self, key: &RecordKey) -> Result<Option<String>, AppError>;

    /// Store an encrypted field for a record owned by `user_id`.
    async fn write_encrypted_field(
        &self,
        user_id: UserId,
        key: &RecordKey,
        envelope: &str,
    ) -> Result<(), AppError>;
}

/// Ends a user's active sessions.
#[async_trait]
pub trait SessionTerminator: Send + Sync {
    async fn terminate(&self, user_id: UserId) -> Result<(), AppError>;
}
