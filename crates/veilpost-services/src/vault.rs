//! Sealed record vault
//!
//! Post fields and platform credentials are only ever handed to the
//! persistence layer as ciphertext envelopes. A record whose envelope fails to
//! decrypt is reported as a data-integrity error for that record alone.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;
use veilpost_core::{
    AppError, DecryptionError, FieldEncryptionService, PrivacyRepository, RecordKey, SealedField,
    StoragePath, UserId,
};

/// Plaintext post fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostFields {
    pub title: String,
    pub description: Option<String>,
    pub file_path: Option<StoragePath>,
}

pub struct RecordVault {
    repository: Arc<dyn PrivacyRepository>,
    encryption: FieldEncryptionService,
}

impl RecordVault {
    pub fn new(repository: Arc<dyn PrivacyRepository>, encryption: FieldEncryptionService) -> Self {
        Self {
            repository,
            encryption,
        }
    }

    pub async fn seal_post(
        &self,
        user_id: UserId,
        record_id: Uuid,
        post: &PostFields,
    ) -> Result<(), AppError> {
        let title = self.encryption.encrypt_field(&post.title)?.to_string();
        self.repository
            .write_encrypted_field(user_id, &RecordKey::new(record_id, SealedField::PostTitle), &title)
            .await?;

        if let Some(description) = self.encryption.encrypt_optional(post.description.as_deref())? {
            self.repository
                .write_encrypted_field(
                    user_id,
                    &RecordKey::new(record_id, SealedField::PostDescription),
                    &description,
                )
                .await?;
        }

        let file_path = post.file_path.as_ref().map(|p| p.key());
        if let Some(file_path) = self.encryption.encrypt_optional(file_path.as_deref())? {
            self.repository
                .write_encrypted_field(
                    user_id,
                    &RecordKey::new(record_id, SealedField::PostFilePath),
                    &file_path,
                )
                .await?;
        }

        tracing::debug!(record_id = %record_id, user_id = %user_id, "Sealed post fields");
        Ok(())
    }

    /// Read and decrypt a post. `Ok(None)` if the record does not exist.
    pub async fn open_post(&self, record_id: Uuid) -> Result<Option<PostFields>, AppError> {
        let Some(title) = self.read_text(RecordKey::new(record_id, SealedField::PostTitle)).await?
        else {
            return Ok(None);
        };
        let description = self
            .read_text(RecordKey::new(record_id, SealedField::PostDescription))
            .await?;
        let file_path = match self
            .read_text(RecordKey::new(record_id, SealedField::PostFilePath))
            .await?
        {
            Some(raw) => Some(StoragePath::parse(&raw).ok_or_else(|| {
                AppError::DeserializationError("stored file path is not a storage path".to_string())
            })?),
            None => None,
        };

        Ok(Some(PostFields {
            title,
            description,
            file_path,
        }))
    }

    pub async fn seal_credentials<T: Serialize + ?Sized>(
        &self,
        user_id: UserId,
        record_id: Uuid,
        credentials: &T,
    ) -> Result<(), AppError> {
        let envelope = self.encryption.encrypt_structured(credentials)?.to_string();
        self.repository
            .write_encrypted_field(
                user_id,
                &RecordKey::new(record_id, SealedField::PlatformCredentials),
                &envelope,
            )
            .await?;

        tracing::debug!(record_id = %record_id, user_id = %user_id, "Sealed platform credentials");
        Ok(())
    }

    pub async fn open_credentials<T: DeserializeOwned>(
        &self,
        record_id: Uuid,
    ) -> Result<Option<T>, AppError> {
        let key = RecordKey::new(record_id, SealedField::PlatformCredentials);
        let Some(envelope) = self.repository.read_encrypted_field(&key).await? else {
            return Ok(None);
        };

        self.encryption
            .decrypt_structured(&envelope)
            .map(Some)
            .map_err(|e| integrity_error(&key, e))
    }

    async fn read_text(&self, key: RecordKey) -> Result<Option<String>, AppError> {
        let envelope = self.repository.read_encrypted_field(&key).await?;
        self.encryption
            .decrypt_optional(envelope.as_deref())
            .map_err(|e| integrity_error(&key, e))
    }
}

fn integrity_error(key: &RecordKey, err: DecryptionError) -> AppError {
    tracing::error!(record = %key, error = %err, "Stored field failed to decrypt");
    AppError::from(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{test_encryption, InMemoryRepository};
    use serde_json::json;
    use veilpost_core::{DetectedFormat, ErrorMetadata, KeyMaterial, StorageIdentifier};

    fn vault() -> (RecordVault, Arc<InMemoryRepository>) {
        let repository = Arc::new(InMemoryRepository::new(Some(test_encryption())));
        (
            RecordVault::new(repository.clone(), test_encryption()),
            repository,
        )
    }

    fn post() -> PostFields {
        PostFields {
            title: "Protest in the square".to_string(),
            description: Some("Bring water".to_string()),
            file_path: Some(StoragePath::for_identifier(
                StorageIdentifier::from_random([7; 16], DetectedFormat::Jpeg).unwrap(),
            )),
        }
    }

    #[tokio::test]
    async fn test_post_round_trip() {
        let (vault, repository) = vault();
        let user = UserId(Uuid::new_v4());
        let record_id = Uuid::new_v4();

        vault.seal_post(user, record_id, &post()).await.unwrap();

        let stored = repository
            .raw_field(&RecordKey::new(record_id, SealedField::PostTitle))
            .unwrap();
        assert!(!stored.contains("Protest"));
        assert_eq!(stored.split(':').count(), 3);

        assert_eq!(vault.open_post(record_id).await.unwrap(), Some(post()));
        assert!(vault.open_post(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_optional_fields_stay_absent() {
        let (vault, repository) = vault();
        let record_id = Uuid::new_v4();
        let bare = PostFields {
            title: "t".to_string(),
            description: None,
            file_path: None,
        };

        vault
            .seal_post(UserId(Uuid::new_v4()), record_id, &bare)
            .await
            .unwrap();

        assert!(repository
            .raw_field(&RecordKey::new(record_id, SealedField::PostDescription))
            .is_none());
        assert_eq!(vault.open_post(record_id).await.unwrap(), Some(bare));
    }

    #[tokio::test]
    async fn test_credentials_round_trip() {
        let (vault, _) = vault();
        let record_id = Uuid::new_v4();
        let credentials = json!({"access_token": "tok", "refresh_token": "ref"});

        vault
            .seal_credentials(UserId(Uuid::new_v4()), record_id, &credentials)
            .await
            .unwrap();

        let opened: serde_json::Value = vault.open_credentials(record_id).await.unwrap().unwrap();
        assert_eq!(opened, credentials);
    }

    #[tokio::test]
    async fn test_tampered_record_is_data_integrity_error() {
        let (vault, repository) = vault();
        let user = UserId(Uuid::new_v4());
        let record_id = Uuid::new_v4();
        vault.seal_post(user, record_id, &post()).await.unwrap();

        let key = RecordKey::new(record_id, SealedField::PostTitle);
        let stored = repository.raw_field(&key).unwrap();
        let mut tampered: Vec<char> = stored.chars().collect();
        let last = tampered.len() - 1;
        tampered[last] = if tampered[last] == '0' { '1' } else { '0' };
        repository.set_raw_field(user, key, tampered.into_iter().collect());

        let err = vault.open_post(record_id).await.unwrap_err();
        assert!(matches!(err, AppError::AuthenticationFailure));
        assert!(err.is_data_integrity());
        assert!(!err.is_recoverable());
    }

    #[tokio::test]
    async fn test_wrong_key_cannot_open() {
        let (vault, repository) = vault();
        let record_id = Uuid::new_v4();
        vault
            .seal_post(UserId(Uuid::new_v4()), record_id, &post())
            .await
            .unwrap();

        let other = RecordVault::new(
            repository,
            FieldEncryptionService::new(&KeyMaterial::from_bytes([9; 32])),
        );
        assert!(matches!(
            other.open_post(record_id).await,
            Err(AppError::AuthenticationFailure)
        ));
    }
}
