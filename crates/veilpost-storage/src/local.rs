use crate::traits::{AssetStore, DeleteOutcome, StorageError, StorageResult, TempPath};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;
use veilpost_core::constants::{TEMP_DIR, UPLOADS_DIR};
use veilpost_core::{StorageIdentifier, StoragePath};

/// Local filesystem asset store
#[derive(Clone)]
pub struct LocalAssetStore {
    base_path: PathBuf,
}

impl LocalAssetStore {
    /// Create a new LocalAssetStore instance
    ///
    /// # Arguments
    /// * `base_path` - Storage root (e.g., "/var/lib/veilpost"); `temp/` and
    ///   `uploads/` are created below it
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        for dir in [TEMP_DIR, UPLOADS_DIR] {
            let path = base_path.join(dir);
            fs::create_dir_all(&path).await.map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to create storage directory {}: {}",
                    path.display(),
                    e
                ))
            })?;
        }

        Ok(LocalAssetStore { base_path })
    }

    /// Convert storage key to filesystem path with security validation
    ///
    /// Rejects keys containing path traversal sequences, absolute keys and
    /// keys that resolve outside the storage root.
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        if storage_key.contains("..") || storage_key.starts_with('/') || storage_key.contains('\\') {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }

        let path = self.base_path.join(storage_key);

        let base_canonical = self.base_path.canonicalize().map_err(|e| {
            StorageError::ConfigError(format!("Failed to canonicalize base path: {}", e))
        })?;

        if let Ok(canonical) = path.canonicalize() {
            if canonical.strip_prefix(&base_canonical).is_err() {
                return Err(StorageError::InvalidKey(
                    "Storage key resolves outside storage directory".to_string(),
                ));
            }
        }

        Ok(path)
    }

    async fn write_file(path: &Path, data: &[u8]) -> StorageResult<()> {
        let mut file = fs::File::create(path).await.map_err(|e| {
            StorageError::IoFailure(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        file.write_all(data).await.map_err(|e| {
            StorageError::IoFailure(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::IoFailure(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        Ok(())
    }

    async fn read_file(path: &Path, key: &str) -> StorageResult<Vec<u8>> {
        if !fs::try_exists(path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(key.to_string()));
        }

        fs::read(path).await.map_err(|e| {
            StorageError::IoFailure(format!("Failed to read file {}: {}", path.display(), e))
        })
    }
}

#[async_trait]
impl AssetStore for LocalAssetStore {
    async fn write_temp(&self, data: &[u8]) -> StorageResult<TempPath> {
        let temp = TempPath::new(Uuid::new_v4().simple().to_string());
        let path = self.key_to_path(&temp.key())?;

        Self::write_file(&path, data).await?;

        tracing::debug!(key = %temp, size_bytes = data.len(), "Staged upload in temp area");

        Ok(temp)
    }

    async fn read_temp(&self, temp: &TempPath) -> StorageResult<Vec<u8>> {
        let key = temp.key();
        let path = self.key_to_path(&key)?;
        Self::read_file(&path, &key).await
    }

    async fn cleanup_temp(&self, temp: &TempPath) -> StorageResult<()> {
        let path = self.key_to_path(&temp.key())?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(key = %temp, "Removed temp file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::IoFailure(format!(
                "Failed to remove temp file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn persist(
        &self,
        temp: &TempPath,
        identifier: &StorageIdentifier,
    ) -> StorageResult<StoragePath> {
        let from_path = self.key_to_path(&temp.key())?;
        let storage_path = StoragePath::for_identifier(identifier.clone());
        let to_path = self.key_to_path(&storage_path.key())?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&from_path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(temp.key()));
        }

        if let Err(rename_err) = fs::rename(&from_path, &to_path).await {
            // Rename fails across devices; fall back to copy + remove.
            tracing::debug!(
                error = %rename_err,
                key = %storage_path,
                "Rename failed, copying into permanent area"
            );
            copy_into_place(&from_path, &to_path).await?;
            if let Err(e) = fs::remove_file(&from_path).await {
                tracing::warn!(error = %e, key = %temp, "Failed to remove temp file after copy");
            }
        }

        tracing::info!(
            key = %storage_path,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Asset persisted"
        );

        Ok(storage_path)
    }

    async fn delete(&self, path: &StoragePath) -> StorageResult<DeleteOutcome> {
        let key = path.key();
        let file_path = self.key_to_path(&key)?;
        let start = std::time::Instant::now();

        match fs::remove_file(&file_path).await {
            Ok(()) => {
                tracing::info!(
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Asset deleted"
                );
                Ok(DeleteOutcome::Deleted)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(key = %key, "Asset already absent");
                Ok(DeleteOutcome::AlreadyAbsent)
            }
            Err(e) => Err(StorageError::IoFailure(format!(
                "Failed to delete file {}: {}",
                file_path.display(),
                e
            ))),
        }
    }

    async fn read(&self, path: &StoragePath) -> StorageResult<Vec<u8>> {
        let key = path.key();
        let file_path = self.key_to_path(&key)?;
        Self::read_file(&file_path, &key).await
    }

    async fn exists(&self, path: &StoragePath) -> StorageResult<bool> {
        let file_path = self.key_to_path(&path.key())?;
        Ok(fs::try_exists(&file_path).await.unwrap_or(false))
    }
}

/// Copy `from` to `to`. A failed copy removes whatever part of `to` was written.
async fn copy_into_place(from: &Path, to: &Path) -> StorageResult<()> {
    if let Err(e) = fs::copy(from, to).await {
        if let Err(cleanup_err) = fs::remove_file(to).await {
            if cleanup_err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    error = %cleanup_err,
                    path = %to.display(),
                    "Failed to remove partial copy"
                );
            }
        }
        return Err(StorageError::IoFailure(format!(
            "Failed to copy {} to {}: {}",
            from.display(),
            to.display(),
            e
        )));
    }
    Ok(())
}
