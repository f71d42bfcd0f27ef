//! Mock collaborator implementations for testing

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;
use veilpost_core::{
    AppError, FieldEncryptionService, PrivacyRepository, RecordKey, SealedField,
    SessionTerminator, StorageIdentifier, StoragePath, UserId,
};
use veilpost_storage::{AssetStore, DeleteOutcome, StorageError, StorageResult, TempPath};

/// Encrypted fields keyed by record, with their owner.
#[derive(Clone)]
pub struct InMemoryRepository {
    fields: Arc<Mutex<HashMap<RecordKey, (UserId, String)>>>,
    encryption: Option<FieldEncryptionService>,
    fail_collect: Arc<AtomicBool>,
    fail_delete: Arc<AtomicBool>,
}

impl InMemoryRepository {
    /// With `Some(encryption)`, file paths are stored and read as envelopes;
    /// with `None` they are stored as plain text.
    pub fn new(encryption: Option<FieldEncryptionService>) -> Self {
        Self {
            fields: Arc::new(Mutex::new(HashMap::new())),
            encryption,
            fail_collect: Arc::new(AtomicBool::new(false)),
            fail_delete: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Add a post record referencing `path`. Returns the record id.
    pub fn add_post_with_path(&self, user_id: UserId, path: &StoragePath) -> Uuid {
        let record_id = Uuid::new_v4();
        let value = match &self.encryption {
            Some(encryption) => encryption.encrypt_field(&path.key()).unwrap().to_string(),
            None => path.key(),
        };
        self.set_raw_field(
            user_id,
            RecordKey::new(record_id, SealedField::PostFilePath),
            value,
        );
        record_id
    }

    pub fn raw_field(&self, key: &RecordKey) -> Option<String> {
        self.fields
            .lock()
            .unwrap()
            .get(key)
            .map(|(_, value)| value.clone())
    }

    pub fn set_raw_field(&self, user_id: UserId, key: RecordKey, value: String) {
        self.fields.lock().unwrap().insert(key, (user_id, value));
    }

    pub fn record_count(&self, user_id: UserId) -> usize {
        self.fields
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, (owner, _))| *owner == user_id)
            .map(|(key, _)| key.record_id)
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn fail_collect(&self) {
        self.fail_collect.store(true, Ordering::SeqCst);
    }

    pub fn fail_delete(&self) {
        self.fail_delete.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl PrivacyRepository for InMemoryRepository {
    async fn find_paths_for_user(&self, user_id: UserId) -> Result<Vec<StoragePath>, AppError> {
        if self.fail_collect.load(Ordering::SeqCst) {
            return Err(AppError::Persistence("connection reset".to_string()));
        }

        let stored: Vec<String> = self
            .fields
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, (owner, _))| *owner == user_id && key.field == SealedField::PostFilePath)
            .map(|(_, (_, value))| value.clone())
            .collect();

        let mut paths = Vec::new();
        for value in stored {
            let plain = match &self.encryption {
                Some(encryption) => encryption.decrypt_field(&value)?,
                None => value,
            };
            if let Some(path) = StoragePath::parse(&plain) {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    async fn delete_all_for_user(&self, user_id: UserId) -> Result<u64, AppError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(AppError::Persistence("connection reset".to_string()));
        }

        let mut fields = self.fields.lock().unwrap();
        let records: HashSet<Uuid> = fields
            .iter()
            .filter(|(_, (owner, _))| *owner == user_id)
            .map(|(key, _)| key.record_id)
            .collect();
        fields.retain(|_, (owner, _)| *owner != user_id);
        Ok(records.len() as u64)
    }

    async fn read_encrypted_field(&self, key: &RecordKey) -> Result<Option<String>, AppError> {
        Ok(self.raw_field(key))
    }

    async fn write_encrypted_field(
        &self,
        user_id: UserId,
        key: &RecordKey,
        envelope: &str,
    ) -> Result<(), AppError> {
        self.set_raw_field(user_id, *key, envelope.to_string());
        Ok(())
    }
}

/// Session terminator that records who was logged out.
#[derive(Clone, Default)]
pub struct RecordingSessions {
    terminated: Arc<Mutex<Vec<UserId>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn terminated(&self) -> Vec<UserId> {
        self.terminated.lock().unwrap().clone()
    }

    pub fn fail_next(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionTerminator for RecordingSessions {
    async fn terminate(&self, user_id: UserId) -> Result<(), AppError> {
        if self.fail.swap(false, Ordering::SeqCst) {
            return Err(AppError::Internal("session store unavailable".to_string()));
        }
        self.terminated.lock().unwrap().push(user_id);
        Ok(())
    }
}

/// Asset store wrapper whose deletes fail for selected paths.
pub struct FailingAssetStore {
    inner: Arc<dyn AssetStore>,
    failing: Mutex<HashSet<String>>,
}

impl FailingAssetStore {
    pub fn new(inner: Arc<dyn AssetStore>) -> Self {
        Self {
            inner,
            failing: Mutex::new(HashSet::new()),
        }
    }

    pub fn fail_delete_of(&self, path: &StoragePath) {
        self.failing.lock().unwrap().insert(path.key());
    }
}

#[async_trait]
impl AssetStore for FailingAssetStore {
    async fn write_temp(&self, data: &[u8]) -> StorageResult<TempPath> {
        self.inner.write_temp(data).await
    }

    async fn read_temp(&self, temp: &TempPath) -> StorageResult<Vec<u8>> {
        self.inner.read_temp(temp).await
    }

    async fn cleanup_temp(&self, temp: &TempPath) -> StorageResult<()> {
        self.inner.cleanup_temp(temp).await
    }

    async fn persist(
        &self,
        temp: &TempPath,
        identifier: &StorageIdentifier,
    ) -> StorageResult<StoragePath> {
        self.inner.persist(temp, identifier).await
    }

    async fn delete(&self, path: &StoragePath) -> StorageResult<DeleteOutcome> {
        if self.failing.lock().unwrap().contains(&path.key()) {
            return Err(StorageError::IoFailure(format!(
                "permission denied: {}",
                path
            )));
        }
        self.inner.delete(path).await
    }

    async fn read(&self, path: &StoragePath) -> StorageResult<Vec<u8>> {
        self.inner.read(path).await
    }

    async fn exists(&self, path: &StoragePath) -> StorageResult<bool> {
        self.inner.exists(path).await
    }
}
