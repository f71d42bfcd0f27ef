//! Purge coordinator
//!
//! Collect → delete files → delete records → terminate session. Every step
//! runs and records its own outcome; a failure in one never skips the next.
//! The purge runs on its own task so a caller that goes away (client
//! disconnect, request timeout) cannot leave it half done.

use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use veilpost_core::{
    log_error, AppError, PrivacyRepository, SessionTerminator, StoragePath, UserId,
};
use veilpost_storage::{AssetStore, DeleteOutcome};

use super::report::{FileDeletion, FileOutcome, PurgeReport, StepOutcome};

#[derive(Clone)]
pub struct PurgeCoordinator {
    repository: Arc<dyn PrivacyRepository>,
    store: Arc<dyn AssetStore>,
    sessions: Arc<dyn SessionTerminator>,
    concurrency: usize,
}

impl PurgeCoordinator {
    pub fn new(
        repository: Arc<dyn PrivacyRepository>,
        store: Arc<dyn AssetStore>,
        sessions: Arc<dyn SessionTerminator>,
        concurrency: usize,
    ) -> Self {
        Self {
            repository,
            store,
            sessions,
            concurrency: concurrency.max(1),
        }
    }

    /// Purge everything owned by `user_id`.
    ///
    /// Only fails if the purge task itself could not finish; every
    /// collaborator failure is reported in the returned [`PurgeReport`].
    pub async fn purge(&self, user_id: UserId) -> Result<PurgeReport, AppError> {
        let coordinator = self.clone();
        tokio::spawn(async move { coordinator.run(user_id).await })
            .await
            .map_err(|e| AppError::Internal(format!("Purge task failed: {}", e)))
    }

    #[tracing::instrument(skip(self, user_id), fields(user_id = %user_id))]
    async fn run(&self, user_id: UserId) -> PurgeReport {
        let started_at = Utc::now();

        let (collect, paths) = match self.repository.find_paths_for_user(user_id).await {
            Ok(paths) => (StepOutcome::Ok, paths),
            Err(e) => {
                log_error(&e, "collect");
                (StepOutcome::Failed(e.report_reason()), Vec::new())
            }
        };

        let files = self.delete_files(paths).await;

        let (delete_records, rows_deleted) = match self.repository.delete_all_for_user(user_id).await
        {
            Ok(rows) => (StepOutcome::Ok, rows),
            Err(e) => {
                log_error(&e, "delete_records");
                (StepOutcome::Failed(e.report_reason()), 0)
            }
        };

        let terminate_session = match self.sessions.terminate(user_id).await {
            Ok(()) => StepOutcome::Ok,
            Err(e) => {
                log_error(&e, "terminate_session");
                StepOutcome::Failed(e.report_reason())
            }
        };

        let report = PurgeReport {
            user_id,
            collect,
            files,
            delete_records,
            rows_deleted,
            terminate_session,
            started_at,
            finished_at: Utc::now(),
        };

        tracing::info!(
            status = ?report.status(),
            files_deleted = report.deleted_files(),
            files_total = report.files.len(),
            rows_deleted = report.rows_deleted,
            warnings = report.warnings().len(),
            "Purge finished"
        );

        report
    }

    async fn delete_files(&self, paths: Vec<StoragePath>) -> Vec<FileDeletion> {
        let mut seen = BTreeSet::new();
        let paths: Vec<StoragePath> = paths
            .into_iter()
            .filter(|p| seen.insert(p.key()))
            .collect();

        let mut files: Vec<FileDeletion> = stream::iter(paths)
            .map(|path| {
                let store = self.store.clone();
                async move {
                    let outcome = match store.delete(&path).await {
                        Ok(DeleteOutcome::Deleted) => FileOutcome::Deleted,
                        Ok(DeleteOutcome::AlreadyAbsent) => FileOutcome::AlreadyAbsent,
                        Err(e) => {
                            let e = AppError::from(e);
                            tracing::warn!(storage_key = %path, "Asset could not be deleted");
                            log_error(&e, "delete_asset");
                            FileOutcome::Failed(e.report_reason())
                        }
                    };
                    FileDeletion { path, outcome }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        files.sort_by_key(|f| f.path.key());
        files
    }
}
