//! Outcome of one purge, step by step.

use chrono::{DateTime, Utc};
use serde::Serialize;
use veilpost_core::{StoragePath, UserId};

/// Result of one purge step. Failures are recorded, never thrown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum StepOutcome {
    Ok,
    Failed(String),
}

impl StepOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, StepOutcome::Ok)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum FileOutcome {
    Deleted,
    /// The file was already gone. Satisfied, but reported.
    AlreadyAbsent,
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct FileDeletion {
    pub path: StoragePath,
    pub outcome: FileOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PurgeStatus {
    /// Every step succeeded and every file is gone.
    Completed,
    /// Records were removed and the session ended, but something needs attention.
    CompletedWithErrors,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurgeReport {
    pub user_id: UserId,
    pub collect: StepOutcome,
    pub files: Vec<FileDeletion>,
    pub delete_records: StepOutcome,
    pub rows_deleted: u64,
    pub terminate_session: StepOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PurgeReport {
    pub fn status(&self) -> PurgeStatus {
        let steps_ok = self.collect.is_ok()
            && self.delete_records.is_ok()
            && self.terminate_session.is_ok();
        let files_ok = self
            .files
            .iter()
            .all(|f| !matches!(f.outcome, FileOutcome::Failed(_)));

        if steps_ok && files_ok {
            PurgeStatus::Completed
        } else {
            PurgeStatus::CompletedWithErrors
        }
    }

    /// One line per file that was not cleanly deleted and per failed step.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if let StepOutcome::Failed(reason) = &self.collect {
            warnings.push(format!("collecting stored assets failed: {}", reason));
        }

        for file in &self.files {
            match &file.outcome {
                FileOutcome::Deleted => {}
                FileOutcome::AlreadyAbsent => {
                    warnings.push(format!("{} was already absent", file.path))
                }
                FileOutcome::Failed(reason) => {
                    warnings.push(format!("{} could not be deleted: {}", file.path, reason))
                }
            }
        }

        if let StepOutcome::Failed(reason) = &self.delete_records {
            warnings.push(format!("deleting records failed: {}", reason));
        }
        if let StepOutcome::Failed(reason) = &self.terminate_session {
            warnings.push(format!("terminating the session failed: {}", reason));
        }

        warnings
    }

    pub fn deleted_files(&self) -> usize {
        self.files
            .iter()
            .filter(|f| f.outcome == FileOutcome::Deleted)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use veilpost_core::{DetectedFormat, StorageIdentifier};

    fn path(byte: u8) -> StoragePath {
        StoragePath::for_identifier(
            StorageIdentifier::from_random([byte; 16], DetectedFormat::Jpeg).unwrap(),
        )
    }

    fn report(files: Vec<FileDeletion>) -> PurgeReport {
        PurgeReport {
            user_id: UserId(Uuid::new_v4()),
            collect: StepOutcome::Ok,
            files,
            delete_records: StepOutcome::Ok,
            rows_deleted: 1,
            terminate_session: StepOutcome::Ok,
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_clean_purge_is_completed() {
        let report = report(vec![FileDeletion {
            path: path(1),
            outcome: FileOutcome::Deleted,
        }]);
        assert_eq!(report.status(), PurgeStatus::Completed);
        assert!(report.warnings().is_empty());
        assert_eq!(report.deleted_files(), 1);
    }

    #[test]
    fn test_absent_file_warns_without_degrading_status() {
        let report = report(vec![FileDeletion {
            path: path(2),
            outcome: FileOutcome::AlreadyAbsent,
        }]);
        assert_eq!(report.status(), PurgeStatus::Completed);
        assert_eq!(report.warnings().len(), 1);
    }

    #[test]
    fn test_failures_degrade_status() {
        let mut failed = report(vec![FileDeletion {
            path: path(3),
            outcome: FileOutcome::Failed("IO_FAILURE".to_string()),
        }]);
        assert_eq!(failed.status(), PurgeStatus::CompletedWithErrors);

        failed.files.clear();
        failed.collect = StepOutcome::Failed("PERSISTENCE_ERROR".to_string());
        assert_eq!(failed.status(), PurgeStatus::CompletedWithErrors);
        assert_eq!(failed.warnings().len(), 1);
    }

    #[test]
    fn test_report_serializes_outcomes() {
        let report = report(vec![FileDeletion {
            path: path(4),
            outcome: FileOutcome::Failed("IO_FAILURE".to_string()),
        }]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["files"][0]["outcome"]["status"], "failed");
        assert_eq!(json["collect"]["status"], "ok");
    }
}
