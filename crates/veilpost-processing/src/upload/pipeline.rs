//! Upload pipeline: validate → sniff → stage → scrub → persist.
//!
//! Raw bytes are staged in the temp area under a random name and only the
//! scrubbed output ever reaches the permanent area. Temp artifacts are removed
//! on every path, success or failure.

use std::sync::Arc;

use veilpost_core::{log_error, AppError, DetectedFormat, ScrubResult};
use veilpost_storage::{generate_storage_identifier, AssetStore, TempPath};

use super::types::{RawUpload, UploadSettings};
use crate::detect::detect_format;
use crate::metadata::capture_snapshot;
use crate::scrubber::MetadataScrubber;
use crate::validator::UploadValidator;

pub struct UploadPipeline {
    store: Arc<dyn AssetStore>,
    validator: UploadValidator,
    scrubber: MetadataScrubber,
    capture_metadata_snapshot: bool,
}

impl UploadPipeline {
    pub fn new(store: Arc<dyn AssetStore>, settings: UploadSettings) -> Self {
        Self {
            store,
            validator: UploadValidator::new(settings.max_file_size, settings.allowed_content_types),
            scrubber: MetadataScrubber::new(settings.video_policy),
            capture_metadata_snapshot: settings.capture_metadata_snapshot,
        }
    }

    /// Process one upload. Failures are reported in the result, never as a
    /// partially stored asset.
    pub async fn process(&self, upload: RawUpload) -> ScrubResult {
        let mut format = None;
        match self.run(upload, &mut format).await {
            Ok(result) => result,
            Err(e) => {
                log_error(&e, "upload");
                ScrubResult::failed(e.scrub_kind(), format)
            }
        }
    }

    /// Same as [`process`](Self::process), with the failure as an error.
    pub async fn process_or_error(&self, upload: RawUpload) -> Result<ScrubResult, AppError> {
        let mut format = None;
        self.run(upload, &mut format).await
    }

    #[tracing::instrument(
        skip(self, upload, format),
        fields(content_type = %upload.content_type, size_bytes = upload.data.len())
    )]
    async fn run(
        &self,
        upload: RawUpload,
        format: &mut Option<DetectedFormat>,
    ) -> Result<ScrubResult, AppError> {
        let RawUpload { data, content_type } = upload;

        self.validator
            .validate_all(&content_type, data.len())
            .map_err(AppError::from)?;

        let detected = detect_format(&data, &content_type);
        if detected == DetectedFormat::Unsupported {
            return Err(AppError::UnsupportedType(format!(
                "file contents do not match declared type {}",
                content_type
            )));
        }
        *format = Some(detected);

        let raw_temp = self.store.write_temp(&data).await?;
        drop(data);

        let result = self.scrub_and_persist(&raw_temp, detected).await;
        self.cleanup(&raw_temp).await;

        let result = result?;
        tracing::info!(
            storage_path = ?result.storage_path.as_ref().map(|p| p.to_string()),
            format = ?detected,
            metadata_removed = result.metadata_removed,
            "Upload stored"
        );
        Ok(result)
    }

    async fn scrub_and_persist(
        &self,
        raw_temp: &TempPath,
        detected: DetectedFormat,
    ) -> Result<ScrubResult, AppError> {
        let raw = self.store.read_temp(raw_temp).await?;

        let snapshot = if self.capture_metadata_snapshot && detected.is_image() {
            capture_snapshot(&raw)
        } else {
            None
        };

        let scrubber = self.scrubber.clone();
        let outcome = tokio::task::spawn_blocking(move || scrubber.scrub(&raw, detected))
            .await
            .map_err(|e| AppError::Internal(format!("Scrub task failed: {}", e)))??;

        let identifier = generate_storage_identifier(detected).ok_or_else(|| {
            AppError::UnsupportedType("no storage extension for detected format".to_string())
        })?;

        let staged = self.store.write_temp(&outcome.bytes).await?;
        let persisted = self.store.persist(&staged, &identifier).await;
        self.cleanup(&staged).await;
        let storage_path = persisted?;

        Ok(ScrubResult::stored(
            storage_path,
            detected,
            outcome.metadata_removed,
            snapshot,
            outcome.warnings,
        ))
    }

    async fn cleanup(&self, temp: &TempPath) {
        if let Err(e) = self.store.cleanup_temp(temp).await {
            tracing::warn!(error = %e, key = %temp, "Failed to clean up temp file");
        }
    }
}
