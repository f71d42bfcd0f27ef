//! Types for the upload pipeline.

use veilpost_core::{PrivacyConfig, VideoPolicy};

/// Bytes received from a client plus the content type it declared.
///
/// Lives only for one request; the original filename is deliberately absent.
#[derive(Clone)]
pub struct RawUpload {
    pub data: Vec<u8>,
    pub content_type: String,
}

impl RawUpload {
    pub fn new(data: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            data,
            content_type: content_type.into(),
        }
    }
}

impl std::fmt::Debug for RawUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawUpload")
            .field("content_type", &self.content_type)
            .field("size_bytes", &self.data.len())
            .finish()
    }
}

/// Pipeline settings taken from [`PrivacyConfig`].
#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub max_file_size: usize,
    pub allowed_content_types: Vec<String>,
    pub video_policy: VideoPolicy,
    pub capture_metadata_snapshot: bool,
}

impl UploadSettings {
    pub fn from_config(config: &PrivacyConfig) -> Self {
        Self {
            max_file_size: config.max_upload_bytes,
            allowed_content_types: config.allowed_content_types.clone(),
            video_policy: config.video_policy,
            capture_metadata_snapshot: config.capture_metadata_snapshot,
        }
    }
}
