//! Metadata scrubber
//!
//! Dispatches a classified upload to the right strategy and enforces the
//! post-condition: the bytes returned carry no identifying metadata, or the
//! caller gets an error. The unscrubbed input is never handed back as clean.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use veilpost_core::{AppError, DetectedFormat, VideoPolicy};

use crate::jpeg;
use crate::raster;

/// Quality used when a JPEG has to be re-encoded from pixels.
const FALLBACK_JPEG_QUALITY: u8 = 90;

#[derive(Debug, thiserror::Error)]
pub enum ScrubError {
    #[error("Invalid container: {0}")]
    InvalidContainer(String),

    #[error("Scrub failure: {0}")]
    ScrubFailure(String),

    #[error("Unsupported type: {0}")]
    UnsupportedType(String),
}

impl From<ScrubError> for AppError {
    fn from(err: ScrubError) -> Self {
        match err {
            ScrubError::InvalidContainer(msg) => AppError::InvalidContainer(msg),
            ScrubError::ScrubFailure(msg) => AppError::ScrubFailure(msg),
            ScrubError::UnsupportedType(msg) => AppError::UnsupportedType(msg),
        }
    }
}

/// Bytes ready to persist.
#[derive(Debug, Clone)]
pub struct ScrubOutcome {
    pub bytes: Vec<u8>,
    /// `false` only for video stored under [`VideoPolicy::StoreFlagged`].
    pub metadata_removed: bool,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MetadataScrubber {
    video_policy: VideoPolicy,
}

impl MetadataScrubber {
    pub fn new(video_policy: VideoPolicy) -> Self {
        Self { video_policy }
    }

    /// Scrub a buffer already classified by the format detector.
    pub fn scrub(&self, data: &[u8], format: DetectedFormat) -> Result<ScrubOutcome, ScrubError> {
        match format {
            DetectedFormat::Jpeg => Self::scrub_image(data),
            DetectedFormat::OtherImage(raster_format) => Ok(ScrubOutcome {
                bytes: raster::scrub_raster(data, raster_format)?,
                metadata_removed: true,
                warnings: Vec::new(),
            }),
            DetectedFormat::Video(container) => match self.video_policy {
                VideoPolicy::Reject => Err(ScrubError::ScrubFailure(format!(
                    "{:?} container metadata cannot be removed",
                    container
                ))),
                VideoPolicy::StoreFlagged => {
                    tracing::warn!(
                        container = ?container,
                        "Storing video without metadata removal"
                    );
                    Ok(ScrubOutcome {
                        bytes: data.to_vec(),
                        metadata_removed: false,
                        warnings: vec![
                            "video stored without metadata removal; container metadata may remain"
                                .to_string(),
                        ],
                    })
                }
            },
            DetectedFormat::Unsupported => Err(ScrubError::UnsupportedType(
                "file signature not recognised".to_string(),
            )),
        }
    }

    /// Scrub a JPEG by walking its marker segments, falling back to a full
    /// re-encode if the walked output still fails verification.
    pub fn scrub_image(data: &[u8]) -> Result<ScrubOutcome, ScrubError> {
        let walked = jpeg::scrub_jpeg(data)?;
        if !walked.removed.is_empty() {
            tracing::debug!(
                removed = ?walked.removed,
                "Removed JPEG application segments"
            );
        }

        match jpeg::verify_clean(&walked.bytes) {
            Ok(()) => Ok(ScrubOutcome {
                bytes: walked.bytes,
                metadata_removed: true,
                warnings: Vec::new(),
            }),
            Err(verify_err) => {
                tracing::warn!(
                    error = %verify_err,
                    "Scrubbed JPEG failed verification, re-encoding from pixels"
                );
                let bytes = reencode_jpeg(data)?;
                jpeg::verify_clean(&bytes).map_err(|e| {
                    ScrubError::ScrubFailure(format!("re-encoded JPEG failed verification: {}", e))
                })?;
                Ok(ScrubOutcome {
                    bytes,
                    metadata_removed: true,
                    warnings: vec!["image was re-encoded to remove metadata".to_string()],
                })
            }
        }
    }
}

/// Decode a JPEG and encode the pixels into a fresh file with no
/// application segments besides the JFIF header.
pub fn reencode_jpeg(data: &[u8]) -> Result<Vec<u8>, ScrubError> {
    let img = image::load_from_memory_with_format(data, ImageFormat::Jpeg)
        .map_err(|e| ScrubError::ScrubFailure(format!("failed to decode JPEG: {}", e)))?;

    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, FALLBACK_JPEG_QUALITY);
    DynamicImage::ImageRgb8(img.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(|e| ScrubError::ScrubFailure(format!("failed to encode JPEG: {}", e)))?;

    Ok(out)
}
