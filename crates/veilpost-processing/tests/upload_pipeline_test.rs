//! End-to-end upload tests against a local asset store in a temp directory.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use image::{ImageFormat, Rgb, RgbImage};
use tempfile::tempdir;
use veilpost_core::constants::ALLOWED_CONTENT_TYPES;
use veilpost_core::{DetectedFormat, ScrubErrorKind, VideoPolicy};
use veilpost_processing::jpeg::{metadata_segments, MetadataKind};
use veilpost_processing::{RawUpload, UploadPipeline, UploadSettings};
use veilpost_storage::{AssetStore, LocalAssetStore};

fn settings(video_policy: VideoPolicy) -> UploadSettings {
    UploadSettings {
        max_file_size: 1024 * 1024,
        allowed_content_types: ALLOWED_CONTENT_TYPES.iter().map(|s| s.to_string()).collect(),
        video_policy,
        capture_metadata_snapshot: true,
    }
}

fn jpeg_with_exif() -> Vec<u8> {
    let img = RgbImage::from_pixel(16, 16, Rgb([200, 100, 50]));
    let mut jpeg = Vec::new();
    img.write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
        .unwrap();

    let mut payload = b"Exif\0\0MM\x00\x2A\x00\x00\x00\x08\x00\x01".to_vec();
    payload.extend_from_slice(&[0x01, 0x0F, 0x00, 0x02, 0x00, 0x00, 0x00, 0x05]);
    payload.extend_from_slice(&[0x00, 0x00, 0x00, 0x1A, 0x00, 0x00, 0x00, 0x00]);
    payload.extend_from_slice(b"Acme\0");

    let mut out = jpeg[..2].to_vec();
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(&payload);
    out.extend_from_slice(&jpeg[2..]);
    out
}

fn mp4() -> Vec<u8> {
    let mut data = vec![0x00, 0x00, 0x00, 0x18];
    data.extend_from_slice(b"ftypmp42");
    data.extend_from_slice(&[0; 16]);
    data
}

fn dir_is_empty(path: &Path) -> bool {
    std::fs::read_dir(path).unwrap().next().is_none()
}

async fn pipeline(root: &Path, video_policy: VideoPolicy) -> (UploadPipeline, Arc<LocalAssetStore>) {
    let store = Arc::new(LocalAssetStore::new(root).await.unwrap());
    (
        UploadPipeline::new(store.clone(), settings(video_policy)),
        store,
    )
}

#[tokio::test]
async fn test_jpeg_upload_is_scrubbed_and_stored() {
    let dir = tempdir().unwrap();
    let (pipeline, store) = pipeline(dir.path(), VideoPolicy::Reject).await;

    let result = pipeline
        .process(RawUpload::new(jpeg_with_exif(), "image/jpeg"))
        .await;

    assert!(result.success);
    assert!(result.metadata_removed);
    assert_eq!(result.format, Some(DetectedFormat::Jpeg));
    assert!(result.error.is_none());

    let snapshot = result.original_metadata_snapshot.as_ref().unwrap();
    assert!(snapshot.get("Make").unwrap().contains("Acme"));

    let path = result.storage_path.unwrap();
    assert!(path.key().starts_with("uploads/"));
    assert!(path.key().ends_with(".jpg"));

    let stored = store.read(&path).await.unwrap();
    let kinds = metadata_segments(&stored).unwrap();
    assert!(!kinds.contains(&MetadataKind::Exif));
    assert!(kinds.iter().all(|k| !k.is_identifying()));

    assert!(dir_is_empty(&dir.path().join("temp")));
}

#[tokio::test]
async fn test_disallowed_type_is_rejected_before_scrubbing() {
    let dir = tempdir().unwrap();
    let (pipeline, _) = pipeline(dir.path(), VideoPolicy::Reject).await;

    let result = pipeline
        .process(RawUpload::new(b"<html></html>".to_vec(), "text/html"))
        .await;

    assert!(!result.success);
    assert_eq!(result.error, Some(ScrubErrorKind::UnsupportedType));
    assert!(result.storage_path.is_none());
    assert!(dir_is_empty(&dir.path().join("temp")));
    assert!(dir_is_empty(&dir.path().join("uploads")));
}

#[tokio::test]
async fn test_signature_mismatch_is_unsupported() {
    let dir = tempdir().unwrap();
    let (pipeline, _) = pipeline(dir.path(), VideoPolicy::Reject).await;

    let result = pipeline
        .process(RawUpload::new(jpeg_with_exif(), "image/png"))
        .await;

    assert_eq!(result.error, Some(ScrubErrorKind::UnsupportedType));
    assert!(dir_is_empty(&dir.path().join("uploads")));
}

#[tokio::test]
async fn test_truncated_jpeg_is_not_persisted() {
    let dir = tempdir().unwrap();
    let (pipeline, _) = pipeline(dir.path(), VideoPolicy::Reject).await;

    let mut data = jpeg_with_exif();
    data.truncate(30);
    let result = pipeline.process(RawUpload::new(data, "image/jpeg")).await;

    assert!(!result.success);
    assert_eq!(result.error, Some(ScrubErrorKind::InvalidContainer));
    assert_eq!(result.format, Some(DetectedFormat::Jpeg));
    assert!(dir_is_empty(&dir.path().join("temp")));
    assert!(dir_is_empty(&dir.path().join("uploads")));
}

#[tokio::test]
async fn test_video_rejected_by_default() {
    let dir = tempdir().unwrap();
    let (pipeline, _) = pipeline(dir.path(), VideoPolicy::Reject).await;

    let err = pipeline
        .process_or_error(RawUpload::new(mp4(), "video/mp4"))
        .await
        .unwrap_err();

    assert_eq!(err.scrub_kind(), ScrubErrorKind::ScrubFailure);
    assert!(dir_is_empty(&dir.path().join("uploads")));
    assert!(dir_is_empty(&dir.path().join("temp")));
}

#[tokio::test]
async fn test_flagged_video_is_stored_but_not_marked_clean() {
    let dir = tempdir().unwrap();
    let (pipeline, store) = pipeline(dir.path(), VideoPolicy::StoreFlagged).await;

    let result = pipeline
        .process_or_error(RawUpload::new(mp4(), "video/quicktime"))
        .await
        .unwrap();

    assert!(result.success);
    assert!(!result.metadata_removed);
    assert!(!result.warnings.is_empty());
    assert!(result.original_metadata_snapshot.is_none());

    let path = result.storage_path.unwrap();
    assert!(path.key().ends_with(".mp4"));
    assert_eq!(store.read(&path).await.unwrap(), mp4());
}

#[tokio::test]
async fn test_oversized_upload_is_a_validation_error() {
    let dir = tempdir().unwrap();
    let store = Arc::new(LocalAssetStore::new(dir.path()).await.unwrap());
    let mut small = settings(VideoPolicy::Reject);
    small.max_file_size = 64;
    let pipeline = UploadPipeline::new(store, small);

    let result = pipeline
        .process(RawUpload::new(jpeg_with_exif(), "image/jpeg"))
        .await;

    assert_eq!(result.error, Some(ScrubErrorKind::Validation));
    assert!(result.format.is_none());
}

#[tokio::test]
async fn test_snapshot_can_be_disabled() {
    let dir = tempdir().unwrap();
    let store = Arc::new(LocalAssetStore::new(dir.path()).await.unwrap());
    let mut no_snapshot = settings(VideoPolicy::Reject);
    no_snapshot.capture_metadata_snapshot = false;
    let pipeline = UploadPipeline::new(store, no_snapshot);

    let result = pipeline
        .process(RawUpload::new(jpeg_with_exif(), "image/jpeg"))
        .await;

    assert!(result.success);
    assert!(result.original_metadata_snapshot.is_none());
}

#[tokio::test]
async fn test_each_upload_gets_a_distinct_identifier() {
    let dir = tempdir().unwrap();
    let (pipeline, _) = pipeline(dir.path(), VideoPolicy::Reject).await;

    let first = pipeline
        .process(RawUpload::new(jpeg_with_exif(), "image/jpeg"))
        .await;
    let second = pipeline
        .process(RawUpload::new(jpeg_with_exif(), "image/jpeg"))
        .await;

    assert_ne!(first.storage_path, second.storage_path);
}
