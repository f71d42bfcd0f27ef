//! Media classification, storage naming and scrub outcomes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::constants::{STORAGE_IDENTIFIER_BYTES, UPLOADS_DIR};

/// Raster formats other than JPEG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RasterFormat {
    Png,
    Gif,
    WebP,
}

/// Video containers accepted at the upload boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoContainer {
    Mp4,
    QuickTime,
}

/// Result of sniffing an upload's magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "variant", rename_all = "snake_case")]
pub enum DetectedFormat {
    Jpeg,
    OtherImage(RasterFormat),
    Video(VideoContainer),
    Unsupported,
}

impl DetectedFormat {
    /// File extension used for the stored asset. Always derived from the
    /// sniffed signature, never from client input.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            DetectedFormat::Jpeg => Some("jpg"),
            DetectedFormat::OtherImage(RasterFormat::Png) => Some("png"),
            DetectedFormat::OtherImage(RasterFormat::Gif) => Some("gif"),
            DetectedFormat::OtherImage(RasterFormat::WebP) => Some("webp"),
            DetectedFormat::Video(VideoContainer::Mp4) => Some("mp4"),
            DetectedFormat::Video(VideoContainer::QuickTime) => Some("mov"),
            DetectedFormat::Unsupported => None,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, DetectedFormat::Jpeg | DetectedFormat::OtherImage(_))
    }

    pub fn is_video(&self) -> bool {
        matches!(self, DetectedFormat::Video(_))
    }
}

const KNOWN_EXTENSIONS: [&str; 6] = ["jpg", "png", "gif", "webp", "mp4", "mov"];

/// Opaque, unguessable name of a stored asset: 32 lowercase hex characters
/// (128 random bits) followed by the sniffed extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StorageIdentifier(String);

impl StorageIdentifier {
    /// Build an identifier from random bytes and a format.
    ///
    /// Returns `None` for [`DetectedFormat::Unsupported`], which has no extension.
    pub fn from_random(random: [u8; STORAGE_IDENTIFIER_BYTES], format: DetectedFormat) -> Option<Self> {
        let extension = format.extension()?;
        Some(Self(format!("{}.{}", hex::encode(random), extension)))
    }

    /// Parse a previously issued identifier.
    pub fn parse(value: &str) -> Option<Self> {
        let (stem, extension) = value.split_once('.')?;
        let stem_ok = stem.len() == STORAGE_IDENTIFIER_BYTES * 2
            && stem
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if stem_ok && KNOWN_EXTENSIONS.contains(&extension) {
            Some(Self(value.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn extension(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or_default()
    }
}

impl Display for StorageIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for StorageIdentifier {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| "invalid storage identifier".to_string())
    }
}

impl From<StorageIdentifier> for String {
    fn from(id: StorageIdentifier) -> Self {
        id.0
    }
}

/// Location of a scrubbed asset inside the permanent area: `uploads/{identifier}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoragePath {
    identifier: StorageIdentifier,
}

impl StoragePath {
    pub fn for_identifier(identifier: StorageIdentifier) -> Self {
        Self { identifier }
    }

    /// Parse a stored path. Accepts the legacy `/uploads/{identifier}` form
    /// with a leading slash and normalises it.
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.strip_prefix('/').unwrap_or(value);
        let name = trimmed.strip_prefix(UPLOADS_DIR)?.strip_prefix('/')?;
        StorageIdentifier::parse(name).map(Self::for_identifier)
    }

    pub fn identifier(&self) -> &StorageIdentifier {
        &self.identifier
    }

    /// Key relative to the storage root.
    pub fn key(&self) -> String {
        format!("{}/{}", UPLOADS_DIR, self.identifier)
    }
}

impl Display for StoragePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}", UPLOADS_DIR, self.identifier)
    }
}

impl TryFrom<String> for StoragePath {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| "invalid storage path".to_string())
    }
}

impl From<StoragePath> for String {
    fn from(path: StoragePath) -> Self {
        path.key()
    }
}

/// Machine-readable failure reason carried by a [`ScrubResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrubErrorKind {
    InvalidContainer,
    ScrubFailure,
    UnsupportedType,
    Validation,
    IoFailure,
}

impl Display for ScrubErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let s = match self {
            ScrubErrorKind::InvalidContainer => "invalid_container",
            ScrubErrorKind::ScrubFailure => "scrub_failure",
            ScrubErrorKind::UnsupportedType => "unsupported_type",
            ScrubErrorKind::Validation => "validation",
            ScrubErrorKind::IoFailure => "io_failure",
        };
        f.write_str(s)
    }
}

/// Outcome of processing one upload. Immutable once produced.
#[derive(Debug, Clone, Serialize)]
pub struct ScrubResult {
    pub success: bool,
    pub storage_path: Option<StoragePath>,
    /// EXIF fields found in the upload before scrubbing. Sensitive: returned
    /// to the uploader only, never logged.
    pub original_metadata_snapshot: Option<BTreeMap<String, String>>,
    pub error: Option<ScrubErrorKind>,
    /// `false` whenever the stored bytes may still carry metadata (flagged video).
    pub metadata_removed: bool,
    pub format: Option<DetectedFormat>,
    pub warnings: Vec<String>,
}

impl ScrubResult {
    pub fn stored(
        storage_path: StoragePath,
        format: DetectedFormat,
        metadata_removed: bool,
        original_metadata_snapshot: Option<BTreeMap<String, String>>,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            success: true,
            storage_path: Some(storage_path),
            original_metadata_snapshot,
            error: None,
            metadata_removed,
            format: Some(format),
            warnings,
        }
    }

    pub fn failed(kind: ScrubErrorKind, format: Option<DetectedFormat>) -> Self {
        Self {
            success: false,
            storage_path: None,
            original_metadata_snapshot: None,
            error: Some(kind),
            metadata_removed: false,
            format,
            warnings: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_from_random() {
        let id = StorageIdentifier::from_random([0xab; 16], DetectedFormat::Jpeg).unwrap();
        assert_eq!(id.as_str(), format!("{}.jpg", "ab".repeat(16)));
        assert_eq!(id.extension(), "jpg");
        assert!(StorageIdentifier::from_random([0; 16], DetectedFormat::Unsupported).is_none());
    }

    #[test]
    fn test_identifier_parse_rejects_user_names() {
        assert!(StorageIdentifier::parse("holiday.jpg").is_none());
        assert!(StorageIdentifier::parse(&format!("{}.exe", "a".repeat(32))).is_none());
        assert!(StorageIdentifier::parse(&format!("{}.jpg", "A".repeat(32))).is_none());
        assert!(StorageIdentifier::parse(&format!("{}.jpg", "a".repeat(32))).is_some());
    }

    #[test]
    fn test_storage_path_parse_legacy_prefix() {
        let name = format!("{}.png", "0f".repeat(16));
        let modern = StoragePath::parse(&format!("uploads/{}", name)).unwrap();
        let legacy = StoragePath::parse(&format!("/uploads/{}", name)).unwrap();
        assert_eq!(modern, legacy);
        assert_eq!(modern.key(), format!("uploads/{}", name));
    }

    #[test]
    fn test_storage_path_rejects_traversal() {
        assert!(StoragePath::parse("uploads/../etc/passwd").is_none());
        assert!(StoragePath::parse("temp/abc.jpg").is_none());
        assert!(StoragePath::parse("uploads").is_none());
    }

    #[test]
    fn test_extension_follows_sniffed_format() {
        assert_eq!(DetectedFormat::Video(VideoContainer::QuickTime).extension(), Some("mov"));
        assert_eq!(DetectedFormat::OtherImage(RasterFormat::WebP).extension(), Some("webp"));
        assert!(DetectedFormat::Jpeg.is_image());
        assert!(DetectedFormat::Video(VideoContainer::Mp4).is_video());
    }
}
