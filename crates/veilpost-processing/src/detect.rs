//! Format detection from magic bytes.
//!
//! The client-declared content type is untrusted: it only has to agree with
//! what the bytes say. Disagreement is reported as `Unsupported`.

use veilpost_core::{DetectedFormat, RasterFormat, VideoContainer};

const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const GIF87_MAGIC: &[u8] = b"GIF87a";
const GIF89_MAGIC: &[u8] = b"GIF89a";
const QUICKTIME_BRAND: &[u8] = b"qt  ";
const QUICKTIME_ATOMS: [&[u8]; 4] = [b"moov", b"mdat", b"wide", b"free"];

/// Classify a buffer by its signature alone.
pub fn sniff(data: &[u8]) -> DetectedFormat {
    if data.starts_with(JPEG_MAGIC) {
        return DetectedFormat::Jpeg;
    }
    if data.starts_with(PNG_MAGIC) {
        return DetectedFormat::OtherImage(RasterFormat::Png);
    }
    if data.starts_with(GIF87_MAGIC) || data.starts_with(GIF89_MAGIC) {
        return DetectedFormat::OtherImage(RasterFormat::Gif);
    }
    if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        return DetectedFormat::OtherImage(RasterFormat::WebP);
    }
    if data.len() >= 12 && &data[4..8] == b"ftyp" {
        return if &data[8..12] == QUICKTIME_BRAND {
            DetectedFormat::Video(VideoContainer::QuickTime)
        } else {
            DetectedFormat::Video(VideoContainer::Mp4)
        };
    }
    if data.len() >= 8 && QUICKTIME_ATOMS.contains(&&data[4..8]) {
        return DetectedFormat::Video(VideoContainer::QuickTime);
    }

    DetectedFormat::Unsupported
}

/// Classify a buffer and check it against the declared content type.
pub fn detect_format(data: &[u8], declared_content_type: &str) -> DetectedFormat {
    let sniffed = sniff(data);
    let declared = declared_content_type.trim().to_lowercase();

    if declared_matches(&declared, sniffed) {
        sniffed
    } else {
        tracing::debug!(
            declared = %declared,
            sniffed = ?sniffed,
            "Declared content type does not match file signature"
        );
        DetectedFormat::Unsupported
    }
}

fn declared_matches(declared: &str, sniffed: DetectedFormat) -> bool {
    match sniffed {
        DetectedFormat::Jpeg => declared == "image/jpeg",
        DetectedFormat::OtherImage(RasterFormat::Png) => declared == "image/png",
        DetectedFormat::OtherImage(RasterFormat::Gif) => declared == "image/gif",
        DetectedFormat::OtherImage(RasterFormat::WebP) => declared == "image/webp",
        // MP4 and QuickTime share the ISO base media container; clients
        // routinely label one as the other.
        DetectedFormat::Video(_) => declared == "video/mp4" || declared == "video/quicktime",
        DetectedFormat::Unsupported => false,
    }
}

/// Canonical content type for a detected format.
pub fn content_type_for(format: DetectedFormat) -> Option<&'static str> {
    match format {
        DetectedFormat::Jpeg => Some("image/jpeg"),
        DetectedFormat::OtherImage(RasterFormat::Png) => Some("image/png"),
        DetectedFormat::OtherImage(RasterFormat::Gif) => Some("image/gif"),
        DetectedFormat::OtherImage(RasterFormat::WebP) => Some("image/webp"),
        DetectedFormat::Video(VideoContainer::Mp4) => Some("video/mp4"),
        DetectedFormat::Video(VideoContainer::QuickTime) => Some("video/quicktime"),
        DetectedFormat::Unsupported => None,
    }
}
