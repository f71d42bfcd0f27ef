//! Metadata removal for PNG, GIF and WebP.
//!
//! These containers keep metadata in text chunks, ICC profiles and RIFF
//! chunks rather than in a walkable marker list, so the image is decoded and
//! re-encoded from pixels. The encoders write no ancillary metadata. Animated
//! inputs keep only their first frame.

use bytes::Bytes;
use image::{DynamicImage, ImageFormat};
use img_parts::png::Png;
use img_parts::webp::WebP;
use std::io::Cursor;
use veilpost_core::RasterFormat;

use crate::scrubber::ScrubError;

const PNG_METADATA_CHUNKS: [[u8; 4]; 6] = [*b"tEXt", *b"zTXt", *b"iTXt", *b"eXIf", *b"iCCP", *b"tIME"];
const WEBP_METADATA_CHUNKS: [[u8; 4]; 3] = [*b"EXIF", *b"XMP ", *b"ICCP"];

fn image_format(format: RasterFormat) -> ImageFormat {
    match format {
        RasterFormat::Png => ImageFormat::Png,
        RasterFormat::Gif => ImageFormat::Gif,
        RasterFormat::WebP => ImageFormat::WebP,
    }
}

/// Decode and re-encode a raster image, dropping every metadata container.
pub fn scrub_raster(data: &[u8], format: RasterFormat) -> Result<Vec<u8>, ScrubError> {
    let target = image_format(format);
    let img = image::load_from_memory_with_format(data, target)
        .map_err(|e| ScrubError::InvalidContainer(format!("failed to decode {:?}: {}", format, e)))?;

    // The GIF and WebP encoders only accept 8-bit RGB(A) buffers.
    let img = match format {
        RasterFormat::Png => img,
        RasterFormat::Gif | RasterFormat::WebP => DynamicImage::ImageRgba8(img.to_rgba8()),
    };

    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, target)
        .map_err(|e| ScrubError::ScrubFailure(format!("failed to encode {:?}: {}", format, e)))?;

    let bytes = cursor.into_inner();
    verify_clean(&bytes, format)?;
    Ok(bytes)
}

/// Check re-encoded output for metadata chunks.
pub fn verify_clean(data: &[u8], format: RasterFormat) -> Result<(), ScrubError> {
    let remaining = match format {
        RasterFormat::Png => {
            let png = Png::from_bytes(Bytes::copy_from_slice(data))
                .map_err(|e| ScrubError::ScrubFailure(format!("re-encoded PNG is unreadable: {}", e)))?;
            PNG_METADATA_CHUNKS
                .into_iter()
                .find(|kind| png.chunk_by_type(*kind).is_some())
        }
        RasterFormat::WebP => {
            let webp = WebP::from_bytes(Bytes::copy_from_slice(data))
                .map_err(|e| ScrubError::ScrubFailure(format!("re-encoded WebP is unreadable: {}", e)))?;
            WEBP_METADATA_CHUNKS
                .into_iter()
                .find(|id| webp.chunk_by_id(*id).is_some())
        }
        RasterFormat::Gif => None,
    };

    match remaining {
        Some(chunk) => Err(ScrubError::ScrubFailure(format!(
            "{} chunk remains after re-encode",
            String::from_utf8_lossy(&chunk)
        ))),
        None => Ok(()),
    }
}
