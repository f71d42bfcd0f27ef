//! Snapshot of the EXIF fields an upload carried before scrubbing.
//!
//! The snapshot goes back to the uploader so they can see what was removed.
//! It is sensitive (GPS position, device serials) and must never be logged.

use std::collections::BTreeMap;
use std::io::Cursor;

/// Parse the EXIF fields of an image into `tag -> display value`.
///
/// Returns `None` when the image has no readable EXIF block. When a tag
/// appears in more than one IFD, the primary image's value wins.
pub fn capture_snapshot(data: &[u8]) -> Option<BTreeMap<String, String>> {
    let mut cursor = Cursor::new(data);
    let exif = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => exif,
        Err(e) => {
            tracing::debug!(error = %e, "No EXIF block found in upload");
            return None;
        }
    };

    let mut snapshot = BTreeMap::new();
    for field in exif.fields() {
        snapshot
            .entry(field.tag.to_string())
            .or_insert_with(|| field.display_value().with_unit(&exif).to_string());
    }

    if snapshot.is_empty() {
        None
    } else {
        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpeg::tests::{jpeg_with_exif, sample_jpeg};

    #[test]
    fn test_snapshot_reads_exif_fields() {
        let snapshot = capture_snapshot(&jpeg_with_exif()).unwrap();
        let make = snapshot.get("Make").unwrap();
        assert!(make.contains("Acme"));
    }

    #[test]
    fn test_snapshot_absent_without_exif() {
        assert!(capture_snapshot(&sample_jpeg()).is_none());
        assert!(capture_snapshot(b"not an image").is_none());
    }
}
