use serde::Serialize;
use tracing_subscriber::EnvFilter;
use veilpost_processing::jpeg::{SegmentKind, SegmentReader};
use veilpost_processing::ScrubError;

const DEFAULT_LOG_FILTER: &str = "warn,veilpost=info";

/// Initialize tracing for the CLI. Logs go to stderr so command output on
/// stdout stays machine-readable; `LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// One line of `veilpost inspect` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentSummary {
    pub marker: Option<String>,
    pub kind: String,
    pub length: usize,
    /// Whether scrubbing drops or rewrites this segment.
    pub removed_by_scrub: bool,
}

/// Describe every marker segment of a JPEG.
pub fn summarize_segments(data: &[u8]) -> Result<Vec<SegmentSummary>, ScrubError> {
    let mut summaries = Vec::new();
    for segment in SegmentReader::new(data)? {
        let segment = segment?;
        let (kind, removed_by_scrub) = match segment.kind {
            SegmentKind::Metadata(metadata) => (metadata.to_string(), metadata.is_identifying()),
            SegmentKind::Structural => ("structural".to_string(), false),
            SegmentKind::Standalone => ("standalone".to_string(), false),
            SegmentKind::Scan => ("scan".to_string(), false),
            SegmentKind::Raw => ("raw".to_string(), false),
            SegmentKind::End => ("end".to_string(), false),
        };
        summaries.push(SegmentSummary {
            marker: segment.marker.map(|m| format!("0xFF{:02X}", m)),
            kind,
            length: segment.bytes.len(),
            removed_by_scrub,
        });
    }
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarize_marks_exif_for_removal() {
        let mut data = vec![0xFF, 0xD8];
        data.extend_from_slice(&[0xFF, 0xE1, 0x00, 0x08]);
        data.extend_from_slice(b"Exif\0\0");
        data.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x02, 0x12, 0x34, 0xFF, 0xD9]);

        let summaries = summarize_segments(&data).unwrap();
        assert_eq!(summaries.len(), 3);
        assert_eq!(summaries[0].marker.as_deref(), Some("0xFFD8"));
        assert_eq!(summaries[1].kind, "EXIF");
        assert!(summaries[1].removed_by_scrub);
        assert_eq!(summaries[2].kind, "scan");
        assert_eq!(summaries[2].length, 8);
    }

    #[test]
    fn summarize_rejects_non_jpeg() {
        assert!(summarize_segments(b"GIF89a").is_err());
    }
}
