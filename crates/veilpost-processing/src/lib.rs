//! Veilpost Processing Library
//!
//! This crate turns untrusted uploads into metadata-free assets: magic-byte
//! format detection, allow-list validation, the JPEG marker-segment scrubber,
//! raster re-encoding, the EXIF snapshot and the upload pipeline that ties
//! them to the asset store.

pub mod detect;
pub mod jpeg;
pub mod metadata;
pub mod raster;
pub mod scrubber;
pub mod upload;
pub mod validator;

// Re-export commonly used types
pub use detect::{content_type_for, detect_format, sniff};
pub use jpeg::{MetadataKind, Segment, SegmentKind, SegmentReader};
pub use metadata::capture_snapshot;
pub use scrubber::{MetadataScrubber, ScrubError, ScrubOutcome};
pub use upload::{RawUpload, UploadPipeline, UploadSettings};
pub use validator::{UploadValidator, ValidationError};
