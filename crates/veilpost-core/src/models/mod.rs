//! Domain models shared across the pipeline.

pub mod media;
pub mod record;

pub use media::{
    DetectedFormat, RasterFormat, ScrubErrorKind, ScrubResult, StorageIdentifier, StoragePath,
    VideoContainer,
};
pub use record::{RecordKey, SealedField, UserId};
