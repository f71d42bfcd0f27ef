//! Upload flow: validate → sniff → stage → scrub → persist.

pub mod pipeline;
pub mod types;

pub use pipeline::UploadPipeline;
pub use types::{RawUpload, UploadSettings};
