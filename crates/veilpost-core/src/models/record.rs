//! Keys for encrypted record fields held by the persistence collaborator.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

/// Owner of stored assets and records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        self.0.fmt(f)
    }
}

/// Record fields that are stored only as ciphertext envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SealedField {
    PostTitle,
    PostDescription,
    PostFilePath,
    PlatformCredentials,
}

impl SealedField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SealedField::PostTitle => "post_title",
            SealedField::PostDescription => "post_description",
            SealedField::PostFilePath => "post_file_path",
            SealedField::PlatformCredentials => "platform_credentials",
        }
    }
}

/// Address of one encrypted column value: a record (row) id plus the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub record_id: Uuid,
    pub field: SealedField,
}

impl RecordKey {
    pub fn new(record_id: Uuid, field: SealedField) -> Self {
        Self { record_id, field }
    }
}

impl Display for RecordKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}:{}", self.record_id, self.field.as_str())
    }
}
