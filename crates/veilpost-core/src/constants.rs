//! Fixed values shared across the pipeline.

/// Content types accepted at the upload boundary.
pub const ALLOWED_CONTENT_TYPES: [&str; 6] = [
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "video/mp4",
    "video/quicktime",
];

/// Salt fed to the key-derivation function together with the master secret.
///
/// Changing this value invalidates every stored ciphertext.
pub const KDF_SALT: &[u8] = b"veilpost/field-encryption/v1";

/// Environment variable holding the master secret.
pub const ENCRYPTION_KEY_ENV: &str = "ENCRYPTION_KEY";

/// Secret used when running outside production without `ENCRYPTION_KEY`.
pub const DEVELOPMENT_SECRET: &str = "veilpost-development-secret-not-for-production";

/// Directory (relative to the storage root) holding pre-scrub bytes.
pub const TEMP_DIR: &str = "temp";

/// Directory (relative to the storage root) holding scrubbed assets.
pub const UPLOADS_DIR: &str = "uploads";

/// Number of random bytes in a storage identifier.
pub const STORAGE_IDENTIFIER_BYTES: usize = 16;
