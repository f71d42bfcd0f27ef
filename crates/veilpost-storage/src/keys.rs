//! Secure name generation for stored assets.
//!
//! Identifier format: 32 lowercase hex characters (16 bytes from the operating
//! system CSPRNG) followed by the extension of the sniffed format.

use rand_core::{CryptoRng, OsRng, RngCore};
use veilpost_core::constants::STORAGE_IDENTIFIER_BYTES;
use veilpost_core::{DetectedFormat, StorageIdentifier};

/// Generate a fresh storage identifier for an asset of the given format.
///
/// Returns `None` for [`DetectedFormat::Unsupported`].
pub fn generate_storage_identifier(format: DetectedFormat) -> Option<StorageIdentifier> {
    generate_with(&mut OsRng, format)
}

/// Generate an identifier from the given cryptographically secure source.
pub fn generate_with<R: RngCore + CryptoRng>(
    rng: &mut R,
    format: DetectedFormat,
) -> Option<StorageIdentifier> {
    let mut random = [0u8; STORAGE_IDENTIFIER_BYTES];
    rng.fill_bytes(&mut random);
    StorageIdentifier::from_random(random, format)
}
