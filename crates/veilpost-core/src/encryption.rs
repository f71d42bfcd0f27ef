//! Field-level encryption for sensitive record values (titles, descriptions,
//! file paths, platform credentials).
//!
//! Values are sealed with AES-256-GCM using a 16-byte random IV per call and
//! stored as `hex(iv):hex(tag):hex(ciphertext)`. The key is derived once from
//! the master secret with Argon2id and handed to [`FieldEncryptionService`]
//! explicitly; nothing here reads global state.

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadCore, AeadInPlace, KeyInit, OsRng};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Key};
use argon2::{Algorithm, Argon2, Params, Version};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FmtResult};
use thiserror::Error;
use zeroize::Zeroize;

use crate::constants::KDF_SALT;

/// AES-256-GCM with a 16-byte nonce.
type Aes256Gcm16 = AesGcm<Aes256, U16>;

pub const KEY_SIZE: usize = 32;
pub const IV_SIZE: usize = 16;
pub const TAG_SIZE: usize = 16;

#[derive(Debug, Error)]
pub enum EncryptionError {
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Encryption failed")]
    Encryption,

    #[error("Failed to serialize value: {0}")]
    Serialization(#[source] serde_json::Error),
}

/// Decryption failures. Messages never contain ciphertext or plaintext.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecryptionError {
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(&'static str),

    #[error("Authentication failed")]
    AuthenticationFailure,

    #[error("Decrypted value could not be decoded: {0}")]
    DeserializationError(String),
}

/// The process-wide symmetric key. Zeroized on drop.
#[derive(Clone)]
pub struct KeyMaterial {
    bytes: [u8; KEY_SIZE],
}

impl KeyMaterial {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 19456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// Derive the field-encryption key from the master secret and the fixed salt.
pub fn derive_key_material(
    secret: &SecretString,
    params: &KdfParams,
) -> Result<KeyMaterial, EncryptionError> {
    let argon2_params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| EncryptionError::KeyDerivation(format!("invalid Argon2id params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(secret.expose_secret().as_bytes(), KDF_SALT, &mut key)
        .map_err(|e| EncryptionError::KeyDerivation(e.to_string()))?;

    let material = KeyMaterial::from_bytes(key);
    key.zeroize();
    Ok(material)
}

/// Parsed form of the `iv:tag:ciphertext` wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherEnvelope {
    pub iv: [u8; IV_SIZE],
    pub tag: [u8; TAG_SIZE],
    pub ciphertext: Vec<u8>,
}

impl CipherEnvelope {
    pub fn parse(encoded: &str) -> Result<Self, DecryptionError> {
        let mut parts = encoded.split(':');
        let (Some(iv_hex), Some(tag_hex), Some(ct_hex), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(DecryptionError::MalformedEnvelope(
                "expected three colon-separated segments",
            ));
        };

        let iv = decode_fixed::<IV_SIZE>(iv_hex, "iv segment")?;
        let tag = decode_fixed::<TAG_SIZE>(tag_hex, "tag segment")?;
        let ciphertext = hex::decode(ct_hex)
            .map_err(|_| DecryptionError::MalformedEnvelope("ciphertext segment is not hex"))?;

        Ok(Self {
            iv,
            tag,
            ciphertext,
        })
    }
}

fn decode_fixed<const N: usize>(
    segment: &str,
    what: &'static str,
) -> Result<[u8; N], DecryptionError> {
    if segment.is_empty() {
        return Err(DecryptionError::MalformedEnvelope(what));
    }
    let mut out = [0u8; N];
    hex::decode_to_slice(segment, &mut out).map_err(|_| DecryptionError::MalformedEnvelope(what))?;
    Ok(out)
}

impl Display for CipherEnvelope {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "{}:{}:{}",
            hex::encode(self.iv),
            hex::encode(self.tag),
            hex::encode(&self.ciphertext)
        )
    }
}

/// Authenticated encryption of text and JSON values.
#[derive(Clone)]
pub struct FieldEncryptionService {
    cipher: Aes256Gcm16,
}

impl FieldEncryptionService {
    pub fn new(key: &KeyMaterial) -> Self {
        let key = Key::<Aes256Gcm16>::from_slice(key.as_bytes());
        Self {
            cipher: Aes256Gcm16::new(key),
        }
    }

    /// Encrypt a text value under a fresh random IV.
    pub fn encrypt_field(&self, plaintext: &str) -> Result<CipherEnvelope, EncryptionError> {
        self.seal(plaintext.as_bytes())
    }

    /// Decrypt a `iv:tag:ciphertext` envelope. Fails closed: no plaintext is
    /// returned unless the tag verifies.
    pub fn decrypt_field(&self, envelope: &str) -> Result<String, DecryptionError> {
        let envelope = CipherEnvelope::parse(envelope)?;
        let plaintext = self.open(&envelope)?;
        String::from_utf8(plaintext)
            .map_err(|_| DecryptionError::DeserializationError("plaintext is not UTF-8".to_string()))
    }

    /// Encrypt any serializable value through its JSON serialization.
    pub fn encrypt_structured<T: Serialize + ?Sized>(
        &self,
        value: &T,
    ) -> Result<CipherEnvelope, EncryptionError> {
        let mut json = serde_json::to_vec(value).map_err(EncryptionError::Serialization)?;
        let envelope = self.seal(&json);
        json.zeroize();
        envelope
    }

    pub fn decrypt_structured<T: DeserializeOwned>(
        &self,
        envelope: &str,
    ) -> Result<T, DecryptionError> {
        let envelope = CipherEnvelope::parse(envelope)?;
        let plaintext = self.open(&envelope)?;
        serde_json::from_slice(&plaintext)
            .map_err(|e| DecryptionError::DeserializationError(format!("invalid JSON: {}", e)))
    }

    /// Absent values stay absent.
    pub fn encrypt_optional(
        &self,
        plaintext: Option<&str>,
    ) -> Result<Option<String>, EncryptionError> {
        plaintext
            .map(|p| self.encrypt_field(p).map(|e| e.to_string()))
            .transpose()
    }

    pub fn decrypt_optional(&self, envelope: Option<&str>) -> Result<Option<String>, DecryptionError> {
        envelope.map(|e| self.decrypt_field(e)).transpose()
    }

    fn seal(&self, plaintext: &[u8]) -> Result<CipherEnvelope, EncryptionError> {
        let nonce = Aes256Gcm16::generate_nonce(&mut OsRng);
        let mut buffer = plaintext.to_vec();
        let tag = self
            .cipher
            .encrypt_in_place_detached(&nonce, b"", &mut buffer)
            .map_err(|_| EncryptionError::Encryption)?;

        let mut iv = [0u8; IV_SIZE];
        iv.copy_from_slice(&nonce);
        let mut tag_bytes = [0u8; TAG_SIZE];
        tag_bytes.copy_from_slice(&tag);

        Ok(CipherEnvelope {
            iv,
            tag: tag_bytes,
            ciphertext: buffer,
        })
    }

    fn open(&self, envelope: &CipherEnvelope) -> Result<Vec<u8>, DecryptionError> {
        let nonce = GenericArray::from_slice(&envelope.iv);
        let tag = GenericArray::from_slice(&envelope.tag);
        let mut buffer = envelope.ciphertext.clone();
        if self
            .cipher
            .decrypt_in_place_detached(nonce, b"", &mut buffer, tag)
            .is_err()
        {
            buffer.zeroize();
            return Err(DecryptionError::AuthenticationFailure);
        }
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn test_service() -> FieldEncryptionService {
        let test_key = *b"01234567890123456789012345678901";
        FieldEncryptionService::new(&KeyMaterial::from_bytes(test_key))
    }

    fn fast_params() -> KdfParams {
        KdfParams {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn test_encryption_decryption() {
        let service = test_service();
        let plaintext = "Beach day with the kids";

        let envelope = service.encrypt_field(plaintext).unwrap().to_string();
        assert!(!envelope.contains(plaintext));
        assert_eq!(envelope.split(':').count(), 3);

        let decrypted = service.decrypt_field(&envelope).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_empty_plaintext_round_trips() {
        let service = test_service();
        let envelope = service.encrypt_field("").unwrap().to_string();
        assert!(envelope.ends_with(':'));
        assert_eq!(service.decrypt_field(&envelope).unwrap(), "");
    }

    #[test]
    fn test_fresh_iv_per_call() {
        let service = test_service();
        let mut ivs = HashSet::new();
        let mut envelopes = HashSet::new();
        for _ in 0..1000 {
            let envelope = service.encrypt_field("same plaintext").unwrap();
            assert!(ivs.insert(envelope.iv));
            assert!(envelopes.insert(envelope.to_string()));
        }
    }

    #[test]
    fn test_missing_second_segment_is_malformed() {
        let service = test_service();
        let envelope = service.encrypt_field("title").unwrap();
        let truncated = format!("{}:{}", hex::encode(envelope.iv), hex::encode(&envelope.ciphertext));
        assert!(matches!(
            service.decrypt_field(&truncated),
            Err(DecryptionError::MalformedEnvelope(_))
        ));

        let empty_tag = format!("{}::{}", hex::encode(envelope.iv), hex::encode(&envelope.ciphertext));
        assert!(matches!(
            service.decrypt_field(&empty_tag),
            Err(DecryptionError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_malformed_envelopes() {
        let service = test_service();
        let four_segments = format!("{}:{}:00:00", "00".repeat(16), "00".repeat(16));
        for input in [
            "",
            "not-an-envelope",
            "zz:yy:xx",
            "00:00:00",
            "a:b:c:d",
            four_segments.as_str(),
        ] {
            assert!(
                matches!(
                    service.decrypt_field(input),
                    Err(DecryptionError::MalformedEnvelope(_))
                ),
                "input {:?} should be malformed",
                input
            );
        }
    }

    #[test]
    fn test_wrong_key_fails_authentication() {
        let envelope = test_service().encrypt_field("secret").unwrap().to_string();
        let other = FieldEncryptionService::new(&KeyMaterial::from_bytes([7u8; KEY_SIZE]));
        assert_eq!(
            other.decrypt_field(&envelope),
            Err(DecryptionError::AuthenticationFailure)
        );
    }

    #[test]
    fn test_uppercase_hex_is_accepted() {
        let service = test_service();
        let envelope = service.encrypt_field("Mixed").unwrap().to_string().to_uppercase();
        assert_eq!(service.decrypt_field(&envelope).unwrap(), "Mixed");
    }

    #[test]
    fn test_structured_round_trip() {
        let service = test_service();
        let config = serde_json::json!({
            "access_token": "tok_123",
            "refresh_token": "ref_456",
            "expires_in": 3600
        });

        let envelope = service.encrypt_structured(&config).unwrap().to_string();
        let decrypted: serde_json::Value = service.decrypt_structured(&envelope).unwrap();
        assert_eq!(decrypted, config);
    }

    #[test]
    fn test_structured_decode_failure_is_distinct() {
        let service = test_service();
        let envelope = service.encrypt_field("{not json").unwrap().to_string();
        let result: Result<serde_json::Value, _> = service.decrypt_structured(&envelope);
        assert!(matches!(
            result,
            Err(DecryptionError::DeserializationError(_))
        ));
    }

    #[test]
    fn test_optional_helpers() {
        let service = test_service();
        assert_eq!(service.encrypt_optional(None).unwrap(), None);
        assert_eq!(service.decrypt_optional(None).unwrap(), None);

        let sealed = service.encrypt_optional(Some("desc")).unwrap();
        assert_eq!(
            service.decrypt_optional(sealed.as_deref()).unwrap(),
            Some("desc".to_string())
        );
    }

    #[test]
    fn test_kdf_deterministic() {
        let secret = SecretString::from("a-master-secret-that-is-long-enough");
        let key1 = derive_key_material(&secret, &fast_params()).unwrap();
        let key2 = derive_key_material(&secret, &fast_params()).unwrap();
        assert_eq!(key1.as_bytes(), key2.as_bytes());

        let envelope = FieldEncryptionService::new(&key1)
            .encrypt_field("path")
            .unwrap()
            .to_string();
        assert_eq!(
            FieldEncryptionService::new(&key2).decrypt_field(&envelope).unwrap(),
            "path"
        );
    }

    #[test]
    fn test_kdf_different_secrets() {
        let key1 = derive_key_material(&SecretString::from("secret-a"), &fast_params()).unwrap();
        let key2 = derive_key_material(&SecretString::from("secret-b"), &fast_params()).unwrap();
        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_kdf_rejects_invalid_params() {
        let params = KdfParams {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        };
        assert!(matches!(
            derive_key_material(&SecretString::from("secret"), &params),
            Err(EncryptionError::KeyDerivation(_))
        ));
    }

    #[test]
    fn test_key_material_debug_is_redacted() {
        let key = KeyMaterial::from_bytes([0x42; KEY_SIZE]);
        let debug = format!("{:?}", key);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("42"));
    }

    fn flip_bit(bytes: &mut [u8], bit: usize) {
        let index = bit % (bytes.len() * 8);
        bytes[index / 8] ^= 1 << (index % 8);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_round_trip(plaintext in ".{0,256}") {
            let service = test_service();
            let envelope = service.encrypt_field(&plaintext).unwrap().to_string();
            prop_assert_eq!(service.decrypt_field(&envelope).unwrap(), plaintext);
        }

        #[test]
        fn prop_ciphertext_bit_flip_fails_authentication(plaintext in ".{1,128}", bit in any::<usize>()) {
            let service = test_service();
            let mut envelope = service.encrypt_field(&plaintext).unwrap();
            flip_bit(&mut envelope.ciphertext, bit);
            prop_assert_eq!(
                service.decrypt_field(&envelope.to_string()),
                Err(DecryptionError::AuthenticationFailure)
            );
        }

        #[test]
        fn prop_tag_bit_flip_fails_authentication(plaintext in ".{0,128}", bit in any::<usize>()) {
            let service = test_service();
            let mut envelope = service.encrypt_field(&plaintext).unwrap();
            flip_bit(&mut envelope.tag, bit);
            prop_assert_eq!(
                service.decrypt_field(&envelope.to_string()),
                Err(DecryptionError::AuthenticationFailure)
            );
        }
    }
}
