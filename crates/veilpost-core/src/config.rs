//! Configuration module
//!
//! Settings are read from the environment (after loading `.env`). The master
//! secret is only ever held as a [`SecretString`] and is consumed by the key
//! derivation at startup.

use secrecy::SecretString;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::constants::{ALLOWED_CONTENT_TYPES, DEVELOPMENT_SECRET, ENCRYPTION_KEY_ENV};
use crate::encryption::{derive_key_material, KdfParams, KeyMaterial};
use crate::error::AppError;

const MAX_UPLOAD_SIZE_MB: usize = 50;
const PURGE_CONCURRENCY: usize = 8;
const MIN_PRODUCTION_SECRET_LEN: usize = 32;

/// What to do with video uploads, whose container metadata cannot be removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoPolicy {
    /// Fail the upload with a scrub failure.
    Reject,
    /// Store the bytes but flag the result as not scrubbed.
    StoreFlagged,
}

impl FromStr for VideoPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reject" => Ok(VideoPolicy::Reject),
            "store-flagged" | "store_flagged" => Ok(VideoPolicy::StoreFlagged),
            _ => Err(anyhow::anyhow!("Invalid VIDEO_POLICY: {}", s)),
        }
    }
}

/// Privacy pipeline configuration
#[derive(Debug)]
pub struct PrivacyConfig {
    pub environment: String,
    pub encryption_secret: Option<SecretString>,
    pub storage_root: PathBuf,
    pub max_upload_bytes: usize,
    pub allowed_content_types: Vec<String>,
    pub video_policy: VideoPolicy,
    pub capture_metadata_snapshot: bool,
    pub kdf: KdfParams,
    pub purge_concurrency: usize,
}

impl PrivacyConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup (the environment
    /// in production, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = KdfParams::default();

        let environment = lookup("ENVIRONMENT")
            .or_else(|| lookup("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let allowed_content_types = match lookup("ALLOWED_CONTENT_TYPES") {
            Some(value) => value
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            None => ALLOWED_CONTENT_TYPES.iter().map(|s| s.to_string()).collect(),
        };

        let max_upload_mb = parse_or(&lookup, "MAX_UPLOAD_SIZE_MB", MAX_UPLOAD_SIZE_MB)?;

        let config = PrivacyConfig {
            environment,
            encryption_secret: lookup(ENCRYPTION_KEY_ENV)
                .filter(|s| !s.is_empty())
                .map(SecretString::from),
            storage_root: lookup("STORAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data")),
            max_upload_bytes: max_upload_mb * 1024 * 1024,
            allowed_content_types,
            video_policy: lookup("VIDEO_POLICY")
                .map(|v| v.parse())
                .transpose()?
                .unwrap_or(VideoPolicy::Reject),
            capture_metadata_snapshot: lookup("CAPTURE_METADATA_SNAPSHOT")
                .map(|v| v.trim().eq_ignore_ascii_case("true") || v.trim() == "1")
                .unwrap_or(true),
            kdf: KdfParams {
                memory_kib: parse_or(&lookup, "KDF_MEMORY_KIB", defaults.memory_kib)?,
                iterations: parse_or(&lookup, "KDF_ITERATIONS", defaults.iterations)?,
                parallelism: parse_or(&lookup, "KDF_PARALLELISM", defaults.parallelism)?,
            },
            purge_concurrency: parse_or(&lookup, "PURGE_CONCURRENCY", PURGE_CONCURRENCY)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.is_production() {
            match &self.encryption_secret {
                None => {
                    return Err(anyhow::anyhow!(
                        "{} must be set in production",
                        ENCRYPTION_KEY_ENV
                    ))
                }
                Some(secret) => {
                    use secrecy::ExposeSecret;
                    if secret.expose_secret().len() < MIN_PRODUCTION_SECRET_LEN {
                        return Err(anyhow::anyhow!(
                            "{} must be at least {} characters long in production",
                            ENCRYPTION_KEY_ENV,
                            MIN_PRODUCTION_SECRET_LEN
                        ));
                    }
                }
            }
        }

        if self.allowed_content_types.is_empty() {
            return Err(anyhow::anyhow!("ALLOWED_CONTENT_TYPES must not be empty"));
        }
        if let Some(unknown) = self
            .allowed_content_types
            .iter()
            .find(|ct| !ALLOWED_CONTENT_TYPES.contains(&ct.as_str()))
        {
            return Err(anyhow::anyhow!(
                "ALLOWED_CONTENT_TYPES may only narrow the built-in allow-list; {} is not supported",
                unknown
            ));
        }

        if self.max_upload_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_UPLOAD_SIZE_MB must be greater than 0"));
        }
        if self.purge_concurrency == 0 {
            return Err(anyhow::anyhow!("PURGE_CONCURRENCY must be greater than 0"));
        }

        Ok(())
    }

    /// Derive the process-wide key. Called once at startup.
    ///
    /// Outside production a missing secret falls back to a development-only
    /// value and logs a warning; `validate` already refuses that in production.
    pub fn key_material(&self) -> Result<KeyMaterial, AppError> {
        let key = match &self.encryption_secret {
            Some(secret) => derive_key_material(secret, &self.kdf)?,
            None if self.is_production() => {
                return Err(AppError::Configuration(format!(
                    "{} is not set",
                    ENCRYPTION_KEY_ENV
                )))
            }
            None => {
                tracing::warn!(
                    environment = %self.environment,
                    "{} not set, using the development secret; stored data is NOT protected",
                    ENCRYPTION_KEY_ENV
                );
                derive_key_material(&SecretString::from(DEVELOPMENT_SECRET), &self.kdf)?
            }
        };
        Ok(key)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, anyhow::Error>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number", key)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<PrivacyConfig, anyhow::Error> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        PrivacyConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert!(!config.is_production());
        assert_eq!(config.allowed_content_types.len(), 6);
        assert_eq!(config.video_policy, VideoPolicy::Reject);
        assert_eq!(config.max_upload_bytes, 50 * 1024 * 1024);
        assert!(config.capture_metadata_snapshot);
        assert_eq!(config.kdf, KdfParams::default());
    }

    #[test]
    fn test_missing_secret_is_error_in_production() {
        let err = config_from(&[("ENVIRONMENT", "production")]).unwrap_err();
        assert!(err.to_string().contains("ENCRYPTION_KEY"));
    }

    #[test]
    fn test_short_secret_is_error_in_production() {
        let err = config_from(&[("ENVIRONMENT", "prod"), ("ENCRYPTION_KEY", "short")]).unwrap_err();
        assert!(err.to_string().contains("at least"));
    }

    #[test]
    fn test_production_with_secret() {
        let config = config_from(&[
            ("APP_ENV", "production"),
            ("ENCRYPTION_KEY", "0123456789abcdef0123456789abcdef-prod"),
        ])
        .unwrap();
        assert!(config.is_production());
    }

    #[test]
    fn test_development_falls_back_to_development_secret() {
        let config = config_from(&[
            ("KDF_MEMORY_KIB", "1024"),
            ("KDF_ITERATIONS", "1"),
        ])
        .unwrap();
        assert!(config.encryption_secret.is_none());
        assert!(config.key_material().is_ok());
    }

    #[test]
    fn test_allow_list_can_only_narrow() {
        let config = config_from(&[("ALLOWED_CONTENT_TYPES", "image/jpeg, IMAGE/PNG")]).unwrap();
        assert_eq!(config.allowed_content_types, vec!["image/jpeg", "image/png"]);

        assert!(config_from(&[("ALLOWED_CONTENT_TYPES", "image/jpeg,text/html")]).is_err());
    }

    #[test]
    fn test_video_policy_parsing() {
        let config = config_from(&[("VIDEO_POLICY", "store-flagged")]).unwrap();
        assert_eq!(config.video_policy, VideoPolicy::StoreFlagged);
        assert!(config_from(&[("VIDEO_POLICY", "keep")]).is_err());
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        assert!(config_from(&[("MAX_UPLOAD_SIZE_MB", "lots")]).is_err());
        assert!(config_from(&[("PURGE_CONCURRENCY", "0")]).is_err());
    }
}
