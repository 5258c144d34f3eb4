//! Configuration loading and validation for the hashcrypt service.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any required variable is missing or invalid.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::aws::KmsSettings;
use crate::crypto::{HashAlgorithm, SaltedHasher};
use crate::dek::RotationPolicy;
use crate::fields::{FieldList, DEFAULT_CONTEXT_FIELD};

/// Validated service configuration.
#[derive(Clone, Deserialize)]
pub struct Config {
    /// KMS master key id (or ARN / alias) that wraps data keys. **Required.**
    pub kms_key_id: String,

    /// Comma-separated names of the record fields to pseudonymise. **Required.**
    pub hash_fields: String,

    /// `SHA-256`, `SHA-512`, or `drop` to disable hashing.
    #[serde(default = "default_hash_algorithm")]
    pub hash_algorithm: String,

    /// Salt prepended to every value before hashing.
    #[serde(default)]
    pub hash_salt: String,

    /// Maximum encryptions served by one data key.
    #[serde(default = "default_key_rotation_period")]
    pub key_rotation_period: u64,

    /// AWS region of the KMS key.
    #[serde(default = "default_aws_region")]
    pub aws_region: String,

    /// Static credentials; when absent the default AWS credential chain is used.
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,

    /// Endpoint override for KMS, e.g. a local forwarding proxy.
    pub kms_endpoint_url: Option<String>,

    /// Record field that receives the decryption context.
    #[serde(default = "default_context_field_name")]
    pub context_field_name: String,

    /// Expose `POST /decrypt`.
    #[serde(default)]
    pub enable_decrypt_endpoint: bool,

    /// Port the HTTP server listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// OTLP endpoint; span export is off when unset.
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_hash_algorithm() -> String {
    "SHA-256".into()
}
fn default_key_rotation_period() -> u64 {
    10_000
}
fn default_aws_region() -> String {
    "ap-southeast-1".into()
}
fn default_context_field_name() -> String {
    DEFAULT_CONTEXT_FIELD.into()
}
fn default_listen_port() -> u16 {
    8080
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any required variable is absent or cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.kms_key_id, "KMS_KEY_ID")?;
        ensure_non_empty(&self.context_field_name, "CONTEXT_FIELD_NAME")?;

        let fields = self.field_list();
        if fields.is_empty() {
            anyhow::bail!("HASH_FIELDS must name at least one field");
        }

        let algorithm = self.hash_algorithm()?;
        if algorithm != HashAlgorithm::Disabled && self.hash_salt.is_empty() {
            anyhow::bail!("HASH_SALT is required unless HASH_ALGORITHM disables hashing");
        }

        self.rotation_policy()?;
        if self.key_rotation_period < fields.len() as u64 {
            anyhow::bail!(
                "KEY_ROTATION_PERIOD ({}) must be at least the number of HASH_FIELDS ({})",
                self.key_rotation_period,
                fields.len()
            );
        }

        match (&self.aws_access_key_id, &self.aws_secret_access_key) {
            (Some(_), None) | (None, Some(_)) => anyhow::bail!(
                "AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY must be set together"
            ),
            _ => {}
        }
        Ok(())
    }

    pub fn field_list(&self) -> FieldList {
        FieldList::parse(&self.hash_fields)
    }

    pub fn hash_algorithm(&self) -> Result<HashAlgorithm> {
        HashAlgorithm::from_name(&self.hash_algorithm).context("invalid HASH_ALGORITHM")
    }

    pub fn hasher(&self) -> Result<SaltedHasher> {
        Ok(SaltedHasher::new(
            self.hash_algorithm()?,
            self.hash_salt.as_bytes(),
        ))
    }

    pub fn rotation_policy(&self) -> Result<RotationPolicy> {
        RotationPolicy::new(self.key_rotation_period).context("invalid KEY_ROTATION_PERIOD")
    }

    pub fn kms_settings(&self) -> KmsSettings {
        let credentials = match (&self.aws_access_key_id, &self.aws_secret_access_key) {
            (Some(id), Some(secret)) => Some((id.clone(), secret.clone())),
            _ => None,
        };
        KmsSettings {
            region: self.aws_region.clone(),
            credentials,
            endpoint_url: self.kms_endpoint_url.clone(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("kms_key_id", &self.kms_key_id)
            .field("hash_fields", &self.hash_fields)
            .field("hash_algorithm", &self.hash_algorithm)
            .field("hash_salt", &"[REDACTED]")
            .field("key_rotation_period", &self.key_rotation_period)
            .field("aws_region", &self.aws_region)
            .field("aws_access_key_id", &self.aws_access_key_id)
            .field(
                "aws_secret_access_key",
                &self.aws_secret_access_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("kms_endpoint_url", &self.kms_endpoint_url)
            .field("context_field_name", &self.context_field_name)
            .field("enable_decrypt_endpoint", &self.enable_decrypt_endpoint)
            .field("listen_port", &self.listen_port)
            .field("otel_exporter_otlp_endpoint", &self.otel_exporter_otlp_endpoint)
            .field("log_level", &self.log_level)
            .finish()
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config {
            kms_key_id: "59d9d135-21ee-48d0-9322-d7243983f246".into(),
            hash_fields: "name, nric".into(),
            hash_algorithm: default_hash_algorithm(),
            hash_salt: "salt123".into(),
            key_rotation_period: 5,
            aws_region: default_aws_region(),
            aws_access_key_id: None,
            aws_secret_access_key: None,
            kms_endpoint_url: None,
            context_field_name: default_context_field_name(),
            enable_decrypt_endpoint: false,
            listen_port: default_listen_port(),
            otel_exporter_otlp_endpoint: None,
            log_level: default_log_level(),
        }
    }

    #[test]
    fn defaults_are_correct() {
        assert_eq!(default_hash_algorithm(), "SHA-256");
        assert_eq!(default_key_rotation_period(), 10_000);
        assert_eq!(default_aws_region(), "ap-southeast-1");
        assert_eq!(default_context_field_name(), "aws_enc_ctx");
        assert_eq!(default_listen_port(), 8080);
        assert_eq!(default_log_level(), "info");
    }

    #[test]
    fn valid_config_passes() {
        let cfg = valid();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.field_list().len(), 2);
        assert_eq!(cfg.rotation_policy().unwrap().period(), 5);
    }

    #[test]
    fn validate_rejects_empty_key_id() {
        let cfg = Config {
            kms_key_id: " ".into(),
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_algorithm() {
        let cfg = Config {
            hash_algorithm: "MD5".into(),
            ..valid()
        };
        let err = cfg.validate().unwrap_err();
        assert!(format!("{err:#}").contains("MD5"));
    }

    #[test]
    fn validate_rejects_missing_salt_unless_dropping() {
        let cfg = Config {
            hash_salt: String::new(),
            ..valid()
        };
        assert!(cfg.validate().is_err());

        let cfg = Config {
            hash_salt: String::new(),
            hash_algorithm: "drop".into(),
            ..valid()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_period_below_field_count() {
        let cfg = Config {
            key_rotation_period: 1,
            ..valid()
        };
        assert!(cfg.validate().is_err());

        let cfg = Config {
            key_rotation_period: 0,
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_field_list() {
        let cfg = Config {
            hash_fields: " , ".into(),
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_half_credentials() {
        let cfg = Config {
            aws_access_key_id: Some("AKIA".into()),
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn kms_settings_carry_credentials_and_endpoint() {
        let cfg = Config {
            aws_access_key_id: Some("AKIA".into()),
            aws_secret_access_key: Some("secret".into()),
            kms_endpoint_url: Some("http://127.0.0.1:8001".into()),
            ..valid()
        };
        let settings = cfg.kms_settings();
        assert_eq!(settings.region, "ap-southeast-1");
        assert!(settings.credentials.is_some());
        assert_eq!(settings.endpoint_url.as_deref(), Some("http://127.0.0.1:8001"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let cfg = Config {
            aws_access_key_id: Some("AKIA".into()),
            aws_secret_access_key: Some("very-secret".into()),
            ..valid()
        };
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("salt123"));
        assert!(!rendered.contains("very-secret"));
    }
}
