//! [`KmsKeyAuthority`]: `GenerateDataKey` against AWS KMS.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_kms::config::Credentials;
use aws_sdk_kms::error::DisplayErrorContext;
use aws_sdk_kms::types::DataKeySpec;
use tracing::debug;
use zeroize::Zeroizing;

use crate::dek::{GeneratedDataKey, KeyAuthority, KeyAuthorityError};

/// Connection settings for the KMS client.
///
/// One struct covers every deployment shape: default credential chain or
/// static keys, direct or proxied endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct KmsSettings {
    /// AWS region hosting the master key.
    pub region: String,
    /// `(access_key_id, secret_access_key)`; `None` uses the default chain.
    pub credentials: Option<(String, String)>,
    /// Endpoint override, e.g. `http://127.0.0.1:8001` for a local proxy.
    pub endpoint_url: Option<String>,
}

impl std::fmt::Debug for KmsSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KmsSettings")
            .field("region", &self.region)
            .field("static_credentials", &self.credentials.is_some())
            .field("endpoint_url", &self.endpoint_url)
            .finish()
    }
}

/// Key authority backed by AWS KMS `GenerateDataKey` with an `AES_128` key spec.
#[derive(Clone, Debug)]
pub struct KmsKeyAuthority {
    client: aws_sdk_kms::Client,
}

impl KmsKeyAuthority {
    /// Build the KMS client described by `settings`.
    ///
    /// No request is made here; credentials and connectivity are first
    /// exercised by the initial data key acquisition.
    pub async fn new(settings: &KmsSettings) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()));
        if let Some((access_key_id, secret_access_key)) = &settings.credentials {
            loader = loader.credentials_provider(Credentials::new(
                access_key_id.clone(),
                secret_access_key.clone(),
                None,
                None,
                "hashcrypt-static",
            ));
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_kms::config::Builder::from(&sdk_config);
        if let Some(url) = &settings.endpoint_url {
            builder = builder.endpoint_url(url);
        }

        debug!(settings = ?settings, "KMS client configured");
        Self {
            client: aws_sdk_kms::Client::from_conf(builder.build()),
        }
    }
}

#[async_trait]
impl KeyAuthority for KmsKeyAuthority {
    async fn generate_data_key(&self, key_id: &str) -> Result<GeneratedDataKey, KeyAuthorityError> {
        let resp = self
            .client
            .generate_data_key()
            .key_id(key_id)
            .key_spec(DataKeySpec::Aes128)
            .send()
            .await
            .map_err(|e| KeyAuthorityError::Request(DisplayErrorContext(&e).to_string()))?;

        let plaintext = resp
            .plaintext()
            .ok_or(KeyAuthorityError::MissingField("plaintext"))?;
        let wrapped = resp
            .ciphertext_blob()
            .ok_or(KeyAuthorityError::MissingField("ciphertext blob"))?;

        Ok(GeneratedDataKey {
            plaintext_key: Zeroizing::new(plaintext.as_ref().to_vec()),
            wrapped_key: wrapped.as_ref().to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_debug_hides_credentials() {
        let settings = KmsSettings {
            region: "ap-southeast-1".into(),
            credentials: Some(("AKIAEXAMPLE".into(), "wJalrXUtnFEMI".into())),
            endpoint_url: None,
        };
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("AKIAEXAMPLE"));
        assert!(!rendered.contains("wJalrXUtnFEMI"));
        assert!(rendered.contains("static_credentials: true"));
    }

    #[tokio::test]
    async fn client_builds_without_network() {
        let settings = KmsSettings {
            region: "ap-southeast-1".into(),
            credentials: Some(("AKIAEXAMPLE".into(), "secret".into())),
            endpoint_url: Some("http://127.0.0.1:8001".into()),
        };
        let authority = KmsKeyAuthority::new(&settings).await;
        let region = authority.client.config().region().map(|r| r.as_ref().to_owned());
        assert_eq!(region.as_deref(), Some("ap-southeast-1"));
    }
}
