//! Record-level pseudonymisation of configured fields.
//!
//! For every configured field `f` of a flat JSON record:
//!
//! - `f_enc` receives the base64 ciphertext of the trimmed value;
//! - `f` is overwritten with the salted hash, or removed when hashing is
//!   disabled;
//! - empty values (after trimming) become `""` in both `f` and `f_enc`.
//!
//! The record also gains one decryption context field naming the key all of
//! its ciphertexts were sealed under.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::cryptor::{CryptorError, EnvelopeCryptor};

/// Default name of the per-record decryption context field.
pub const DEFAULT_CONTEXT_FIELD: &str = "aws_enc_ctx";

/// Suffix of the field holding a value's ciphertext.
pub const ENCRYPTED_SUFFIX: &str = "_enc";

/// Errors produced while processing a record.
#[derive(Debug, Error)]
pub enum FieldError {
    /// The payload is not a JSON object.
    #[error("payload must be a JSON object")]
    NotAnObject,

    #[error(transparent)]
    Crypto(#[from] CryptorError),
}

/// Ordered, de-duplicated list of field names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldList(Vec<String>);

impl FieldList {
    /// Parse a comma-separated list. Whitespace around names is ignored and
    /// empty entries are dropped.
    pub fn parse(raw: &str) -> Self {
        let mut names: Vec<String> = Vec::new();
        for name in raw.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_owned());
            }
        }
        Self(names)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Applies hashing and encryption to the configured fields of a record.
#[derive(Debug, Clone)]
pub struct FieldProcessor {
    fields: FieldList,
    context_field: String,
}

impl FieldProcessor {
    pub fn new(fields: FieldList, context_field: impl Into<String>) -> Self {
        Self {
            fields,
            context_field: context_field.into(),
        }
    }

    pub fn fields(&self) -> &FieldList {
        &self.fields
    }

    /// Pseudonymise `payload` in place.
    ///
    /// All non-empty values are sealed as one batch, so a record never spans
    /// a key rotation and its single context field is always accurate.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::NotAnObject`] for non-object payloads and
    /// [`FieldError::Crypto`] when encryption fails. On error the payload is
    /// left unmodified.
    pub async fn process(
        &self,
        cryptor: &EnvelopeCryptor,
        payload: &mut Value,
    ) -> Result<(), FieldError> {
        let record = payload.as_object_mut().ok_or(FieldError::NotAnObject)?;

        let mut sealed: Vec<(&str, String)> = Vec::new();
        let mut cleared: Vec<&str> = Vec::new();
        for name in self.fields.iter() {
            if let Some(value) = field_text(record, name) {
                match value.trim() {
                    "" => cleared.push(name),
                    trimmed => sealed.push((name, trimmed.to_owned())),
                }
            }
        }

        let plaintexts: Vec<&str> = sealed.iter().map(|(_, v)| v.as_str()).collect();
        let batch = cryptor.encrypt_batch(&plaintexts).await?;

        for name in cleared {
            record.insert(format!("{name}{ENCRYPTED_SUFFIX}"), Value::String(String::new()));
            record.insert(name.to_owned(), Value::String(String::new()));
        }

        for ((name, value), ciphertext) in sealed.iter().zip(batch.ciphertexts) {
            record.insert(format!("{name}{ENCRYPTED_SUFFIX}"), Value::String(ciphertext));
            match cryptor.hash(value) {
                Some(digest) => {
                    record.insert((*name).to_owned(), Value::String(digest));
                }
                None => {
                    record.remove(*name);
                }
            }
        }

        record.insert(
            self.context_field.clone(),
            Value::String(batch.decryption_context),
        );
        Ok(())
    }
}

/// Text form of a field value, or `None` for missing, null or structured values.
fn field_text(record: &Map<String, Value>, name: &str) -> Option<String> {
    match record.get(name)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => None,
        Value::Array(_) | Value::Object(_) => {
            debug!(field = %name, "skipping non-scalar field");
            None
        }
    }
}
