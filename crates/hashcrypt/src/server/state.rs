//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::cryptor::EnvelopeCryptor;
use crate::fields::FieldProcessor;

/// Application state shared across all request handlers.
///
/// All fields are cheaply cloneable so Axum can clone the state per request.
#[derive(Clone)]
pub struct AppState {
    /// Encrypts, decrypts and hashes field values.
    pub cryptor: EnvelopeCryptor,
    /// Applies the cryptor to the configured record fields.
    pub processor: Arc<FieldProcessor>,
    /// Whether `POST /decrypt` is served.
    pub decrypt_enabled: bool,
}

impl AppState {
    /// Create a new [`AppState`].
    pub fn new(cryptor: EnvelopeCryptor, processor: FieldProcessor, decrypt_enabled: bool) -> Self {
        Self {
            cryptor,
            processor: Arc::new(processor),
            decrypt_enabled,
        }
    }
}
