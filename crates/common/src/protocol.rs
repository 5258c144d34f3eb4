//! Request and response types of the public HTTP API.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Hashcrypt endpoint
// ---------------------------------------------------------------------------

/// Request body for `POST /hashcrypt`.
///
/// `payload` is a flat JSON record. Every configured field is replaced with
/// its salted hash and gains a `<field>_enc` sibling holding the ciphertext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashCryptRequest {
    /// JSON object whose configured fields are pseudonymised.
    pub payload: serde_json::Value,
}

/// Successful response body for `POST /hashcrypt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashCryptResponse {
    /// Transformed record, including the decryption context field.
    pub payload: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Decrypt endpoint
// ---------------------------------------------------------------------------

/// Request body for `POST /decrypt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptRequest {
    /// Base64 envelope produced by `POST /hashcrypt` under the active key.
    pub ciphertext: String,
}

/// Successful response body for `POST /decrypt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptResponse {
    /// Recovered UTF-8 value.
    pub plaintext: String,
}

// ---------------------------------------------------------------------------
// Rotate endpoint
// ---------------------------------------------------------------------------

/// Response body for `POST /rotate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotateResponse {
    /// Decryption context of the freshly acquired data key.
    pub decryption_context: String,
}

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

/// Standard error response body returned on any non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable error code (e.g. `"bad_request"`).
    pub code: String,
    /// Human-readable description safe to expose to callers.
    pub message: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<&crate::ServiceError> for ErrorResponse {
    fn from(err: &crate::ServiceError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall service status: `"ok"` or `"degraded"`.
    pub status: String,
    /// `false` when the most recent data key rotation failed.
    pub key_ready: bool,
    /// Encryptions performed under the current data key.
    pub key_uses: u64,
    /// Maximum encryptions allowed per data key.
    pub rotation_period: u64,
    /// Number of record fields the service pseudonymises.
    pub fields_configured: usize,
}
