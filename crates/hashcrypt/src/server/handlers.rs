//! Axum request handlers for all service endpoints.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::protocol::{
    DecryptRequest, DecryptResponse, ErrorResponse, HashCryptRequest, HashCryptResponse,
    HealthResponse, RotateResponse,
};
use common::ServiceError;
use tracing::warn;

use super::state::AppState;
use crate::cryptor::CryptorError;
use crate::dek::DekError;
use crate::fields::FieldError;

/// `POST /hashcrypt` — pseudonymise the configured fields of a record.
pub async fn hashcrypt(
    State(state): State<AppState>,
    Json(req): Json<HashCryptRequest>,
) -> Response {
    let mut payload = req.payload;
    if let Err(e) = state.processor.process(&state.cryptor, &mut payload).await {
        return error_response(&field_error(e));
    }
    (StatusCode::OK, Json(HashCryptResponse { payload })).into_response()
}

/// `POST /decrypt` — open a ciphertext produced under the active data key.
///
/// Answers 404 unless enabled in configuration, whatever the body holds.
pub async fn decrypt(
    State(state): State<AppState>,
    body: Result<Json<DecryptRequest>, JsonRejection>,
) -> Response {
    if !state.decrypt_enabled {
        return not_found().await.into_response();
    }
    let Json(req) = match body {
        Ok(req) => req,
        Err(rejection) => return rejection.into_response(),
    };
    match state.cryptor.decrypt_from_text(&req.ciphertext).await {
        Ok(plaintext) => (StatusCode::OK, Json(DecryptResponse { plaintext })).into_response(),
        Err(e) => error_response(&cryptor_error(e)),
    }
}

/// `POST /rotate` — replace the data key now.
pub async fn rotate(State(state): State<AppState>) -> Response {
    match state.cryptor.keys().rotate().await {
        Ok(decryption_context) => {
            (StatusCode::OK, Json(RotateResponse { decryption_context })).into_response()
        }
        Err(e) => error_response(&dek_error(e)),
    }
}

/// `GET /health` — liveness and key readiness.
///
/// Returns `503 Service Unavailable` while the last rotation attempt has failed.
pub async fn health(State(state): State<AppState>) -> Response {
    let status = state.cryptor.keys().status().await;
    let key_ready = !status.last_rotation_failed;

    let (status_code, status_str) = if key_ready {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    let body = HealthResponse {
        status: status_str.into(),
        key_ready,
        key_uses: status.uses,
        rotation_period: status.period,
        fields_configured: state.processor.fields().len(),
    };
    (status_code, Json(body)).into_response()
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    let err = ErrorResponse::new("not_found", "the requested resource does not exist");
    (StatusCode::NOT_FOUND, Json(err))
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

fn error_response(err: &ServiceError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorResponse::from(err))).into_response()
}

fn field_error(e: FieldError) -> ServiceError {
    match e {
        FieldError::NotAnObject => ServiceError::BadRequest(e.to_string()),
        FieldError::Crypto(inner) => cryptor_error(inner),
    }
}

fn cryptor_error(e: CryptorError) -> ServiceError {
    if e.is_decryption() {
        return ServiceError::BadRequest(e.to_string());
    }
    match e {
        CryptorError::Key(inner) => dek_error(inner),
        other => {
            warn!(error = %other, "encryption failed");
            ServiceError::CryptoFailure("encryption failed".into())
        }
    }
}

fn dek_error(e: DekError) -> ServiceError {
    match e {
        DekError::KeyAcquisition { .. } => {
            warn!(error = %e, "data key unavailable");
            ServiceError::Unavailable("data key unavailable".into())
        }
        DekError::BatchExceedsPeriod { .. } => ServiceError::BadRequest(e.to_string()),
        other => {
            warn!(error = %other, "data key error");
            ServiceError::Internal("data key error".into())
        }
    }
}
