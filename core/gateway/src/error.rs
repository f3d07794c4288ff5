//! HTTP error mapping.
//!
//! [`ApiError`] wraps the common error type and implements
//! [`axum::response::IntoResponse`] so handlers can return
//! `Result<…, ApiError>` directly. Credential failures — including
//! decryption failures — are reported to the client as a single uniform
//! authentication error.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use mediasync_common::Error;

/// Error wrapper carrying the HTTP mapping.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Authentication | Error::Decryption => StatusCode::UNAUTHORIZED,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::AlreadyExists(_) => StatusCode::CONFLICT,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::PoolClosed => StatusCode::SERVICE_UNAVAILABLE,
            Error::Connect(_) | Error::Backend(_) => StatusCode::BAD_GATEWAY,
            Error::Config(_) | Error::Serialization(_) | Error::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        // A decryption failure means a tampered envelope; the client sees
        // the same message as any other rejected credential.
        let message = match &self.0 {
            Error::Authentication | Error::Decryption => "authentication failed".to_string(),
            other => other.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(%status, error = %self.0, "request failed");
        } else {
            tracing::debug!(%status, error = %self.0, "request rejected");
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}
