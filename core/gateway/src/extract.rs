//! Bearer credential extraction.

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};
use std::sync::Arc;

use mediasync_common::{Error, Password};

use crate::error::ApiError;
use crate::state::AppState;

/// Credentials recovered from a validated envelope.
///
/// Handlers that take this extractor only run for requests carrying a
/// well-formed `Authorization: Bearer` header whose envelope passed
/// signature, issuer, and expiry checks. The password exists only for the
/// duration of the request.
pub struct Credentials {
    pub username: String,
    pub password: Password,
}

impl FromRequestParts<Arc<AppState>> for Credentials {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError(Error::Authentication))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or(ApiError(Error::Authentication))?;

        let claims = state.envelopes.validate(token)?;
        let password = state.envelopes.decrypt_credential(&claims)?;

        Ok(Self {
            username: claims.username,
            password,
        })
    }
}
