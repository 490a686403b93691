//! Caller extraction from the `Authorization` header.

use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};

use crate::{error::AppError, services::identity, state::SharedState};

/// Authenticated caller extracted from a bearer credential.
///
/// Verification itself is delegated to the installed identity provider; the
/// routes only ever see a verified uid.
pub struct Caller {
    /// Verified user id of the caller.
    pub uid: String,
}

impl FromRequestParts<SharedState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("missing authorization header".into()))?;

        let token = header.strip_prefix("Bearer ").unwrap_or(header);
        let user = identity::authenticate(state, token)
            .await
            .map_err(AppError::from)?;

        Ok(Caller { uid: user.uid })
    }
}
