use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use serde::Serialize;
use tracing::{debug, instrument, trace};
use utoipa::ToSchema;

use crate::{
    AppState,
    auth_providers::AuthUser,
    errors::{Error, Result},
    types::{UserId, abbrev_uuid},
};

/// Header carrying the refresh token alongside a bearer access token.
pub const REFRESH_TOKEN_HEADER: &str = "x-refresh-token";

/// The authenticated caller, resolved through the auth backend on every request.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CurrentUser {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub email: String,
}

impl From<AuthUser> for CurrentUser {
    fn from(user: AuthUser) -> Self {
        Self {
            id: user.id,
            email: user.email,
        }
    }
}

/// `Authorization: Bearer <token>`, if present and non-empty
fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ").or_else(|| value.strip_prefix("bearer "))?.trim();
    (!token.is_empty()).then_some(token)
}

fn refresh_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(REFRESH_TOKEN_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let Some(access_token) = bearer_token(parts) else {
            trace!("No bearer token on request");
            return Err(Error::Unauthenticated { message: None });
        };

        let user = state
            .auth
            .get_session_user(access_token, refresh_token(parts))
            .await
            .map_err(|e| {
                debug!("Bearer token rejected: {e}");
                Error::from(e)
            })?;

        trace!(user_id = %abbrev_uuid(&user.id), "Authenticated bearer token");
        Ok(user.into())
    }
}
