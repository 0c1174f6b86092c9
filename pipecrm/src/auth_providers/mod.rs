//! Auth backend abstraction layer
//!
//! This module defines the `AuthProvider` trait, which owns everything credential related:
//! password hashing, session issuance and session validation. The rest of the service only sees
//! [`AuthUser`] and [`AuthSession`] values.
//!
//! Two backends exist:
//! - [`supabase::SupabaseProvider`] talks to a hosted GoTrue auth API over HTTP
//! - [`native::NativeProvider`] keeps argon2 hashes in Postgres and issues JWT access tokens

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use utoipa::ToSchema;

use crate::{
    config::{AuthProviderConfig, Config},
    db::errors::DbError,
    errors::Error,
    types::UserId,
};

pub mod native;
pub mod supabase;

/// Create an auth provider from configuration
///
/// This is the single point where we convert config into provider instances.
pub fn create_provider(config: &Config, db: PgPool) -> anyhow::Result<Arc<dyn AuthProvider>> {
    match &config.auth.provider {
        AuthProviderConfig::Native => {
            let secret_key = config
                .secret_key
                .clone()
                .ok_or_else(|| anyhow::anyhow!("secret_key is required by the native auth provider"))?;
            Ok(Arc::new(native::NativeProvider::new(
                db,
                secret_key,
                config.auth.native.session_duration,
            )))
        }
        AuthProviderConfig::Supabase(supabase_config) => Ok(Arc::new(supabase::SupabaseProvider::new(supabase_config.clone())?)),
    }
}

/// Result type for auth provider operations
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur while talking to the auth backend
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("Sign-up rejected: {0}")]
    SignUpRejected(String),

    #[error("Invalid or expired session")]
    InvalidSession,

    #[error("Auth backend error: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl From<AuthError> for Error {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => Error::Unauthenticated {
                message: Some("Email ou senha incorretos.".to_string()),
            },
            AuthError::SignUpRejected(_) => Error::BadRequest {
                message: "Não foi possível criar a conta. Verifique os dados e tente novamente.".to_string(),
            },
            AuthError::InvalidSession => Error::Unauthenticated {
                message: Some("Invalid session".to_string()),
            },
            AuthError::Upstream(operation) => Error::Upstream {
                operation: format!("call auth backend: {operation}"),
                message: crate::errors::GENERIC_FAILURE_MESSAGE.to_string(),
            },
            AuthError::Database(e) => Error::Database(e),
        }
    }
}

/// A user as known to the auth backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AuthUser {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// An issued session
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    /// Access token expiry as a unix timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

/// Result of a sign-up. `session` is `None` when the backend holds the account until the email
/// address is confirmed.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub user: AuthUser,
    pub session: Option<AuthSession>,
}

/// Abstract auth backend interface
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Create an account with an email and password
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome>;

    /// Exchange an email and password for a session
    ///
    /// Unknown emails and wrong passwords both yield [`AuthError::InvalidCredentials`].
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession>;

    /// Resolve the user behind an access token
    ///
    /// When the access token is rejected and a refresh token is supplied, the backend may use it
    /// to recover the session. Returns [`AuthError::InvalidSession`] when neither works.
    async fn get_session_user(&self, access_token: &str, refresh_token: Option<&str>) -> Result<AuthUser>;

    /// Replace a user's password with privileged (service) credentials
    async fn admin_update_password(&self, user_id: UserId, password: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_auth_error_maps_to_http_errors() {
        let err: Error = AuthError::InvalidCredentials.into();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.user_message(), "Email ou senha incorretos.");

        let err: Error = AuthError::InvalidSession.into();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.user_message(), "Invalid session");

        let err: Error = AuthError::SignUpRejected("User already registered".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.user_message().contains("already registered"));

        let err: Error = AuthError::Upstream("connection refused".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.user_message().contains("refused"));
    }

    #[test]
    fn test_session_deserializes_from_backend_payload() {
        let payload = serde_json::json!({
            "access_token": "at",
            "refresh_token": "rt",
            "token_type": "bearer",
            "expires_in": 3600,
            "expires_at": 1_700_000_000,
            "user": {
                "id": "6f1c2a4e-2b1d-4e4f-9a51-0c3c1b2a9d10",
                "email": "a@b.com",
                "aud": "authenticated",
                "role": "authenticated",
                "created_at": "2024-01-01T00:00:00Z"
            }
        });

        let session: AuthSession = serde_json::from_value(payload).unwrap();
        assert_eq!(session.user.email, "a@b.com");
        assert_eq!(session.expires_at, Some(1_700_000_000));
        assert!(session.user.created_at.is_some());
    }
}
