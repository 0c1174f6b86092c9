//! API request/response models for authentication.
//!
//! Request fields are optional so that a missing field reaches the handler and gets the same
//! localized validation message as an empty one.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth_providers::{AuthSession, AuthUser, SignUpOutcome};

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub token: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionStatusRequest {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

/// A user together with their session. `session` is null when the account awaits email
/// confirmation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub user: AuthUser,
    pub session: Option<AuthSession>,
}

impl From<AuthSession> for AuthResponse {
    fn from(session: AuthSession) -> Self {
        Self {
            user: session.user.clone(),
            session: Some(session),
        }
    }
}

impl From<SignUpOutcome> for AuthResponse {
    fn from(outcome: SignUpOutcome) -> Self {
        Self {
            user: outcome.user,
            session: outcome.session,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OkResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl OkResponse {
    pub fn ok() -> Self {
        Self { ok: true, message: None }
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionStatusResponse {
    pub subscription_status: String,
    pub has_active_subscription: bool,
}
