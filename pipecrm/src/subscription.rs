//! Subscription state and the gate in front of protected endpoints.
//!
//! The persisted `profiles.subscription_status` mirrors the payment provider's subscription
//! status. Only `active` and `trialing` grant access. [`ActiveSubscriber`] re-reads the status
//! from the database on every request, so a webhook update takes effect on the next call.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument};

use crate::{
    AppState,
    auth::current_user::CurrentUser,
    db::{
        errors::DbError,
        handlers::{Profiles, Repository},
    },
    errors::Error,
    types::abbrev_uuid,
};

/// Provider subscription status as stored on the profile.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SubscriptionStatus {
    #[default]
    Incomplete,
    IncompleteExpired,
    Trialing,
    Active,
    PastDue,
    Canceled,
    Unpaid,
    Paused,
    /// Any value the provider may add later
    Unknown(String),
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            SubscriptionStatus::Incomplete => "incomplete",
            SubscriptionStatus::IncompleteExpired => "incomplete_expired",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Unpaid => "unpaid",
            SubscriptionStatus::Paused => "paused",
            SubscriptionStatus::Unknown(other) => other,
        }
    }

    /// Whether this status grants access to protected endpoints
    pub fn is_active(&self) -> bool {
        matches!(self, SubscriptionStatus::Active | SubscriptionStatus::Trialing)
    }
}

impl From<&str> for SubscriptionStatus {
    fn from(value: &str) -> Self {
        match value {
            "incomplete" => SubscriptionStatus::Incomplete,
            "incomplete_expired" => SubscriptionStatus::IncompleteExpired,
            "trialing" => SubscriptionStatus::Trialing,
            "active" => SubscriptionStatus::Active,
            "past_due" => SubscriptionStatus::PastDue,
            "canceled" => SubscriptionStatus::Canceled,
            "unpaid" => SubscriptionStatus::Unpaid,
            "paused" => SubscriptionStatus::Paused,
            other => SubscriptionStatus::Unknown(other.to_string()),
        }
    }
}

impl From<String> for SubscriptionStatus {
    fn from(value: String) -> Self {
        SubscriptionStatus::from(value.as_str())
    }
}

impl From<SubscriptionStatus> for String {
    fn from(status: SubscriptionStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `true` iff `status` is `active` or `trialing`. Unrecognised values are inactive.
pub fn is_active(status: &str) -> bool {
    SubscriptionStatus::from(status).is_active()
}

/// Why the gate turned a request away. Each rejection names where the client should go next.
#[derive(Debug)]
pub enum GateRejection {
    /// No valid session; send the client to the login page
    Unauthenticated { redirect: String },
    /// Signed in without an active subscription; send the client to plan selection
    Inactive { redirect: String },
    /// The check itself failed
    Failed(Error),
}

impl IntoResponse for GateRejection {
    fn into_response(self) -> Response {
        match self {
            GateRejection::Unauthenticated { redirect } => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Sessão inválida.", "redirect": redirect })),
            )
                .into_response(),
            GateRejection::Inactive { redirect } => (
                StatusCode::PAYMENT_REQUIRED,
                Json(json!({ "error": Error::SubscriptionRequired.user_message(), "redirect": redirect })),
            )
                .into_response(),
            GateRejection::Failed(error) => error.into_response(),
        }
    }
}

/// A caller with a valid session and an active subscription.
#[derive(Debug, Clone)]
pub struct ActiveSubscriber {
    pub user: CurrentUser,
    pub status: SubscriptionStatus,
}

impl FromRequestParts<AppState> for ActiveSubscriber {
    type Rejection = GateRejection;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await.map_err(|e| match e {
            Error::Unauthenticated { .. } => GateRejection::Unauthenticated {
                redirect: state.config.gate.login_path.clone(),
            },
            other => GateRejection::Failed(other),
        })?;

        let mut conn = state
            .db
            .acquire()
            .await
            .map_err(|e| GateRejection::Failed(DbError::from(e).into()))?;
        let profile = Profiles::new(&mut conn)
            .get_by_id(user.id)
            .await
            .map_err(|e| GateRejection::Failed(e.into()))?;

        // No profile yet means checkout never completed
        let status = profile.map(|p| p.status()).unwrap_or_default();
        if !status.is_active() {
            debug!(user_id = %abbrev_uuid(&user.id), %status, "Subscription gate denied access");
            return Err(GateRejection::Inactive {
                redirect: state.config.gate.plans_path.clone(),
            });
        }

        Ok(Self { user, status })
    }
}
