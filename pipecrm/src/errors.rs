use crate::db::errors::DbError;
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

/// Generic message returned for failures whose detail must stay server-side.
pub const GENERIC_FAILURE_MESSAGE: &str = "Falha ao processar solicitação.";

#[derive(ThisError, Debug)]
pub enum Error {
    /// Authentication required but not provided, or the credentials/session were rejected
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// Authenticated, but the subscription does not grant access
    #[error("Active subscription required")]
    SubscriptionRequired,

    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Caller exhausted its rate limit budget
    #[error("Rate limited for {retry_after_secs}s")]
    TooManyRequests { retry_after_secs: u64 },

    /// A required secret or integration is missing from configuration
    #[error("{what} not configured")]
    NotConfigured { what: String },

    /// A collaborating service (auth backend, email, payment provider) failed.
    /// `message` is safe to show to the caller; `operation` is only logged.
    #[error("Failed to {operation}")]
    Upstream { operation: String, message: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::SubscriptionRequired => StatusCode::PAYMENT_REQUIRED,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::NotConfigured { .. } | Error::Upstream { .. } | Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DbError::ForeignKeyViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::CheckViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "Sessão inválida.".to_string()),
            Error::SubscriptionRequired => "Assinatura ativa necessária.".to_string(),
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { resource, .. } => format!("{resource} não encontrado."),
            Error::TooManyRequests { retry_after_secs } => {
                format!("Muitas tentativas. Tente novamente em {retry_after_secs}s.")
            }
            Error::NotConfigured { what } => format!("{what} not configured"),
            Error::Upstream { message, .. } => message.clone(),
            Error::Internal { .. } => GENERIC_FAILURE_MESSAGE.to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Recurso não encontrado.".to_string(),
                DbError::UniqueViolation { table, .. } => match table.as_deref() {
                    Some("profiles") | Some("auth_credentials") => "Já existe uma conta com este e-mail.".to_string(),
                    _ => "Recurso já existe.".to_string(),
                },
                DbError::ForeignKeyViolation { .. } => "Referência inválida.".to_string(),
                DbError::CheckViolation { .. } => "Dados inválidos.".to_string(),
                DbError::Other(_) => GENERIC_FAILURE_MESSAGE.to_string(),
            },
            Error::Other(_) => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::Other(_)) | Error::Internal { .. } | Error::Upstream { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::NotConfigured { what } => {
                tracing::error!("Required configuration missing: {what}");
            }
            Error::Database(_) => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::Unauthenticated { .. } | Error::SubscriptionRequired => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::TooManyRequests { .. } => {
                tracing::info!("Rate limited: {}", self);
            }
            Error::BadRequest { .. } | Error::NotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        let body = Json(json!({ "error": self.user_message() }));

        match &self {
            Error::TooManyRequests { retry_after_secs } => {
                let mut response = (status, body).into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_secs));
                response
            }
            _ => (status, body).into_response(),
        }
    }
}

/// Convert from String errors (e.g., from external functions)
impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Internal { operation: msg }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
