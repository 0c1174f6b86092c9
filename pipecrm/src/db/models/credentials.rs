//! Database models for native auth credentials.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::types::UserId;

#[derive(Clone, FromRow)]
pub struct Credential {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CredentialCreateDBRequest {
    pub email: String,
    pub password_hash: String,
}
