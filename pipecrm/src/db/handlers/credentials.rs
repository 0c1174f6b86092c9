//! Database access for native auth credentials.

use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    db::{
        errors::Result,
        models::credentials::{Credential, CredentialCreateDBRequest},
    },
    types::{UserId, abbrev_uuid},
};

pub struct Credentials<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Credentials<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Store a new credential. The email is lowercased; a duplicate surfaces as
    /// [`DbError::UniqueViolation`](crate::db::errors::DbError::UniqueViolation).
    #[instrument(skip_all, err)]
    pub async fn create(&mut self, request: &CredentialCreateDBRequest) -> Result<Credential> {
        let credential = sqlx::query_as::<_, Credential>(
            r#"
            INSERT INTO auth_credentials (id, email, password_hash)
            VALUES ($1, LOWER($2), $3)
            RETURNING id, email, password_hash, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.email)
        .bind(&request.password_hash)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(credential)
    }

    #[instrument(skip_all, err)]
    pub async fn get_by_email(&mut self, email: &str) -> Result<Option<Credential>> {
        let credential = sqlx::query_as::<_, Credential>(
            "SELECT id, email, password_hash, created_at, updated_at FROM auth_credentials WHERE LOWER(email) = LOWER($1)",
        )
        .bind(email)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(credential)
    }

    /// Replace the stored hash. Returns false when the user has no credential.
    #[instrument(skip(self, password_hash), fields(user_id = %abbrev_uuid(&id)), err)]
    pub async fn update_password_hash(&mut self, id: UserId, password_hash: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE auth_credentials SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
