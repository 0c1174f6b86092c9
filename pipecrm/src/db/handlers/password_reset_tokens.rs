//! Database repository for password reset tokens.

use std::time::Duration;

use chrono::Utc;
use sqlx::PgConnection;
use tracing::instrument;

use crate::{
    auth::password,
    db::{
        errors::Result,
        handlers::repository::Repository,
        models::password_reset_tokens::{
            PasswordResetToken, PasswordResetTokenCreateDBRequest, PasswordResetTokenFilter, PasswordResetTokenUpdateDBRequest,
        },
    },
    types::{ResetTokenId, UserId, abbrev_uuid},
};

pub struct PasswordResetTokens<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for PasswordResetTokens<'c> {
    type CreateRequest = PasswordResetTokenCreateDBRequest;
    type UpdateRequest = PasswordResetTokenUpdateDBRequest;
    type Response = PasswordResetToken;
    type Id = ResetTokenId;
    type Filter = PasswordResetTokenFilter;

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let token = sqlx::query_as::<_, PasswordResetToken>(
            r#"
            INSERT INTO password_reset_tokens (user_id, token, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, token, expires_at, used, created_at
            "#,
        )
        .bind(request.user_id)
        .bind(&request.token)
        .bind(request.expires_at)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(token)
    }

    #[instrument(skip(self), fields(token_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let token = sqlx::query_as::<_, PasswordResetToken>(
            "SELECT id, user_id, token, expires_at, used, created_at FROM password_reset_tokens WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(token)
    }

    #[instrument(skip(self, filter), fields(unused_only = filter.unused_only), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let tokens = sqlx::query_as::<_, PasswordResetToken>(
            r#"
            SELECT id, user_id, token, expires_at, used, created_at FROM password_reset_tokens
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND (NOT $2 OR used = FALSE)
            ORDER BY created_at DESC
            "#,
        )
        .bind(filter.user_id)
        .bind(filter.unused_only)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(tokens)
    }

    #[instrument(skip(self, request), fields(token_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let token = sqlx::query_as::<_, PasswordResetToken>(
            r#"
            UPDATE password_reset_tokens
            SET used = $2
            WHERE id = $1
            RETURNING id, user_id, token, expires_at, used, created_at
            "#,
        )
        .bind(id)
        .bind(request.used)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(token)
    }
}

impl<'c> PasswordResetTokens<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Issue a fresh token for a user, valid for `lifetime`.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn create_for_user(&mut self, user_id: UserId, lifetime: Duration) -> Result<PasswordResetToken> {
        let expires_at = Utc::now() + chrono::Duration::from_std(lifetime).unwrap_or(chrono::Duration::hours(1));

        self.create(&PasswordResetTokenCreateDBRequest {
            user_id,
            token: password::generate_reset_token(),
            expires_at,
        })
        .await
    }

    /// Look a token up by its raw value, whatever its state.
    #[instrument(skip_all, err)]
    pub async fn find_by_token(&mut self, token: &str) -> Result<Option<PasswordResetToken>> {
        let token = sqlx::query_as::<_, PasswordResetToken>(
            "SELECT id, user_id, token, expires_at, used, created_at FROM password_reset_tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(token)
    }

    /// Look a token up and lock its row until the surrounding transaction ends.
    #[instrument(skip_all, err)]
    pub async fn find_by_token_for_update(&mut self, token: &str) -> Result<Option<PasswordResetToken>> {
        let token = sqlx::query_as::<_, PasswordResetToken>(
            "SELECT id, user_id, token, expires_at, used, created_at FROM password_reset_tokens WHERE token = $1 FOR UPDATE",
        )
        .bind(token)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(token)
    }

    /// Mark every unused token of a user as used, returning how many were superseded.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn invalidate_for_user(&mut self, user_id: UserId) -> Result<u64> {
        let result = sqlx::query("UPDATE password_reset_tokens SET used = TRUE WHERE user_id = $1 AND used = FALSE")
            .bind(user_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn mark_used(&mut self, id: ResetTokenId) -> Result<PasswordResetToken> {
        self.update(id, &PasswordResetTokenUpdateDBRequest { used: true }).await
    }
}
