//! Database access for pipelines.

use sqlx::PgConnection;
use tracing::instrument;

use crate::{
    db::{errors::Result, models::pipelines::Pipeline},
    types::{UserId, abbrev_uuid},
};

pub struct Pipelines<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Pipelines<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Insert a pipeline unless the user already has one. Returns whether a row was written.
    #[instrument(skip(self, name), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn create_if_absent(&mut self, user_id: UserId, name: &str) -> Result<bool> {
        let result = sqlx::query("INSERT INTO pipelines (user_id, name) VALUES ($1, $2) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .bind(name)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// The user's earliest-created pipeline
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn get_earliest_for_user(&mut self, user_id: UserId) -> Result<Option<Pipeline>> {
        let pipeline = sqlx::query_as::<_, Pipeline>(
            r#"
            SELECT id, user_id, name, created_at, updated_at FROM pipelines
            WHERE user_id = $1
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(pipeline)
    }
}
