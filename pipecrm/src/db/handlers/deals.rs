//! Database repository for deals.

use sqlx::PgConnection;
use tracing::instrument;

use crate::{
    db::{
        errors::Result,
        handlers::repository::Repository,
        models::deals::{Deal, DealCreateDBRequest, DealFilter, DealUpdateDBRequest},
    },
    types::{DealId, UserId, abbrev_uuid},
};

pub struct Deals<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Deals<'c> {
    type CreateRequest = DealCreateDBRequest;
    type UpdateRequest = DealUpdateDBRequest;
    type Response = Deal;
    type Id = DealId;
    type Filter = DealFilter;

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let deal = sqlx::query_as::<_, Deal>(
            r#"
            INSERT INTO deals (user_id, pipeline_id, stage_id, title, value)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, pipeline_id, stage_id, title, value, created_at, updated_at
            "#,
        )
        .bind(request.user_id)
        .bind(request.pipeline_id)
        .bind(request.stage_id)
        .bind(&request.title)
        .bind(request.value)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(deal)
    }

    #[instrument(skip(self), fields(deal_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let deal = sqlx::query_as::<_, Deal>(
            "SELECT id, user_id, pipeline_id, stage_id, title, value, created_at, updated_at FROM deals WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(deal)
    }

    #[instrument(skip(self, filter), fields(user_id = %abbrev_uuid(&filter.user_id), limit = filter.limit), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let deals = sqlx::query_as::<_, Deal>(
            r#"
            SELECT id, user_id, pipeline_id, stage_id, title, value, created_at, updated_at FROM deals
            WHERE user_id = $1 AND pipeline_id = $2
            ORDER BY updated_at DESC
            LIMIT $3
            "#,
        )
        .bind(filter.user_id)
        .bind(filter.pipeline_id)
        .bind(filter.limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(deals)
    }

    #[instrument(skip(self, request), fields(deal_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let deal = sqlx::query_as::<_, Deal>(
            r#"
            UPDATE deals
            SET stage_id = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, user_id, pipeline_id, stage_id, title, value, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(request.stage_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(deal)
    }
}

impl<'c> Deals<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// A deal, only if it belongs to the user
    #[instrument(skip(self), fields(deal_id = %abbrev_uuid(&id), user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn get_for_user(&mut self, id: DealId, user_id: UserId) -> Result<Option<Deal>> {
        let deal = sqlx::query_as::<_, Deal>(
            r#"
            SELECT id, user_id, pipeline_id, stage_id, title, value, created_at, updated_at FROM deals
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(deal)
    }
}
