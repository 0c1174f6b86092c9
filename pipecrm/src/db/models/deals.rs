//! Database models for deals.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

use crate::types::{DealId, PipelineId, StageId, UserId};

/// Database entity model
#[derive(Debug, Clone, FromRow)]
pub struct Deal {
    pub id: DealId,
    pub user_id: UserId,
    pub pipeline_id: PipelineId,
    pub stage_id: StageId,
    pub title: String,
    pub value: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct DealCreateDBRequest {
    pub user_id: UserId,
    pub pipeline_id: PipelineId,
    pub stage_id: StageId,
    pub title: String,
    pub value: Option<Decimal>,
}

/// Moving a deal is the only mutation the board performs.
#[derive(Debug, Clone)]
pub struct DealUpdateDBRequest {
    pub stage_id: StageId,
}

/// Filter for listing a user's deals, most recently updated first
#[derive(Debug, Clone)]
pub struct DealFilter {
    pub user_id: UserId,
    pub pipeline_id: PipelineId,
    pub limit: Option<i64>,
}

impl DealFilter {
    pub fn new(user_id: UserId, pipeline_id: PipelineId) -> Self {
        Self {
            user_id,
            pipeline_id,
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}
