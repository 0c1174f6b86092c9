//! Database models for pipelines.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::types::{PipelineId, UserId};

#[derive(Debug, Clone, FromRow)]
pub struct Pipeline {
    pub id: PipelineId,
    pub user_id: UserId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
