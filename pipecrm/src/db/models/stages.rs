//! Database models for pipeline stages.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::types::{PipelineId, StageId, UserId};

#[derive(Debug, Clone, FromRow)]
pub struct Stage {
    pub id: StageId,
    pub pipeline_id: PipelineId,
    pub user_id: UserId,
    pub name: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}
