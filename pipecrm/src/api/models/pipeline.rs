//! API request/response models for the deal board.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::bootstrap::PipelineBoard;
use crate::db::models::{deals::Deal, pipelines::Pipeline, stages::Stage};
use crate::types::{DealId, PipelineId, StageId};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PipelineResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: PipelineId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<Pipeline> for PipelineResponse {
    fn from(pipeline: Pipeline) -> Self {
        Self {
            id: pipeline.id,
            name: pipeline.name,
            created_at: pipeline.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StageResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: StageId,
    pub name: String,
    pub position: i32,
}

impl From<Stage> for StageResponse {
    fn from(stage: Stage) -> Self {
        Self {
            id: stage.id,
            name: stage.name,
            position: stage.position,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DealResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: DealId,
    #[schema(value_type = String, format = "uuid")]
    pub stage_id: StageId,
    pub title: String,
    #[schema(value_type = Option<String>)]
    pub value: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Deal> for DealResponse {
    fn from(deal: Deal) -> Self {
        Self {
            id: deal.id,
            stage_id: deal.stage_id,
            title: deal.title,
            value: deal.value,
            created_at: deal.created_at,
            updated_at: deal.updated_at,
        }
    }
}

/// The whole board: pipeline, ordered stages and deals
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BoardResponse {
    pub pipeline: PipelineResponse,
    pub stages: Vec<StageResponse>,
    pub deals: Vec<DealResponse>,
}

impl BoardResponse {
    pub fn new(board: PipelineBoard, deals: Vec<Deal>) -> Self {
        Self {
            pipeline: board.pipeline.into(),
            stages: board.stages.into_iter().map(Into::into).collect(),
            deals: deals.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct DealCreate {
    pub title: Option<String>,
    #[schema(value_type = Option<String>)]
    pub value: Option<Decimal>,
    /// Defaults to the first stage of the board
    #[schema(value_type = Option<String>, format = "uuid")]
    pub stage_id: Option<StageId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DealMove {
    #[schema(value_type = String, format = "uuid")]
    pub stage_id: StageId,
}
