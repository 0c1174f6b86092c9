//! Lazy provisioning of a user's deal board.
//!
//! [`ensure_user_pipeline`] is safe to call on every board or dashboard request. Uniqueness on
//! `pipelines.user_id` and `stages (pipeline_id, position)` turns racing first visits into no-ops
//! instead of duplicates.

use sqlx::PgConnection;
use tracing::{debug, info, instrument};

use crate::{
    db::{
        errors::{DbError, Result},
        handlers::{Pipelines, Stages},
        models::{pipelines::Pipeline, stages::Stage},
    },
    types::{UserId, abbrev_uuid},
};

pub const DEFAULT_PIPELINE_NAME: &str = "Pipeline";

/// Stages seeded into a new pipeline, in board order.
pub const DEFAULT_STAGES: [&str; 5] = ["Novo", "Qualificação", "Proposta", "Ganho", "Perdido"];

/// A pipeline with its stages ordered by position.
#[derive(Debug, Clone)]
pub struct PipelineBoard {
    pub pipeline: Pipeline,
    pub stages: Vec<Stage>,
}

/// Return the user's pipeline and stages, creating whichever is missing.
///
/// A pipeline left without stages by an earlier partial failure gets the defaults seeded now.
#[instrument(skip(conn), fields(user_id = %abbrev_uuid(&user_id)), err)]
pub async fn ensure_user_pipeline(conn: &mut PgConnection, user_id: UserId) -> Result<PipelineBoard> {
    if Pipelines::new(&mut *conn).create_if_absent(user_id, DEFAULT_PIPELINE_NAME).await? {
        info!("Created pipeline for first-time user");
    }

    let pipeline = Pipelines::new(&mut *conn)
        .get_earliest_for_user(user_id)
        .await?
        .ok_or(DbError::NotFound)?;

    let mut stages = Stages::new(&mut *conn).list_for_pipeline(pipeline.id).await?;
    if stages.is_empty() {
        let seeded = Stages::new(&mut *conn).seed(pipeline.id, user_id, &DEFAULT_STAGES).await?;
        debug!(seeded, "Seeded default stages");
        stages = Stages::new(&mut *conn).list_for_pipeline(pipeline.id).await?;
    }

    Ok(PipelineBoard { pipeline, stages })
}
