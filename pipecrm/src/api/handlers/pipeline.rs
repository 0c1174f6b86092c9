use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::info;

use crate::{
    AppState,
    api::models::pipeline::{BoardResponse, DealCreate, DealMove, DealResponse},
    bootstrap::ensure_user_pipeline,
    db::{
        handlers::{Deals, Repository, Stages},
        models::deals::{DealCreateDBRequest, DealFilter, DealUpdateDBRequest},
    },
    errors::Error,
    subscription::ActiveSubscriber,
    types::{DealId, PipelineId, StageId, UserId, abbrev_uuid},
};

fn invalid_stage() -> Error {
    Error::BadRequest {
        message: "Etapa inválida.".to_string(),
    }
}

/// Resolve `stage_id` to a stage of the given pipeline owned by the user
async fn owned_stage(conn: &mut sqlx::PgConnection, stage_id: StageId, user_id: UserId, pipeline_id: PipelineId) -> Result<StageId, Error> {
    match Stages::new(conn).get_for_user(stage_id, user_id).await? {
        Some(stage) if stage.pipeline_id == pipeline_id => Ok(stage.id),
        _ => Err(invalid_stage()),
    }
}

/// The caller's board, created on first visit
#[utoipa::path(
    get,
    path = "/pipeline",
    tag = "pipeline",
    responses(
        (status = 200, description = "Pipeline, stages in order and deals most recently updated first", body = BoardResponse),
        (status = 401, description = "Not authenticated"),
        (status = 402, description = "No active subscription"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&subscriber.user.id)))]
pub async fn get_board(State(state): State<AppState>, subscriber: ActiveSubscriber) -> Result<Json<BoardResponse>, Error> {
    let user_id = subscriber.user.id;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let board = ensure_user_pipeline(&mut conn, user_id).await?;
    let deals = Deals::new(&mut conn).list(&DealFilter::new(user_id, board.pipeline.id)).await?;

    Ok(Json(BoardResponse::new(board, deals)))
}

/// Add a deal to the board
#[utoipa::path(
    post,
    path = "/pipeline/deals",
    tag = "pipeline",
    request_body = DealCreate,
    responses(
        (status = 201, description = "Deal created", body = DealResponse),
        (status = 400, description = "Missing title or foreign stage"),
        (status = 401, description = "Not authenticated"),
        (status = 402, description = "No active subscription"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&subscriber.user.id)))]
pub async fn create_deal(
    State(state): State<AppState>,
    subscriber: ActiveSubscriber,
    Json(request): Json<DealCreate>,
) -> Result<(StatusCode, Json<DealResponse>), Error> {
    let user_id = subscriber.user.id;
    let title = request.title.as_deref().map(str::trim).unwrap_or_default();
    if title.is_empty() {
        return Err(Error::BadRequest {
            message: "Informe o título do negócio.".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let board = ensure_user_pipeline(&mut conn, user_id).await?;

    let stage_id = match request.stage_id {
        Some(stage_id) => owned_stage(&mut conn, stage_id, user_id, board.pipeline.id).await?,
        None => board.stages.first().map(|s| s.id).ok_or_else(|| Error::Internal {
            operation: "pick default stage: pipeline has no stages".to_string(),
        })?,
    };

    let deal = Deals::new(&mut conn)
        .create(&DealCreateDBRequest {
            user_id,
            pipeline_id: board.pipeline.id,
            stage_id,
            title: title.to_string(),
            value: request.value,
        })
        .await?;

    info!(deal_id = %abbrev_uuid(&deal.id), "Deal created");
    Ok((StatusCode::CREATED, Json(deal.into())))
}

/// Move a deal to another stage
#[utoipa::path(
    patch,
    path = "/pipeline/deals/{id}",
    tag = "pipeline",
    request_body = DealMove,
    params(("id" = String, Path, description = "Deal ID")),
    responses(
        (status = 200, description = "Deal moved", body = DealResponse),
        (status = 400, description = "Foreign stage"),
        (status = 404, description = "No such deal for this user"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&subscriber.user.id), deal_id = %abbrev_uuid(&id)))]
pub async fn move_deal(
    State(state): State<AppState>,
    subscriber: ActiveSubscriber,
    Path(id): Path<DealId>,
    Json(request): Json<DealMove>,
) -> Result<Json<DealResponse>, Error> {
    let user_id = subscriber.user.id;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let deal = Deals::new(&mut conn).get_for_user(id, user_id).await?.ok_or_else(|| Error::NotFound {
        resource: "Negócio".to_string(),
        id: id.to_string(),
    })?;
    let stage_id = owned_stage(&mut conn, request.stage_id, user_id, deal.pipeline_id).await?;

    let deal = Deals::new(&mut conn).update(deal.id, &DealUpdateDBRequest { stage_id }).await?;
    Ok(Json(deal.into()))
}
