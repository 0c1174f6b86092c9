use axum::{Json, extract::State};

use crate::{
    AppState,
    api::models::dashboard::DashboardResponse,
    bootstrap::ensure_user_pipeline,
    db::{
        handlers::{Deals, Repository},
        models::deals::DealFilter,
    },
    errors::Error,
    subscription::ActiveSubscriber,
    types::abbrev_uuid,
};

/// Number of most recently updated deals the dashboard summarizes
const SUMMARY_WINDOW: i64 = 50;

/// Deal totals for the caller's board
#[utoipa::path(
    get,
    path = "/dashboard",
    tag = "pipeline",
    responses(
        (status = 200, description = "Totals over the most recently updated deals", body = DashboardResponse),
        (status = 401, description = "Not authenticated"),
        (status = 402, description = "No active subscription"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&subscriber.user.id)))]
pub async fn get_dashboard(State(state): State<AppState>, subscriber: ActiveSubscriber) -> Result<Json<DashboardResponse>, Error> {
    let user_id = subscriber.user.id;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let board = ensure_user_pipeline(&mut conn, user_id).await?;
    let deals = Deals::new(&mut conn)
        .list(&DealFilter::new(user_id, board.pipeline.id).with_limit(SUMMARY_WINDOW))
        .await?;

    Ok(Json(DashboardResponse::summarize(deals)))
}
