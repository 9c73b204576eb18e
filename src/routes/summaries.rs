use axum::{
    extract::Path, extract::Query, extract::State, routing::get, routing::post, Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::ApiError;
use crate::{DailySummary, Pipeline, TemperatureUnit};

// ---

pub fn router() -> Router<Pipeline> {
    // ---
    Router::new()
        .route("/cities/{city}/summary/today", get(today))
        .route("/summaries", get(list_summaries))
        .route("/summaries/rollup", post(rollup))
}

#[derive(Debug, Deserialize)]
pub struct TodayQuery {
    #[serde(default)]
    unit: TemperatureUnit,
    /// Answer 404 instead of the "Unknown" sentinel when there are no readings.
    #[serde(default)]
    require: bool,
}

#[derive(Debug, Deserialize)]
pub struct SummariesQuery {
    city: Option<String>,
    #[serde(default)]
    unit: TemperatureUnit,
}

#[derive(Serialize)]
struct RollupResponse {
    rows: usize,
}

/// Handle `GET /cities/{city}/summary/today`. Persists the row when there is data.
async fn today(
    Path(city): Path<String>,
    Query(params): Query<TodayQuery>,
    State(pipeline): State<Pipeline>,
) -> Result<Json<DailySummary>, ApiError> {
    let summary = if params.require {
        pipeline.require_report_today(&city).await?
    } else {
        pipeline.report_today(&city).await?
    };
    Ok(Json(summary.in_unit(params.unit)))
}

/// Handle `POST /summaries/rollup`.
async fn rollup(State(pipeline): State<Pipeline>) -> Result<Json<RollupResponse>, ApiError> {
    // ---
    info!("POST /summaries/rollup");
    let rows = pipeline.aggregator().rollup_all().await?;
    Ok(Json(RollupResponse { rows }))
}

/// Handle `GET /summaries`.
async fn list_summaries(
    Query(params): Query<SummariesQuery>,
    State(pipeline): State<Pipeline>,
) -> Result<Json<Vec<DailySummary>>, ApiError> {
    // ---
    let summaries = pipeline.summaries().list(params.city.as_deref()).await?;
    Ok(Json(
        summaries.iter().map(|s| s.in_unit(params.unit)).collect(),
    ))
}
