// src/routes/health.rs
//! Health check endpoint for the weather pipeline.
//!
//! Besides liveness, reports how old the newest stored reading is so an
//! operator can see whether ingestion is keeping up. Touches the database
//! through the freshness gate only.

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ApiError;
use crate::Pipeline;

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    last_observed_at: Option<DateTime<Utc>>,
    ingest_due: bool,
}

/// Handle `GET /health`.
async fn health(State(pipeline): State<Pipeline>) -> Result<Json<HealthResponse>, ApiError> {
    let freshness = pipeline.gate().check().await?;

    Ok(Json(HealthResponse {
        status: "ok",
        last_observed_at: freshness.last_observed_at(),
        ingest_due: freshness.is_due(),
    }))
}

/// Create a subrouter containing the `/health` route.
pub fn router() -> Router<Pipeline> {
    Router::new().route("/health", get(health))
}
