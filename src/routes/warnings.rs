use axum::{extract::Path, extract::State, routing::get, Json, Router};
use serde::Serialize;

use super::ApiError;
use crate::Pipeline;

// ---

pub fn router() -> Router<Pipeline> {
    Router::new().route("/cities/{city}/warning", get(warning))
}

#[derive(Serialize)]
struct WarningResponse {
    city: String,
    warning: bool,
    threshold_c: f64,
}

/// Handle `GET /cities/{city}/warning`.
async fn warning(
    Path(city): Path<String>,
    State(pipeline): State<Pipeline>,
) -> Result<Json<WarningResponse>, ApiError> {
    // ---
    let detector = pipeline.warnings();
    let warning = detector.is_warning(&city).await?;

    Ok(Json(WarningResponse {
        city,
        warning,
        threshold_c: detector.threshold_c(),
    }))
}
