use axum::{extract::State, routing::post, Json, Router};
use serde::Serialize;
use tracing::info;

use super::ApiError;
use crate::{DispatchReport, Pipeline};

// ---

pub fn router() -> Router<Pipeline> {
    // ---
    Router::new()
        .route("/notifications/warnings", post(send_warnings))
        .route("/notifications/reports", post(send_reports))
}

#[derive(Serialize)]
struct Delivered {
    city: String,
    recipient: String,
}

#[derive(Serialize)]
struct Undelivered {
    city: String,
    recipient: Option<String>,
    cause: String,
}

#[derive(Serialize)]
struct DispatchResponse {
    delivered: Vec<Delivered>,
    failed: Vec<Undelivered>,
}

impl From<DispatchReport> for DispatchResponse {
    fn from(report: DispatchReport) -> Self {
        Self {
            delivered: report
                .delivered
                .into_iter()
                .map(|d| Delivered {
                    city: d.city,
                    recipient: d.recipient,
                })
                .collect(),
            failed: report
                .failed
                .into_iter()
                .map(|f| Undelivered {
                    city: f.city,
                    recipient: f.recipient,
                    cause: f.cause.to_string(),
                })
                .collect(),
        }
    }
}

/// Handle `POST /notifications/warnings`.
async fn send_warnings(State(pipeline): State<Pipeline>) -> Result<Json<DispatchResponse>, ApiError> {
    // ---
    info!("POST /notifications/warnings");
    let report = pipeline.dispatch_warnings().await?;
    Ok(Json(report.into()))
}

/// Handle `POST /notifications/reports`.
async fn send_reports(State(pipeline): State<Pipeline>) -> Result<Json<DispatchResponse>, ApiError> {
    // ---
    info!("POST /notifications/reports");
    let report = pipeline.dispatch_reports().await?;
    Ok(Json(report.into()))
}
