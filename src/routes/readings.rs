use axum::{
    extract::Query, extract::State, response::IntoResponse, routing::get, routing::post, Json,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::ApiError;
use crate::{IngestOutcome, Pipeline, Reading, TemperatureUnit};

// ---

pub fn router() -> Router<Pipeline> {
    // ---
    Router::new()
        .route("/readings", get(list_readings))
        .route("/ingest", post(ingest))
}

/// Query parameters for listing readings
#[derive(Debug, Deserialize)]
pub struct ReadingsQuery {
    city: Option<String>,
    #[serde(default)]
    unit: TemperatureUnit,
    limit: Option<u32>,
}

#[derive(Debug, Serialize)]
struct FailedCity {
    city: String,
    cause: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
enum IngestResponse {
    Completed {
        succeeded: Vec<Reading>,
        failed: Vec<FailedCity>,
        pruned: Option<u64>,
    },
    TooSoon {
        last_observed_at: DateTime<Utc>,
    },
}

impl From<IngestOutcome> for IngestResponse {
    fn from(outcome: IngestOutcome) -> Self {
        match outcome {
            IngestOutcome::TooSoon { last_observed_at } => Self::TooSoon { last_observed_at },
            IngestOutcome::Completed(report) => Self::Completed {
                succeeded: report.succeeded,
                failed: report
                    .failed
                    .into_iter()
                    .map(|f| FailedCity {
                        city: f.city,
                        cause: f.cause.to_string(),
                    })
                    .collect(),
                pruned: report.pruned,
            },
        }
    }
}

/// Handle `POST /ingest`: run a gated ingestion cycle now.
async fn ingest(State(pipeline): State<Pipeline>) -> Result<impl IntoResponse, ApiError> {
    // ---
    info!("POST /ingest");
    let outcome = pipeline.refresh().await?;
    Ok(Json(IngestResponse::from(outcome)))
}

/// Handle `GET /readings`.
///
/// Every view refreshes first, so whichever dashboard page is open keeps the
/// store current. A failed refresh is logged and the stored data served anyway.
async fn list_readings(
    Query(params): Query<ReadingsQuery>,
    State(pipeline): State<Pipeline>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    debug!("GET /readings - {:?}", params);

    match pipeline.refresh().await {
        Ok(IngestOutcome::Completed(report)) => {
            debug!(
                succeeded = report.succeeded.len(),
                failed = report.failed.len(),
                "refreshed before listing"
            );
        }
        Ok(IngestOutcome::TooSoon { .. }) => {}
        Err(e) => error!("Refresh before listing failed: {}", e),
    }

    let readings = pipeline
        .readings()
        .list(params.city.as_deref(), params.limit.unwrap_or(1000))
        .await?;

    let converted: Vec<Reading> = readings.iter().map(|r| r.in_unit(params.unit)).collect();
    debug!("GET /readings - returning {} readings", converted.len());
    Ok(Json(converted))
}
