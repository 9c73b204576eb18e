//! HTTP routes for the weather pipeline.
//!
//! Each sibling module exports a subrouter over the shared [`Pipeline`]
//! state; this gateway merges them and owns the error-to-response mapping.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json, Router};
use serde_json::json;
use tracing::error;

use crate::{Error, Pipeline};

mod health;
mod notifications;
mod readings;
mod summaries;
mod warnings;

// ---

pub fn router(pipeline: Pipeline) -> Router {
    // ---
    Router::new()
        .merge(readings::router())
        .merge(warnings::router())
        .merge(summaries::router())
        .merge(notifications::router())
        .merge(health::router())
        .with_state(pipeline)
}

/// Pipeline error rendered as a JSON `{ "error": ... }` body.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // ---
        let status = match &self.0 {
            Error::NoData { .. } => StatusCode::NOT_FOUND,
            Error::Ingestion(_) => StatusCode::BAD_GATEWAY,
            Error::Storage(_) | Error::CorruptRow(_) | Error::TimeOutOfRange(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }

        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
