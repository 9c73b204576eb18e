//! Error types for the weather pipeline.
//!
//! The library surfaces failures as values; nothing here is fatal to the
//! process. `main.rs` and `config.rs` use `anyhow` on top of these.

use chrono::NaiveDate;
use thiserror::Error;

// ---

/// Failure reported by a [`crate::WeatherFetch`] implementation.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request did not complete within the client timeout.
    #[error("weather API request timed out")]
    Timeout,

    /// The API does not know the requested city.
    #[error("unknown city '{0}'")]
    UnknownCity(String),

    /// The API key ran out of quota.
    #[error("weather API quota exceeded")]
    QuotaExceeded,

    /// Any other non-success status.
    #[error("weather API rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Connection or transport failure.
    #[error("weather API unreachable: {0}")]
    Network(#[source] reqwest::Error),

    /// The response body could not be decoded into an observation.
    #[error("malformed weather API response: {0}")]
    Malformed(String),
}

/// One city that could not be ingested during a cycle.
#[derive(Debug, Error)]
#[error("ingestion failed for {city}: {cause}")]
pub struct IngestionFailure {
    pub city: String,
    #[source]
    pub cause: FetchError,
}

/// Failure reported by a notification collaborator.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Subscribers for a city could not be listed.
    #[error("subscriber lookup failed: {0}")]
    Directory(String),

    /// The message text could not be produced.
    #[error("message composition failed: {0}")]
    Compose(String),

    /// The transport refused or lost the message.
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// One recipient (or a whole city, when the lookup failed) that was not
/// notified during a dispatch.
#[derive(Debug, Error)]
#[error("notification for {city} failed: {cause}")]
pub struct DeliveryFailure {
    pub city: String,
    /// `None` when the subscriber lookup itself failed.
    pub recipient: Option<String>,
    #[source]
    pub cause: NotifyError,
}

/// Main error type for pipeline operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Persistence layer unavailable or a constraint was violated.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// A city failed to ingest and the caller asked for all-or-nothing.
    #[error(transparent)]
    Ingestion(#[from] IngestionFailure),

    /// Aggregation required data for a city/day that has none.
    #[error("no readings for {city} on {date}")]
    NoData { city: String, date: NaiveDate },

    /// Date arithmetic left the representable range.
    #[error("time out of range: {0}")]
    TimeOutOfRange(String),

    /// A stored row could not be mapped back into a domain value.
    #[error("corrupt row: {0}")]
    CorruptRow(String),
}

/// Convenience Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;
