//! Fan-out of heat warnings and daily reports to subscribed users.
//!
//! Three collaborators sit behind trait objects: [`SubscriberDirectory`]
//! says who follows a city, [`ReportComposer`] writes the text and
//! [`Notifier`] delivers it. [`Notifications::local`] wires the built-in
//! versions: the `subscribers` table, plain-text templates and a
//! transport that writes each message to the log.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::{DailySummary, DeliveryFailure, NotifyError};

// ---

pub const WARNING_SUBJECT: &str = "Weather Warning";
pub const REPORT_SUBJECT: &str = "Weather Report";

/// A user subscribed to one city.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Subscriber {
    pub name: String,
    pub email: String,
}

/// Read-only view of who is subscribed to which city.
#[async_trait]
pub trait SubscriberDirectory: Send + Sync {
    async fn subscribers_for(&self, city: &str) -> Result<Vec<Subscriber>, NotifyError>;
}

/// Turns a warning or a summary into message text for one user.
#[async_trait]
pub trait ReportComposer: Send + Sync {
    async fn compose_warning(&self, user: &str, city: &str, threshold_c: f64) -> Result<String, NotifyError>;

    async fn compose_summary(&self, user: &str, summary: &DailySummary) -> Result<String, NotifyError>;
}

/// Delivers one message to one recipient address.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, subject: &str, body: &str, recipient: &str) -> Result<(), NotifyError>;
}

/// One message handed to the notifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub city: String,
    pub recipient: String,
}

/// What one dispatch did.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub delivered: Vec<Delivery>,
    pub failed: Vec<DeliveryFailure>,
}

impl DispatchReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

enum Message<'a> {
    Warning { city: &'a str, threshold_c: f64 },
    Summary(&'a DailySummary),
}

impl Message<'_> {
    fn city(&self) -> &str {
        match self {
            Message::Warning { city, .. } => city,
            Message::Summary(summary) => &summary.city,
        }
    }

    fn subject(&self) -> &'static str {
        match self {
            Message::Warning { .. } => WARNING_SUBJECT,
            Message::Summary(_) => REPORT_SUBJECT,
        }
    }
}

/// The three notification collaborators, cheap to clone.
#[derive(Clone)]
pub struct Notifications {
    directory: Arc<dyn SubscriberDirectory>,
    composer: Arc<dyn ReportComposer>,
    notifier: Arc<dyn Notifier>,
}

impl Notifications {
    pub fn new(
        directory: Arc<dyn SubscriberDirectory>,
        composer: Arc<dyn ReportComposer>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            directory,
            composer,
            notifier,
        }
    }

    /// Subscribers from `pool`, template text, log transport.
    pub fn local(pool: SqlitePool) -> Self {
        Self::new(
            Arc::new(SqliteSubscriberDirectory::new(pool)),
            Arc::new(TemplateComposer),
            Arc::new(LogNotifier),
        )
    }

    /// Warn every subscriber of `city`.
    pub async fn warn_subscribers(&self, city: &str, threshold_c: f64, report: &mut DispatchReport) {
        self.fan_out(Message::Warning { city, threshold_c }, report).await
    }

    /// Send `summary` to every subscriber of its city.
    pub async fn send_report(&self, summary: &DailySummary, report: &mut DispatchReport) {
        self.fan_out(Message::Summary(summary), report).await
    }

    async fn fan_out(&self, message: Message<'_>, report: &mut DispatchReport) {
        // ---
        let city = message.city();
        let subscribers = match self.directory.subscribers_for(city).await {
            Ok(subscribers) => subscribers,
            Err(cause) => {
                warn!(city, error = %cause, "subscriber lookup failed");
                report.failed.push(DeliveryFailure {
                    city: city.to_string(),
                    recipient: None,
                    cause,
                });
                return;
            }
        };
        debug!(city, subscribers = subscribers.len(), subject = message.subject(), "fanning out");

        for subscriber in subscribers {
            let body = match &message {
                Message::Warning { threshold_c, .. } => {
                    self.composer.compose_warning(&subscriber.name, city, *threshold_c).await
                }
                Message::Summary(summary) => self.composer.compose_summary(&subscriber.name, summary).await,
            };
            let sent = match body {
                Ok(body) => self.notifier.send(message.subject(), &body, &subscriber.email).await,
                Err(e) => Err(e),
            };

            match sent {
                Ok(()) => report.delivered.push(Delivery {
                    city: city.to_string(),
                    recipient: subscriber.email,
                }),
                Err(cause) => {
                    warn!(city, recipient = %subscriber.email, error = %cause, "notification failed");
                    report.failed.push(DeliveryFailure {
                        city: city.to_string(),
                        recipient: Some(subscriber.email),
                        cause,
                    });
                }
            }
        }
    }
}

/// Subscribers stored in the `subscribers` table.
#[derive(Debug, Clone)]
pub struct SqliteSubscriberDirectory {
    pool: SqlitePool,
}

impl SqliteSubscriberDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriberDirectory for SqliteSubscriberDirectory {
    async fn subscribers_for(&self, city: &str) -> Result<Vec<Subscriber>, NotifyError> {
        sqlx::query_as("SELECT name, email FROM subscribers WHERE city = ? ORDER BY id")
            .bind(city)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| NotifyError::Directory(e.to_string()))
    }
}

/// Fixed plain-text messages.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateComposer;

#[async_trait]
impl ReportComposer for TemplateComposer {
    async fn compose_warning(&self, user: &str, city: &str, threshold_c: f64) -> Result<String, NotifyError> {
        Ok(format!(
            "Hi {user}, the last two readings in {city} were above {threshold_c:.1} °C. \
             Stay hydrated and avoid the midday sun."
        ))
    }

    async fn compose_summary(&self, user: &str, summary: &DailySummary) -> Result<String, NotifyError> {
        Ok(format!(
            "Hi {user}, here is the weather in {} for {}: mostly {}, \
             average {:.1} °C, high {:.1} °C, low {:.1} °C.",
            summary.city,
            summary.date,
            summary.dominant_weather.to_lowercase(),
            summary.avg_temp,
            summary.max_temp,
            summary.min_temp,
        ))
    }
}

/// Writes each message to the log instead of sending it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, subject: &str, body: &str, recipient: &str) -> Result<(), NotifyError> {
        info!(%recipient, %subject, %body, "notification");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::test_support::{setup_pool, RecordingComposer, RecordingNotifier, StubDirectory};
    use chrono::NaiveDate;

    fn summary(city: &str) -> DailySummary {
        DailySummary {
            city: city.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 5, 20).unwrap(),
            min_temp: 29.5,
            max_temp: 38.5,
            avg_temp: 34.0,
            dominant_weather: "Haze".to_string(),
            reading_count: 12,
        }
    }

    #[tokio::test]
    async fn sqlite_directory_lists_subscribers_of_one_city() {
        // ---
        let pool = setup_pool().await;
        for (name, email, city) in [
            ("Asha", "asha@example.com", "Delhi"),
            ("Ravi", "ravi@example.com", "Mumbai"),
            ("Meera", "meera@example.com", "Delhi"),
        ] {
            sqlx::query("INSERT INTO subscribers (name, email, city) VALUES (?, ?, ?)")
                .bind(name)
                .bind(email)
                .bind(city)
                .execute(&pool)
                .await
                .unwrap();
        }

        let directory = SqliteSubscriberDirectory::new(pool);
        let delhi = directory.subscribers_for("Delhi").await.unwrap();

        let emails: Vec<&str> = delhi.iter().map(|s| s.email.as_str()).collect();
        assert_eq!(emails, vec!["asha@example.com", "meera@example.com"]);
        assert!(directory.subscribers_for("Chennai").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn summary_is_composed_from_the_summary_fields() {
        // ---
        let text = TemplateComposer.compose_summary("Asha", &summary("Delhi")).await.unwrap();

        assert!(text.starts_with("Hi Asha"));
        assert!(text.contains("Delhi"));
        assert!(text.contains("2025-05-20"));
        assert!(text.contains("mostly haze"));
        assert!(text.contains("high 38.5 °C"));
        assert!(text.contains("low 29.5 °C"));
    }

    #[tokio::test]
    async fn every_subscriber_receives_the_report() {
        // ---
        let directory = StubDirectory::with(&[("Delhi", "Asha", "asha@example.com"), ("Delhi", "Meera", "meera@example.com")]);
        let composer = Arc::new(RecordingComposer::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let notifications = Notifications::new(Arc::new(directory), composer.clone(), notifier.clone());

        let mut report = DispatchReport::default();
        notifications.send_report(&summary("Delhi"), &mut report).await;

        assert!(report.is_complete());
        assert_eq!(report.delivered.len(), 2);
        assert_eq!(composer.summaries(), vec![("Asha".to_string(), summary("Delhi")), ("Meera".to_string(), summary("Delhi"))]);

        let sent = notifier.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|(subject, _, _)| subject == REPORT_SUBJECT));
        assert_eq!(sent[1].2, "meera@example.com");
    }

    #[tokio::test]
    async fn one_failed_recipient_does_not_stop_the_rest() {
        // ---
        let directory = StubDirectory::with(&[
            ("Delhi", "Asha", "asha@example.com"),
            ("Delhi", "Bounce", "bounce@example.com"),
            ("Delhi", "Meera", "meera@example.com"),
        ]);
        let notifier = Arc::new(RecordingNotifier::rejecting("bounce@example.com"));
        let notifications = Notifications::new(Arc::new(directory), Arc::new(TemplateComposer), notifier.clone());

        let mut report = DispatchReport::default();
        notifications.warn_subscribers("Delhi", 35.0, &mut report).await;

        let delivered: Vec<&str> = report.delivered.iter().map(|d| d.recipient.as_str()).collect();
        assert_eq!(delivered, vec!["asha@example.com", "meera@example.com"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].recipient.as_deref(), Some("bounce@example.com"));
        assert!(matches!(report.failed[0].cause, NotifyError::Delivery(_)));
        assert!(notifier.sent().iter().all(|(subject, _, _)| subject == WARNING_SUBJECT));
    }

    #[tokio::test]
    async fn lookup_failure_is_reported_for_the_city() {
        // ---
        let notifier = Arc::new(RecordingNotifier::default());
        let notifications = Notifications::new(
            Arc::new(StubDirectory::failing()),
            Arc::new(TemplateComposer),
            notifier.clone(),
        );

        let mut report = DispatchReport::default();
        notifications.warn_subscribers("Delhi", 35.0, &mut report).await;

        assert!(report.delivered.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].city, "Delhi");
        assert_eq!(report.failed[0].recipient, None);
        assert!(notifier.sent().is_empty());
    }
}
