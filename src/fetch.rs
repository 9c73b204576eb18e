//! Weather fetch collaborator.
//!
//! The pipeline only sees [`WeatherFetch`]. [`OpenWeatherClient`] is the
//! production implementation against the OpenWeatherMap current-weather API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::{FetchError, Observation};

// ---

/// Obtains one spot observation for a city, temperatures in Celsius.
#[async_trait]
pub trait WeatherFetch: Send + Sync {
    async fn fetch(&self, city: &str) -> Result<Observation, FetchError>;
}

/// Subset of the OpenWeatherMap `/data/2.5/weather` response we consume.
#[derive(Debug, Deserialize)]
struct OwmResponse {
    main: OwmMain,
    wind: OwmWind,
    #[serde(default)]
    weather: Vec<OwmCondition>,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
    feels_like: f64,
    temp_min: f64,
    temp_max: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct OwmWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwmCondition {
    description: String,
}

impl OwmResponse {
    fn into_observation(self) -> Result<Observation, FetchError> {
        // ---
        let status = self
            .weather
            .into_iter()
            .next()
            .map(|c| c.description)
            .ok_or_else(|| FetchError::Malformed("response has no weather conditions".to_string()))?;

        Ok(Observation {
            temperature: self.main.temp,
            temperature_max: self.main.temp_max,
            temperature_min: self.main.temp_min,
            feels_like: self.main.feels_like,
            wind_speed: self.wind.speed,
            humidity: self.main.humidity,
            status,
        })
    }
}

/// HTTP client for OpenWeatherMap. Requests metric units, so no conversion
/// is needed downstream.
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenWeatherClient {
    /// Build a client whose every request is bounded by `timeout`.
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::Network)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }
}

fn classify(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else if err.is_decode() {
        FetchError::Malformed(err.to_string())
    } else {
        FetchError::Network(err)
    }
}

#[async_trait]
impl WeatherFetch for OpenWeatherClient {
    async fn fetch(&self, city: &str) -> Result<Observation, FetchError> {
        // ---
        let url = format!("{}/data/2.5/weather", self.base_url);
        debug!(city, %url, "fetching current weather");

        let response = self
            .client
            .get(&url)
            .query(&[("q", city), ("appid", self.api_key.as_str()), ("units", "metric")])
            .send()
            .await
            .map_err(classify)?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => return Err(FetchError::UnknownCity(city.to_string())),
            StatusCode::TOO_MANY_REQUESTS => return Err(FetchError::QuotaExceeded),
            status => {
                let message = response.text().await.unwrap_or_default();
                return Err(FetchError::Rejected {
                    status: status.as_u16(),
                    message,
                });
            }
        }

        let body: OwmResponse = response.json().await.map_err(classify)?;
        body.into_observation()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn delhi_body() -> serde_json::Value {
        json!({
            "name": "Delhi",
            "weather": [{ "main": "Haze", "description": "haze" }],
            "main": {
                "temp": 36.2,
                "feels_like": 38.9,
                "temp_min": 35.1,
                "temp_max": 37.0,
                "humidity": 30
            },
            "wind": { "speed": 4.1 }
        })
    }

    async fn client_for(server: &MockServer) -> OpenWeatherClient {
        OpenWeatherClient::new(&server.uri(), "test-key", Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn fetch_parses_metric_observation() {
        // ---
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("q", "Delhi"))
            .and(query_param("appid", "test-key"))
            .and(query_param("units", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(delhi_body()))
            .mount(&server)
            .await;

        let observation = client_for(&server).await.fetch("Delhi").await.unwrap();
        assert_eq!(
            observation,
            Observation {
                temperature: 36.2,
                temperature_max: 37.0,
                temperature_min: 35.1,
                feels_like: 38.9,
                wind_speed: 4.1,
                humidity: 30.0,
                status: "haze".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn not_found_is_unknown_city() {
        // ---
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"cod": "404", "message": "city not found"})))
            .mount(&server)
            .await;

        let err = client_for(&server).await.fetch("Atlantis").await.unwrap_err();
        assert!(matches!(err, FetchError::UnknownCity(ref c) if c == "Atlantis"));
    }

    #[tokio::test]
    async fn too_many_requests_is_quota() {
        // ---
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = client_for(&server).await.fetch("Delhi").await.unwrap_err();
        assert!(matches!(err, FetchError::QuotaExceeded));
    }

    #[tokio::test]
    async fn unauthorized_is_rejected_with_status() {
        // ---
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key"))
            .mount(&server)
            .await;

        let err = client_for(&server).await.fetch("Delhi").await.unwrap_err();
        match err {
            FetchError::Rejected { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Invalid API key");
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_conditions_is_malformed() {
        // ---
        let server = MockServer::start().await;
        let mut body = delhi_body();
        body["weather"] = json!([]);
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let err = client_for(&server).await.fetch("Delhi").await.unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
    }

    #[tokio::test]
    async fn slow_response_is_timeout() {
        // ---
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(delhi_body())
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = OpenWeatherClient::new(&server.uri(), "test-key", Duration::from_millis(50)).unwrap();
        let err = client.fetch("Delhi").await.unwrap_err();
        assert!(matches!(err, FetchError::Timeout));
    }
}
