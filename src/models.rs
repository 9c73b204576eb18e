//! Data models for the weather pipeline.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ---

/// Status recorded for a city/day with no readings.
pub const UNKNOWN_STATUS: &str = "Unknown";

/// Spot observation returned by the weather fetch collaborator.
///
/// Temperatures are already in Celsius, wind speed in m/s and humidity
/// in percent.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    // ---
    pub temperature: f64,
    pub temperature_max: f64,
    pub temperature_min: f64,
    pub feels_like: f64,
    pub wind_speed: f64,
    pub humidity: f64,
    pub status: String,
}

/// One stored observation for one city at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    // ---
    pub city: String,
    pub observed_at: DateTime<Utc>,
    pub temperature: f64,
    pub temperature_max: f64,
    pub temperature_min: f64,
    pub feels_like: f64,
    pub wind_speed: f64,
    pub humidity: f64,
    pub status: String,
}

/// Aggregated statistics for one city on one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct DailySummary {
    // ---
    pub city: String,
    #[sqlx(rename = "summary_date")]
    pub date: NaiveDate,
    pub min_temp: f64,
    pub max_temp: f64,
    pub avg_temp: f64,
    pub dominant_weather: String,
    pub reading_count: i64,
}

/// Unit used when presenting temperatures. Storage is always Celsius.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
    Kelvin,
}

impl TemperatureUnit {
    /// Convert a Celsius value into this unit.
    pub fn from_celsius(self, celsius: f64) -> f64 {
        match self {
            Self::Celsius => celsius,
            Self::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
            Self::Kelvin => celsius + 273.15,
        }
    }
}

impl Observation {
    /// Stamp the observation with its city and time, producing a `Reading`.
    pub fn into_reading(self, city: &str, observed_at: DateTime<Utc>) -> Reading {
        // ---
        Reading {
            city: city.to_string(),
            observed_at,
            temperature: self.temperature,
            temperature_max: self.temperature_max,
            temperature_min: self.temperature_min,
            feels_like: self.feels_like,
            wind_speed: self.wind_speed,
            humidity: self.humidity,
            status: self.status,
        }
    }
}

impl Reading {
    /// Copy of this reading with every temperature field in `unit`.
    pub fn in_unit(&self, unit: TemperatureUnit) -> Reading {
        Reading {
            temperature: unit.from_celsius(self.temperature),
            temperature_max: unit.from_celsius(self.temperature_max),
            temperature_min: unit.from_celsius(self.temperature_min),
            feels_like: unit.from_celsius(self.feels_like),
            ..self.clone()
        }
    }
}

impl DailySummary {
    /// Sentinel for a city/day without readings.
    pub fn empty(city: &str, date: NaiveDate) -> Self {
        Self {
            city: city.to_string(),
            date,
            min_temp: 0.0,
            max_temp: 0.0,
            avg_temp: 0.0,
            dominant_weather: UNKNOWN_STATUS.to_string(),
            reading_count: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.reading_count == 0
    }

    /// Copy of this summary with the temperature statistics in `unit`.
    pub fn in_unit(&self, unit: TemperatureUnit) -> DailySummary {
        DailySummary {
            min_temp: unit.from_celsius(self.min_temp),
            max_temp: unit.from_celsius(self.max_temp),
            avg_temp: unit.from_celsius(self.avg_temp),
            ..self.clone()
        }
    }
}
