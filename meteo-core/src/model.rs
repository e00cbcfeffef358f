use chrono::{DateTime, TimeDelta, Utc};

use crate::error::{CoordinateError, ForecastError};

/// Table receiving the decoded hourly series.
pub const HOURLY_TABLE: &str = "hourly_weather";
/// Table receiving the decoded daily series.
pub const DAILY_TABLE: &str = "daily_weather";
/// Name of the timestamp column in both tables.
pub const TIMESTAMP_COLUMN: &str = "date";

/// A validated point on the globe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    latitude: f64,
    longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        let valid = (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude);
        if !valid {
            return Err(CoordinateError { latitude, longitude });
        }
        Ok(Self { latitude, longitude })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// Which time-series block of the forecast a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    Hourly,
    Daily,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Hourly => "hourly",
            Granularity::Daily => "daily",
        }
    }

    /// Step used when the provider returns a single-entry time axis.
    pub fn default_interval(&self) -> TimeDelta {
        match self {
            Granularity::Hourly => TimeDelta::hours(1),
            Granularity::Daily => TimeDelta::days(1),
        }
    }

    /// Output table for this granularity.
    pub fn table(&self) -> &'static str {
        match self {
            Granularity::Hourly => HOURLY_TABLE,
            Granularity::Daily => DAILY_TABLE,
        }
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Variable names requested per block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableSpec {
    pub current: Vec<String>,
    pub hourly: Vec<String>,
    pub daily: Vec<String>,
}

impl Default for VariableSpec {
    fn default() -> Self {
        Self {
            current: vec!["temperature_2m".to_string()],
            hourly: vec!["temperature_2m".to_string()],
            daily: vec!["weather_code".to_string()],
        }
    }
}

impl VariableSpec {
    pub fn for_granularity(&self, granularity: Granularity) -> &[String] {
        match granularity {
            Granularity::Hourly => &self.hourly,
            Granularity::Daily => &self.daily,
        }
    }
}

/// Location metadata echoed back by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationMeta {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>,
    pub timezone: String,
    pub timezone_abbreviation: String,
    pub utc_offset_seconds: i32,
    pub generation_time_ms: Option<f64>,
}

/// Single-instant snapshot, one value per requested current variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Current {
    pub time: DateTime<Utc>,
    pub interval_seconds: Option<i64>,
    pub values: Vec<(String, Option<f64>)>,
}

impl Current {
    pub fn value(&self, name: &str) -> Option<f64> {
        self.values.iter().find(|(n, _)| n == name).and_then(|(_, v)| *v)
    }
}

/// One variable of a [`Series`]: a flat array aligned with the time axis.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesVariable {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// Compact time-series block: `[start, end)` stepped by `interval`, with one
/// parallel array per variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub interval: TimeDelta,
    pub variables: Vec<SeriesVariable>,
}

/// Parsed forecast response for one location.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherEnvelope {
    pub location: LocationMeta,
    pub current: Option<Current>,
    pub hourly: Option<Series>,
    pub daily: Option<Series>,
}

impl WeatherEnvelope {
    pub fn current(&self) -> Result<&Current, ForecastError> {
        self.current
            .as_ref()
            .ok_or_else(|| ForecastError::MalformedResponse("no current block".to_string()))
    }

    pub fn series(&self, granularity: Granularity) -> Result<&Series, ForecastError> {
        let series = match granularity {
            Granularity::Hourly => self.hourly.as_ref(),
            Granularity::Daily => self.daily.as_ref(),
        };
        series.ok_or_else(|| {
            ForecastError::MalformedResponse(format!("no {granularity} block"))
        })
    }

    pub fn hourly(&self) -> Result<&Series, ForecastError> {
        self.series(Granularity::Hourly)
    }

    pub fn daily(&self) -> Result<&Series, ForecastError> {
        self.series(Granularity::Daily)
    }
}

/// One decoded time step; `values` line up with [`RowSet::columns`].
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub timestamp: DateTime<Utc>,
    pub values: Vec<Option<f64>>,
}

/// Decoded, row-oriented series ordered by timestamp.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl RowSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
