//! Error types for each stage of the pipeline.

use std::fmt;

use thiserror::Error;

use crate::model::Granularity;

/// Longest slice of an HTTP body quoted in an error message.
const MAX_BODY: usize = 200;

/// Coordinates outside the valid latitude/longitude ranges.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("coordinates out of range: latitude {latitude}, longitude {longitude}")]
pub struct CoordinateError {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("No place found for '{0}'")]
    NotFound(String),

    #[error("Geocoding request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Geocoding request failed with status {status}: {}", truncate_body(.body))]
    Status { status: u16, body: String },

    #[error("Malformed geocoding response: {0}")]
    Malformed(String),

    #[error(transparent)]
    InvalidCoordinates(#[from] CoordinateError),
}

/// Failures of a [`Transport`](crate::transport::Transport) stage.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request failed with status {status}: {}", truncate_body(.body))]
    Status { status: u16, body: String },

    #[error("Response cache error: {0}")]
    Cache(String),

    #[error("Giving up after {attempts} attempts: {last}")]
    ExhaustedRetries {
        attempts: u32,
        #[source]
        last: Box<TransportError>,
    },
}

impl TransportError {
    pub fn status(status: u16, body: &[u8]) -> Self {
        Self::Status { status, body: String::from_utf8_lossy(body).into_owned() }
    }

    /// Whether the retry layer should try the request again.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(e) => !e.is_builder(),
            Self::Status { status, .. } => {
                (500..600).contains(status) || *status == 408 || *status == 429
            }
            Self::Cache(_) | Self::ExhaustedRetries { .. } => false,
        }
    }
}

impl From<rusqlite::Error> for TransportError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Cache(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Weather provider rejected the request ({status}): {reason}")]
    Provider { status: u16, reason: String },

    #[error("Malformed weather response: {0}")]
    MalformedResponse(String),

    #[error("Expected one location in the weather response, got {0}")]
    UnexpectedLocationCount(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error(
        "variable '{variable}' has {actual} values but the time axis has {expected} steps"
    )]
    LengthMismatch { variable: String, expected: usize, actual: usize },

    #[error("series interval must be positive, got {0} s")]
    InvalidInterval(i64),
}

/// Why a single table write failed.
#[derive(Debug, Error)]
pub enum StoreFailure {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),
}

#[derive(Debug, Error)]
#[error("failed to write table '{table}': {source}")]
pub struct PersistenceError {
    pub table: String,
    #[source]
    pub source: StoreFailure,
}

impl PersistenceError {
    pub fn new(table: impl Into<String>, source: impl Into<StoreFailure>) -> Self {
        Self { table: table.into(), source: source.into() }
    }
}

/// Top-level failure of one pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Geocode(#[from] GeocodeError),

    #[error(transparent)]
    Forecast(#[from] ForecastError),

    #[error("failed to decode {granularity} series: {source}")]
    Decode {
        granularity: Granularity,
        #[source]
        source: DecodeError,
    },

    #[error("{}", PersistenceFailures(.0))]
    Persistence(Vec<PersistenceError>),
}

struct PersistenceFailures<'a>(&'a [PersistenceError]);

impl fmt::Display for PersistenceFailures<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut iter = self.0.iter();
        if let Some(first) = iter.next() {
            write!(f, "{first}")?;
        }
        for err in iter {
            write!(f, "; {err}")?;
        }
        Ok(())
    }
}

pub(crate) fn truncate_body(body: &str) -> String {
    if body.len() > MAX_BODY {
        let mut end = MAX_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}
