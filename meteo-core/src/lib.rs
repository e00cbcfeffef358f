//! Core library for the `meteo` CLI.
//!
//! This crate defines:
//! - Configuration handling
//! - A composable transport stack (HTTP, response cache, retry)
//! - Geocoding and the Open-Meteo forecast client
//! - Decoding of compact time series into rows
//! - Replacing SQLite tables with the decoded rows
//!
//! It is used by `meteo-cli`, but can also be reused by other binaries or services.

pub mod config;
pub mod decode;
pub mod error;
pub mod forecast;
pub mod geocode;
pub mod model;
pub mod pipeline;
pub mod store;
pub mod transport;

pub use config::Config;
pub use decode::decode;
pub use error::{
    DecodeError, ForecastError, GeocodeError, PersistenceError, PipelineError, TransportError,
};
pub use forecast::WeatherClient;
pub use geocode::{Geocoder, NominatimGeocoder};
pub use model::{
    Coordinates, Current, Granularity, LocationMeta, Row, RowSet, Series, SeriesVariable,
    VariableSpec, WeatherEnvelope,
};
pub use pipeline::{Pipeline, RunReport};
pub use store::{SqliteTableStore, TableStore};
pub use transport::{HttpRequest, HttpResponse, Transport};
