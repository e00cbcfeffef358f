//! Forward geocoding: free-text place name to coordinates.
//! Uses Nominatim (OpenStreetMap) - free, no API key required.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::fmt::Debug;

use crate::{error::GeocodeError, model::Coordinates};

pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_USER_AGENT: &str = "weather_app";

#[async_trait]
pub trait Geocoder: Send + Sync + Debug {
    /// Resolve `name` to the best match's coordinates.
    async fn resolve(&self, name: &str) -> Result<Coordinates, GeocodeError>;
}

#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    base_url: String,
    http: Client,
}

impl NominatimGeocoder {
    pub fn new(base_url: impl Into<String>, user_agent: &str) -> Result<Self, GeocodeError> {
        let http = Client::builder().user_agent(user_agent).build()?;
        Ok(Self { base_url: base_url.into(), http })
    }
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn resolve(&self, name: &str) -> Result<Coordinates, GeocodeError> {
        let query = name.trim();
        if query.is_empty() {
            return Err(GeocodeError::NotFound(name.to_string()));
        }

        let url = format!("{}/search", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .get(&url)
            .query(&[("q", query), ("format", "json"), ("limit", "1")])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(GeocodeError::Status { status: status.as_u16(), body });
        }

        let places: Vec<NominatimPlace> = serde_json::from_str(&body)
            .map_err(|e| GeocodeError::Malformed(e.to_string()))?;

        let place = places
            .into_iter()
            .next()
            .ok_or_else(|| GeocodeError::NotFound(query.to_string()))?;

        let latitude = parse_degrees("lat", &place.lat)?;
        let longitude = parse_degrees("lon", &place.lon)?;
        let coordinates = Coordinates::new(latitude, longitude)?;

        tracing::info!(
            query,
            place = place.display_name.as_deref().unwrap_or(""),
            latitude,
            longitude,
            "geocoded location"
        );
        Ok(coordinates)
    }
}

fn parse_degrees(field: &str, raw: &str) -> Result<f64, GeocodeError> {
    raw.trim()
        .parse()
        .map_err(|_| GeocodeError::Malformed(format!("'{field}' is not a number: {raw}")))
}
