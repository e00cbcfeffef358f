//! Open-Meteo forecast client.

use std::time::Duration;

use serde::Deserialize;

use crate::{
    config::Config,
    error::{ForecastError, TransportError},
    model::{Coordinates, VariableSpec, WeatherEnvelope},
    transport::{CachedTransport, HttpRequest, HttpTransport, RetryTransport, Transport},
};

mod openmeteo;

pub use openmeteo::parse_envelope;

pub const DEFAULT_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
pub const DEFAULT_TIMEZONE: &str = "Europe/Berlin";

/// Issues the forecast request through a transport stack and parses the reply.
///
/// Constructed once per run and passed explicitly to whoever needs it.
#[derive(Debug)]
pub struct WeatherClient {
    transport: Box<dyn Transport>,
    base_url: String,
    timezone: String,
}

impl WeatherClient {
    pub fn new(
        transport: impl Transport + 'static,
        base_url: impl Into<String>,
        timezone: impl Into<String>,
    ) -> Self {
        Self {
            transport: Box::new(transport),
            base_url: base_url.into(),
            timezone: timezone.into(),
        }
    }

    /// Build the production stack: retry over cache over HTTP.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let http = match config.forecast.request_timeout_secs {
            Some(secs) => HttpTransport::with_timeout(Duration::from_secs(secs))?,
            None => HttpTransport::new(),
        };

        let cache_path = config.cache_path()?;
        let cached = CachedTransport::open(
            http,
            &cache_path,
            Duration::from_secs(config.cache.expire_after_secs),
        )?;
        let retrying = RetryTransport::new(cached, config.retry_policy());

        tracing::debug!(cache = %cache_path.display(), "weather client ready");

        Ok(Self::new(retrying, &config.forecast.base_url, &config.forecast.timezone))
    }

    /// The request sent for `coordinates`; its signature is the cache key.
    pub fn request(&self, coordinates: Coordinates, variables: &VariableSpec) -> HttpRequest {
        let mut request = HttpRequest::get(&self.base_url)
            .param("latitude", coordinates.latitude())
            .param("longitude", coordinates.longitude());

        for (key, names) in [
            ("current", &variables.current),
            ("hourly", &variables.hourly),
            ("daily", &variables.daily),
        ] {
            if !names.is_empty() {
                request = request.param(key, names.join(","));
            }
        }

        request.param("timezone", &self.timezone)
    }

    pub async fn fetch_forecast(
        &self,
        coordinates: Coordinates,
        variables: &VariableSpec,
    ) -> Result<WeatherEnvelope, ForecastError> {
        let request = self.request(coordinates, variables);

        let response = self.transport.issue(&request).await.map_err(provider_error)?;

        parse_envelope(&response.body, variables)
    }
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: bool,
    reason: String,
}

/// Surface the provider's own rejection reason for client errors.
fn provider_error(err: TransportError) -> ForecastError {
    if let TransportError::Status { status, body } = &err {
        if (400..500).contains(status) {
            if let Ok(ProviderErrorBody { error: true, reason }) = serde_json::from_str(body) {
                return ForecastError::Provider { status: *status, reason };
            }
        }
    }
    ForecastError::Transport(err)
}
