//! One run: place name → coordinates → forecast → decoded tables → storage.

use crate::{
    config::Config,
    decode::decode,
    error::{PipelineError, PersistenceError},
    forecast::WeatherClient,
    geocode::{Geocoder, NominatimGeocoder},
    model::{Coordinates, Current, Granularity, LocationMeta, RowSet, Series, VariableSpec},
    store::{SqliteTableStore, TableStore},
};

/// What a successful run fetched and stored.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub coordinates: Coordinates,
    pub location: LocationMeta,
    pub current: Option<Current>,
    pub hourly: RowSet,
    pub daily: RowSet,
}

pub struct Pipeline {
    geocoder: Box<dyn Geocoder>,
    client: WeatherClient,
    store: Box<dyn TableStore>,
    variables: VariableSpec,
}

impl Pipeline {
    pub fn new(
        geocoder: impl Geocoder + 'static,
        client: WeatherClient,
        store: impl TableStore + 'static,
        variables: VariableSpec,
    ) -> Self {
        Self {
            geocoder: Box::new(geocoder),
            client,
            store: Box::new(store),
            variables,
        }
    }

    /// Wire up the real geocoder, cached/retrying client and database.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let geocoder =
            NominatimGeocoder::new(&config.geocoding.base_url, &config.geocoding.user_agent)?;
        let client = WeatherClient::from_config(config)?;
        let store = SqliteTableStore::open(&config.storage.database)?;

        Ok(Self::new(geocoder, client, store, config.variables()))
    }

    pub fn store(&self) -> &dyn TableStore {
        self.store.as_ref()
    }

    pub async fn run(&mut self, location: &str) -> Result<RunReport, PipelineError> {
        let coordinates = self.geocoder.resolve(location).await?;
        tracing::info!(
            location,
            latitude = coordinates.latitude(),
            longitude = coordinates.longitude(),
            "resolved location"
        );

        let envelope = self.client.fetch_forecast(coordinates, &self.variables).await?;

        let hourly = decode_block(envelope.hourly()?, Granularity::Hourly)?;
        let daily = decode_block(envelope.daily()?, Granularity::Daily)?;

        self.persist(&hourly, &daily)?;

        Ok(RunReport {
            coordinates,
            location: envelope.location,
            current: envelope.current,
            hourly,
            daily,
        })
    }

    /// Write both tables; a failure on one does not stop the other.
    fn persist(&mut self, hourly: &RowSet, daily: &RowSet) -> Result<(), PipelineError> {
        let failures: Vec<PersistenceError> = [(Granularity::Hourly, hourly), (Granularity::Daily, daily)]
            .into_iter()
            .filter_map(|(granularity, rows)| {
                self.store.replace_table(granularity.table(), rows).err()
            })
            .inspect(|err| tracing::error!(table = %err.table, error = %err.source, "table write failed"))
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::Persistence(failures))
        }
    }
}

fn decode_block(series: &Series, granularity: Granularity) -> Result<RowSet, PipelineError> {
    decode(series).map_err(|source| PipelineError::Decode { granularity, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DecodeError, ForecastError, GeocodeError, StoreFailure};
    use crate::forecast::DEFAULT_FORECAST_URL;
    use crate::model::{DAILY_TABLE, HOURLY_TABLE};
    use crate::transport::testing::{ScriptedTransport, ok};
    use async_trait::async_trait;
    use chrono::{TimeDelta, TimeZone, Utc};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct FixedGeocoder(Option<(f64, f64)>);

    #[async_trait]
    impl Geocoder for FixedGeocoder {
        async fn resolve(&self, name: &str) -> Result<Coordinates, GeocodeError> {
            let (lat, lon) = self.0.ok_or_else(|| GeocodeError::NotFound(name.to_string()))?;
            Ok(Coordinates::new(lat, lon)?)
        }
    }

    /// Refuses writes to one table, delegates the rest.
    struct FailingStore {
        inner: SqliteTableStore,
        broken: &'static str,
    }

    impl TableStore for FailingStore {
        fn replace_table(&mut self, name: &str, rows: &RowSet) -> Result<(), PersistenceError> {
            if name == self.broken {
                return Err(PersistenceError::new(name, StoreFailure::InvalidIdentifier(name.into())));
            }
            self.inner.replace_table(name, rows)
        }

        fn read_table(&self, name: &str) -> Result<RowSet, PersistenceError> {
            self.inner.read_table(name)
        }
    }

    fn body(hourly_values: &str) -> String {
        format!(
            r#"{{
                "latitude": 52.52, "longitude": 13.419998, "elevation": 38.0,
                "utc_offset_seconds": 0, "timezone": "GMT", "timezone_abbreviation": "GMT",
                "current": {{"time": "2024-01-01T12:00", "interval": 900, "temperature_2m": 3.5}},
                "hourly": {{"time": ["2024-01-01T00:00", "2024-01-01T01:00"], "temperature_2m": {hourly_values}}},
                "daily": {{"time": ["2024-01-01", "2024-01-02"], "weather_code": [3, 61]}}
            }}"#
        )
    }

    fn client_returning(payload: String) -> (WeatherClient, Arc<AtomicU32>) {
        let transport = ScriptedTransport::new(vec![ok(&payload)], || ok("{}"));
        let calls = transport.calls();
        (WeatherClient::new(transport, DEFAULT_FORECAST_URL, "GMT"), calls)
    }

    fn berlin() -> FixedGeocoder {
        FixedGeocoder(Some((52.52, 13.405)))
    }

    #[tokio::test]
    async fn run_decodes_and_stores_both_tables() {
        let (client, _) = client_returning(body("[10.0, 11.5]"));
        let store = SqliteTableStore::in_memory().unwrap();
        let mut pipeline = Pipeline::new(berlin(), client, store, VariableSpec::default());

        let report = pipeline.run("Berlin").await.unwrap();

        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(report.coordinates, Coordinates::new(52.52, 13.405).unwrap());
        assert_eq!(report.hourly.rows.len(), 2);
        assert_eq!(report.hourly.rows[0].timestamp, t0);
        assert_eq!(report.hourly.rows[0].values, vec![Some(10.0)]);
        assert_eq!(report.hourly.rows[1].timestamp, t0 + TimeDelta::seconds(3600));
        assert_eq!(report.hourly.rows[1].values, vec![Some(11.5)]);
        assert_eq!(report.daily.columns, vec!["weather_code"]);

        assert_eq!(pipeline.store().read_table(HOURLY_TABLE).unwrap(), report.hourly);
        assert_eq!(pipeline.store().read_table(DAILY_TABLE).unwrap(), report.daily);
    }

    #[tokio::test]
    async fn unknown_place_aborts_before_fetching() {
        let (client, calls) = client_returning(body("[10.0, 11.5]"));
        let store = SqliteTableStore::in_memory().unwrap();
        let mut pipeline = Pipeline::new(FixedGeocoder(None), client, store, VariableSpec::default());

        let err = pipeline.run("Atlantis").await.unwrap_err();

        assert!(matches!(err, PipelineError::Geocode(GeocodeError::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn length_mismatch_fails_without_writing() {
        let (client, _) = client_returning(body("[10.0]"));
        let store = SqliteTableStore::in_memory().unwrap();
        let mut pipeline = Pipeline::new(berlin(), client, store, VariableSpec::default());

        let err = pipeline.run("Berlin").await.unwrap_err();

        match err {
            PipelineError::Decode { granularity, source } => {
                assert_eq!(granularity, Granularity::Hourly);
                assert!(matches!(source, DecodeError::LengthMismatch { expected: 2, actual: 1, .. }));
            }
            other => panic!("expected decode error, got {other:?}"),
        }
        assert!(pipeline.store().read_table(HOURLY_TABLE).is_err());
        assert!(pipeline.store().read_table(DAILY_TABLE).is_err());
    }

    #[tokio::test]
    async fn malformed_response_is_reported() {
        let (client, _) = client_returning("[]".to_string());
        let store = SqliteTableStore::in_memory().unwrap();
        let mut pipeline = Pipeline::new(berlin(), client, store, VariableSpec::default());

        let err = pipeline.run("Berlin").await.unwrap_err();

        assert!(matches!(err, PipelineError::Forecast(ForecastError::UnexpectedLocationCount(0))));
    }

    #[tokio::test]
    async fn one_failed_table_does_not_block_the_other() {
        let (client, _) = client_returning(body("[10.0, 11.5]"));
        let store = FailingStore { inner: SqliteTableStore::in_memory().unwrap(), broken: HOURLY_TABLE };
        let mut pipeline = Pipeline::new(berlin(), client, store, VariableSpec::default());

        let err = pipeline.run("Berlin").await.unwrap_err();

        let PipelineError::Persistence(failures) = err else {
            panic!("expected persistence error");
        };
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].table, HOURLY_TABLE);
        assert_eq!(pipeline.store().read_table(DAILY_TABLE).unwrap().len(), 2);
    }
}
