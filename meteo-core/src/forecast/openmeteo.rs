//! Open-Meteo JSON wire format.
//!
//! Series blocks arrive with an explicit local-time axis; they are converted
//! here into the compact [`Series`] form (start, end, interval, parallel arrays).
//! Everything past this module works with typed blocks only.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    error::ForecastError,
    model::{Current, Granularity, LocationMeta, Series, SeriesVariable, VariableSpec, WeatherEnvelope},
};

#[derive(Debug, Deserialize)]
struct OmLocation {
    latitude: f64,
    longitude: f64,
    elevation: Option<f64>,
    generationtime_ms: Option<f64>,
    utc_offset_seconds: i32,
    timezone: String,
    timezone_abbreviation: String,
    current: Option<OmCurrent>,
    hourly: Option<OmSeries>,
    daily: Option<OmSeries>,
}

#[derive(Debug, Deserialize)]
struct OmCurrent {
    time: OmTime,
    interval: Option<i64>,
    #[serde(flatten)]
    values: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct OmSeries {
    time: Vec<OmTime>,
    #[serde(flatten)]
    columns: HashMap<String, Value>,
}

/// `timeformat=iso8601` (default) gives local wall-clock strings,
/// `timeformat=unixtime` gives UTC epoch seconds.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OmTime {
    Unix(i64),
    Local(String),
}

impl OmTime {
    fn to_utc(&self, utc_offset: TimeDelta) -> Result<DateTime<Utc>, ForecastError> {
        match self {
            OmTime::Unix(ts) => DateTime::from_timestamp(*ts, 0)
                .ok_or_else(|| malformed(format!("timestamp out of range: {ts}"))),
            OmTime::Local(raw) => {
                let local = parse_local(raw)
                    .ok_or_else(|| malformed(format!("unrecognised time '{raw}'")))?;
                local
                    .checked_sub_signed(utc_offset)
                    .map(|t| t.and_utc())
                    .ok_or_else(|| malformed(format!("time '{raw}' out of range")))
            }
        }
    }
}

fn parse_local(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn malformed(msg: impl Into<String>) -> ForecastError {
    ForecastError::MalformedResponse(msg.into())
}

/// Parse a forecast body into an envelope for the first location.
///
/// Fails if a block is missing for a non-empty variable list, or a requested
/// variable is missing from its block.
pub fn parse_envelope(body: &[u8], variables: &VariableSpec) -> Result<WeatherEnvelope, ForecastError> {
    let value: Value = serde_json::from_slice(body).map_err(|e| malformed(e.to_string()))?;

    let locations = match value {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        other => return Err(malformed(format!("expected an object or array, got {other}"))),
    };

    if locations.len() > 1 {
        tracing::warn!(count = locations.len(), "provider returned several locations, using the first");
    }

    let first = locations
        .into_iter()
        .next()
        .ok_or(ForecastError::UnexpectedLocationCount(0))?;

    let raw: OmLocation = serde_json::from_value(first).map_err(|e| malformed(e.to_string()))?;
    let offset = TimeDelta::seconds(i64::from(raw.utc_offset_seconds));

    let current = match raw.current {
        Some(block) => Some(parse_current(block, &variables.current, offset)?),
        None if variables.current.is_empty() => None,
        None => return Err(malformed("response lacks the current block")),
    };

    let hourly = parse_block(raw.hourly, Granularity::Hourly, variables, offset)?;
    let daily = parse_block(raw.daily, Granularity::Daily, variables, offset)?;

    Ok(WeatherEnvelope {
        location: LocationMeta {
            latitude: raw.latitude,
            longitude: raw.longitude,
            elevation: raw.elevation,
            timezone: raw.timezone,
            timezone_abbreviation: raw.timezone_abbreviation,
            utc_offset_seconds: raw.utc_offset_seconds,
            generation_time_ms: raw.generationtime_ms,
        },
        current,
        hourly,
        daily,
    })
}

fn parse_current(block: OmCurrent, names: &[String], offset: TimeDelta) -> Result<Current, ForecastError> {
    let time = block.time.to_utc(offset)?;
    let values = names
        .iter()
        .map(|name| {
            let value = block
                .values
                .get(name)
                .ok_or_else(|| malformed(format!("current block lacks '{name}'")))?;
            Ok((name.clone(), number(value, name)?))
        })
        .collect::<Result<Vec<_>, ForecastError>>()?;

    Ok(Current { time, interval_seconds: block.interval, values })
}

fn parse_block(
    block: Option<OmSeries>,
    granularity: Granularity,
    variables: &VariableSpec,
    offset: TimeDelta,
) -> Result<Option<Series>, ForecastError> {
    let names = variables.for_granularity(granularity);
    match block {
        Some(block) => parse_series(block, granularity, names, offset).map(Some),
        None if names.is_empty() => Ok(None),
        None => Err(malformed(format!("response lacks the {granularity} block"))),
    }
}

fn parse_series(
    block: OmSeries,
    granularity: Granularity,
    names: &[String],
    offset: TimeDelta,
) -> Result<Series, ForecastError> {
    let times = block
        .time
        .iter()
        .map(|t| t.to_utc(offset))
        .collect::<Result<Vec<_>, _>>()?;

    let (Some(&start), Some(&last)) = (times.first(), times.last()) else {
        return Err(malformed(format!("{granularity} block has an empty time axis")));
    };

    let interval = match times.get(1) {
        Some(&second) => second - start,
        None => granularity.default_interval(),
    };
    if interval <= TimeDelta::zero() {
        return Err(malformed(format!("{granularity} time axis is not increasing")));
    }
    if times.windows(2).any(|w| w[1] - w[0] != interval) {
        return Err(malformed(format!("{granularity} time axis is not regularly spaced")));
    }

    let variables = names
        .iter()
        .map(|name| {
            let column = block
                .columns
                .get(name)
                .ok_or_else(|| malformed(format!("{granularity} block lacks '{name}'")))?;
            let Value::Array(items) = column else {
                return Err(malformed(format!("{granularity} '{name}' is not an array")));
            };
            let values = items
                .iter()
                .map(|v| number(v, name))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(SeriesVariable { name: name.clone(), values })
        })
        .collect::<Result<Vec<_>, ForecastError>>()?;

    let end = last
        .checked_add_signed(interval)
        .ok_or_else(|| malformed(format!("{granularity} time axis ends out of range")))?;

    Ok(Series { start, end, interval, variables })
}

/// A JSON number, or `None` for the provider's `null` gaps.
fn number(value: &Value, name: &str) -> Result<Option<f64>, ForecastError> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| malformed(format!("'{name}' value out of range"))),
        other => Err(malformed(format!("'{name}' has non-numeric value {other}"))),
    }
}
