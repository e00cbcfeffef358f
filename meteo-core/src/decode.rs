//! Series decoding: compact time-series blocks to explicit rows.

use crate::{
    error::DecodeError,
    model::{Row, RowSet, Series},
};

/// Expand `series` into one row per step of `[start, end)`.
///
/// Every variable array must have exactly as many values as there are steps;
/// nothing is truncated or padded.
pub fn decode(series: &Series) -> Result<RowSet, DecodeError> {
    if series.interval <= chrono::TimeDelta::zero() {
        return Err(DecodeError::InvalidInterval(series.interval.num_seconds()));
    }

    let mut timestamps = Vec::new();
    let mut t = series.start;
    while t < series.end {
        timestamps.push(t);
        match t.checked_add_signed(series.interval) {
            Some(next) => t = next,
            // past the representable range, so also past `end`
            None => break,
        }
    }

    let expected = timestamps.len();
    if let Some(bad) = series.variables.iter().find(|v| v.values.len() != expected) {
        return Err(DecodeError::LengthMismatch {
            variable: bad.name.clone(),
            expected,
            actual: bad.values.len(),
        });
    }

    let rows = timestamps
        .into_iter()
        .enumerate()
        .map(|(i, timestamp)| Row {
            timestamp,
            values: series.variables.iter().map(|v| v.values[i]).collect(),
        })
        .collect();

    Ok(RowSet {
        columns: series.variables.iter().map(|v| v.name.clone()).collect(),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SeriesVariable;
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn series(end_secs: i64, interval_secs: i64, vars: Vec<(&str, Vec<Option<f64>>)>) -> Series {
        Series {
            start: t0(),
            end: t0() + TimeDelta::seconds(end_secs),
            interval: TimeDelta::seconds(interval_secs),
            variables: vars
                .into_iter()
                .map(|(name, values)| SeriesVariable { name: name.to_string(), values })
                .collect(),
        }
    }

    #[test]
    fn two_hourly_steps() {
        let s = series(7200, 3600, vec![("temperature_2m", vec![Some(10.0), Some(11.5)])]);

        let decoded = decode(&s).unwrap();

        assert_eq!(decoded.columns, vec!["temperature_2m"]);
        assert_eq!(
            decoded.rows,
            vec![
                Row { timestamp: t0(), values: vec![Some(10.0)] },
                Row { timestamp: t0() + TimeDelta::seconds(3600), values: vec![Some(11.5)] },
            ]
        );
    }

    #[test]
    fn row_count_matches_step_count() {
        for steps in [0usize, 1, 24, 168] {
            let values = vec![Some(1.0); steps];
            let s = series(steps as i64 * 3600, 3600, vec![("temperature_2m", values)]);
            assert_eq!(decode(&s).unwrap().len(), steps);
        }
    }

    #[test]
    fn partial_last_step_still_counts() {
        // ceil(5400 / 3600) == 2
        let s = series(5400, 3600, vec![("temperature_2m", vec![Some(1.0), Some(2.0)])]);
        assert_eq!(decode(&s).unwrap().len(), 2);
    }

    #[test]
    fn rows_are_evenly_spaced_and_ascending() {
        let values: Vec<_> = (0..7).map(|d| Some(d as f64)).collect();
        let s = series(7 * 86_400, 86_400, vec![("weather_code", values)]);

        let rows = decode(&s).unwrap().rows;

        for pair in rows.windows(2) {
            assert_eq!(pair[1].timestamp - pair[0].timestamp, TimeDelta::days(1));
        }
        assert_eq!(rows.last().unwrap().values, vec![Some(6.0)]);
    }

    #[test]
    fn several_variables_are_zipped_positionally() {
        let s = series(
            7200,
            3600,
            vec![
                ("temperature_2m", vec![Some(10.0), Some(11.5)]),
                ("relative_humidity_2m", vec![Some(80.0), None]),
            ],
        );

        let decoded = decode(&s).unwrap();

        assert_eq!(decoded.columns, vec!["temperature_2m", "relative_humidity_2m"]);
        assert_eq!(decoded.rows[1].values, vec![Some(11.5), None]);
    }

    #[test]
    fn short_array_is_a_length_mismatch() {
        let s = series(7200, 3600, vec![("temperature_2m", vec![Some(10.0)])]);

        let err = decode(&s).unwrap_err();

        assert_eq!(
            err,
            DecodeError::LengthMismatch {
                variable: "temperature_2m".into(),
                expected: 2,
                actual: 1,
            }
        );
    }

    #[test]
    fn long_array_is_a_length_mismatch() {
        let s = series(
            7200,
            3600,
            vec![
                ("temperature_2m", vec![Some(10.0), Some(11.0)]),
                ("weather_code", vec![Some(1.0), Some(2.0), Some(3.0)]),
            ],
        );

        let err = decode(&s).unwrap_err();
        assert!(matches!(err, DecodeError::LengthMismatch { expected: 2, actual: 3, .. }));
    }

    #[test]
    fn non_positive_interval_is_rejected() {
        let s = series(7200, 0, vec![("temperature_2m", vec![])]);
        assert_eq!(decode(&s).unwrap_err(), DecodeError::InvalidInterval(0));
    }

    #[test]
    fn axis_ending_at_the_latest_instant_stops_cleanly() {
        let end = DateTime::<Utc>::MAX_UTC;
        let s = Series {
            start: end - TimeDelta::minutes(30),
            end,
            interval: TimeDelta::hours(1),
            variables: vec![SeriesVariable { name: "temperature_2m".into(), values: vec![Some(1.0)] }],
        };

        let decoded = decode(&s).unwrap();

        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded.rows[0].timestamp, end - TimeDelta::minutes(30));
    }

    #[test]
    fn decoding_is_deterministic() {
        let s = series(7200, 3600, vec![("temperature_2m", vec![Some(10.0), Some(11.5)])]);
        assert_eq!(decode(&s).unwrap(), decode(&s).unwrap());
    }
}
