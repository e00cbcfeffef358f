use std::fmt;

use chrono::{DateTime, Utc};
use meteo_core::{RowSet, RunReport, model::TIMESTAMP_COLUMN};

/// Human-readable summary of a run: location, current values, both tables.
pub struct ReportView<'a>(pub &'a RunReport);

impl fmt::Display for ReportView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        let loc = &report.location;

        writeln!(f, "Coordinates {}°N {}°E", loc.latitude, loc.longitude)?;
        match loc.elevation {
            Some(elevation) => writeln!(f, "Elevation {elevation} m asl")?,
            None => writeln!(f, "Elevation unknown")?,
        }
        writeln!(f, "Timezone {} {}", loc.timezone, loc.timezone_abbreviation)?;
        writeln!(f, "Timezone difference to GMT+0 {} s", loc.utc_offset_seconds)?;

        if let Some(current) = &report.current {
            writeln!(f, "Current time {}", timestamp(current.time))?;
            for (name, value) in &current.values {
                writeln!(f, "Current {name} {}", number(*value))?;
            }
        }

        writeln!(f)?;
        write!(f, "{}", TableView("hourly", &report.hourly))?;
        writeln!(f)?;
        write!(f, "{}", TableView("daily", &report.daily))
    }
}

/// Fixed-width table with the timestamp column first.
pub struct TableView<'a>(pub &'a str, pub &'a RowSet);

impl fmt::Display for TableView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let TableView(title, rows) = *self;

        writeln!(f, "{title} ({} rows)", rows.len())?;

        write!(f, "{TIMESTAMP_COLUMN:<25}")?;
        for column in &rows.columns {
            write!(f, " {:>w$}", column, w = column_width(column))?;
        }
        writeln!(f)?;

        for row in &rows.rows {
            write!(f, "{:<25}", timestamp(row.timestamp))?;
            for (column, value) in rows.columns.iter().zip(&row.values) {
                write!(f, " {:>w$}", number(*value), w = column_width(column))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

fn column_width(name: &str) -> usize {
    name.len().max(10)
}

fn timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%:z").to_string()
}

fn number(value: Option<f64>) -> String {
    value.map_or_else(|| "NaN".to_string(), |v| v.to_string())
}
