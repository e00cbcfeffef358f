//! SQLite table store for decoded series.
//!
//! Every write replaces the whole table: there is no append and no schema
//! migration between runs.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params_from_iter, types::Value as SqlValue};
use std::path::Path;

use crate::{
    error::{PersistenceError, StoreFailure},
    model::{Row, RowSet, TIMESTAMP_COLUMN},
};

/// Destination for decoded row sets.
pub trait TableStore {
    /// Drop any table called `name` and write `rows` as its complete contents.
    fn replace_table(&mut self, name: &str, rows: &RowSet) -> Result<(), PersistenceError>;

    /// Read a table back in insertion order.
    fn read_table(&self, name: &str) -> Result<RowSet, PersistenceError>;
}

pub struct SqliteTableStore {
    conn: Connection,
}

impl SqliteTableStore {
    /// Open (or create) the database file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    /// In-memory database (for testing).
    pub fn in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    fn write(&mut self, name: &str, rows: &RowSet) -> Result<(), StoreFailure> {
        let table = quote(name)?;
        let mut columns = vec![format!("{} TIMESTAMP", quote(TIMESTAMP_COLUMN)?)];
        for column in &rows.columns {
            columns.push(format!("{} REAL", quote(column)?));
        }

        let placeholders = vec!["?"; rows.columns.len() + 1].join(", ");

        let tx = self.conn.transaction()?;
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {table}; CREATE TABLE {table} ({});",
            columns.join(", ")
        ))?;
        {
            let mut stmt = tx.prepare(&format!("INSERT INTO {table} VALUES ({placeholders})"))?;
            for row in &rows.rows {
                let values = std::iter::once(SqlValue::Text(format_timestamp(row.timestamp)))
                    .chain(row.values.iter().map(|v| match v {
                        Some(x) => SqlValue::Real(*x),
                        None => SqlValue::Null,
                    }));
                stmt.execute(params_from_iter(values))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn read(&self, name: &str) -> Result<RowSet, StoreFailure> {
        let table = quote(name)?;
        let mut stmt = self.conn.prepare(&format!("SELECT * FROM {table} ORDER BY rowid"))?;

        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .skip(1)
            .map(str::to_string)
            .collect();
        let width = columns.len();

        let rows = stmt
            .query_map([], |row| {
                let timestamp: DateTime<Utc> = row.get(0)?;
                let values = (1..=width)
                    .map(|i| row.get::<_, Option<f64>>(i))
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(Row { timestamp, values })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(RowSet { columns, rows })
    }
}

impl TableStore for SqliteTableStore {
    fn replace_table(&mut self, name: &str, rows: &RowSet) -> Result<(), PersistenceError> {
        self.write(name, rows).map_err(|e| PersistenceError::new(name, e))?;
        tracing::info!(table = name, rows = rows.len(), "table replaced");
        Ok(())
    }

    fn read_table(&self, name: &str) -> Result<RowSet, PersistenceError> {
        self.read(name).map_err(|e| PersistenceError::new(name, e))
    }
}

/// Same layout rusqlite uses for `DateTime<Utc>`, so values read back losslessly.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%F %T%.f%:z").to_string()
}

/// Double-quote a plain identifier; anything else is refused rather than escaped.
fn quote(ident: &str) -> Result<String, StoreFailure> {
    let mut chars = ident.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(StoreFailure::InvalidIdentifier(ident.to_string()));
    }
    Ok(format!("\"{ident}\""))
}
