//! SQLite-backed response cache stage.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::time::Duration;

use crate::error::TransportError;

use super::{HttpRequest, HttpResponse, Transport};

/// Serves unexpired responses from disk and records fresh ones.
///
/// Entries older than the expiry window are bypassed on read and overwritten
/// on the next successful fetch; nothing is ever purged.
#[derive(Debug)]
pub struct CachedTransport<T> {
    inner: T,
    conn: Mutex<Connection>,
    expire_after: Duration,
}

impl<T: Transport> CachedTransport<T> {
    /// Open (or create) the cache database at `path`.
    pub fn open<P: AsRef<Path>>(inner: T, path: P, expire_after: Duration) -> Result<Self, TransportError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    TransportError::Cache(format!(
                        "Failed to create cache directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }
        let conn = Connection::open(path)?;
        Self::with_connection(inner, conn, expire_after)
    }

    /// Cache held in memory only (for testing).
    pub fn in_memory(inner: T, expire_after: Duration) -> Result<Self, TransportError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(inner, conn, expire_after)
    }

    fn with_connection(inner: T, conn: Connection, expire_after: Duration) -> Result<Self, TransportError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS responses (
                key TEXT PRIMARY KEY,
                url TEXT NOT NULL,
                status INTEGER NOT NULL,
                body BLOB NOT NULL,
                stored_at INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(Self { inner, conn: Mutex::new(conn), expire_after })
    }

    fn lookup(&self, key: &str) -> Result<Option<HttpResponse>, TransportError> {
        let conn = self.conn.lock();
        let entry = conn
            .query_row(
                "SELECT status, body, stored_at FROM responses WHERE key = ?1",
                params![key],
                |row| {
                    Ok((row.get::<_, u16>(0)?, row.get::<_, Vec<u8>>(1)?, row.get::<_, i64>(2)?))
                },
            )
            .optional()?;

        let Some((status, body, stored_at)) = entry else {
            return Ok(None);
        };

        let age_ms = Utc::now().timestamp_millis().saturating_sub(stored_at);
        if age_ms > self.expiry_millis() {
            tracing::debug!(key, age_ms, "cache entry expired");
            return Ok(None);
        }

        Ok(Some(HttpResponse { status, body }))
    }

    fn store(&self, key: &str, url: &str, response: &HttpResponse) -> Result<(), TransportError> {
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO responses (key, url, status, body, stored_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![key, url, response.status, response.body, Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    fn expiry_millis(&self) -> i64 {
        i64::try_from(self.expire_after.as_millis()).unwrap_or(i64::MAX)
    }

    fn enabled(&self) -> bool {
        !self.expire_after.is_zero()
    }
}

#[async_trait]
impl<T: Transport> Transport for CachedTransport<T> {
    async fn issue(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        if !self.enabled() {
            return self.inner.issue(request).await;
        }

        let key = request.signature().key();

        if let Some(hit) = self.lookup(&key)? {
            tracing::debug!(url = %request.url, "cache hit");
            return Ok(hit);
        }

        tracing::debug!(url = %request.url, "cache miss");
        let response = self.inner.issue(request).await?;
        if let Err(e) = self.store(&key, &request.url, &response) {
            tracing::warn!(url = %request.url, error = %e, "failed to cache response");
        }

        Ok(response)
    }
}
