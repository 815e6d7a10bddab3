//! Subscription entry persistence.
//!
//! One row per registered key. Writes are a single UPSERT statement, so a
//! concurrent reader sees either the old or the new entry, never a mix.

use super::connection::CacheDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A cached subscription document registered under a short key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Reference the document was originally resolved from; empty for uploads.
    pub source_reference: String,
    /// The document text. `None` marks a corrupt entry.
    pub raw_text: Option<String>,
    /// Subscription usage header captured alongside the document.
    pub usage_info: String,
    /// RFC 3339 timestamp of the last write.
    pub cached_at: String,
    /// Re-resolve `source_reference` whenever the key is read.
    pub auto_refresh: bool,
}

impl CacheEntry {
    /// Build an entry stamped with the current time.
    pub fn new(
        source_reference: impl Into<String>, raw_text: impl Into<String>, usage_info: impl Into<String>,
        auto_refresh: bool,
    ) -> Self {
        Self {
            source_reference: source_reference.into(),
            raw_text: Some(raw_text.into()),
            usage_info: usage_info.into(),
            cached_at: chrono::Utc::now().to_rfc3339(),
            auto_refresh,
        }
    }

    /// Whether a refresh has anything to re-resolve.
    pub fn refreshable(&self) -> bool {
        self.auto_refresh && !self.source_reference.trim().is_empty()
    }
}

impl CacheDb {
    /// Insert or replace the entry stored under `key`.
    pub async fn upsert_entry(&self, key: &str, entry: &CacheEntry) -> Result<(), Error> {
        let key = key.to_string();
        let entry = entry.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO subscriptions (
                    key, source_reference, raw_text, usage_info, cached_at, auto_refresh
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(key) DO UPDATE SET
                    source_reference = excluded.source_reference,
                    raw_text = excluded.raw_text,
                    usage_info = excluded.usage_info,
                    cached_at = excluded.cached_at,
                    auto_refresh = excluded.auto_refresh",
                    params![
                        &key,
                        &entry.source_reference,
                        &entry.raw_text,
                        &entry.usage_info,
                        &entry.cached_at,
                        entry.auto_refresh as i32,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get the entry stored under `key`.
    ///
    /// Returns None if the key has never been registered.
    pub async fn get_entry(&self, key: &str) -> Result<Option<CacheEntry>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT source_reference, raw_text, usage_info, cached_at, auto_refresh
                FROM subscriptions WHERE key = ?1",
                )?;

                let result = stmt.query_row(params![key], |row| {
                    Ok(CacheEntry {
                        source_reference: row.get(0)?,
                        raw_text: row.get(1)?,
                        usage_info: row.get(2)?,
                        cached_at: row.get(3)?,
                        auto_refresh: row.get::<_, i32>(4)? == 1,
                    })
                });

                match result {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }
}
