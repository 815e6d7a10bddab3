//! Schema migrations tracked with `PRAGMA user_version`.
//!
//! Each migration runs in its own transaction together with the version bump,
//! so a failed batch leaves the schema at the previous version.

use super::Error;
use tokio_rusqlite::Connection;
use tokio_rusqlite::rusqlite::{self, TransactionBehavior};

/// Ordered `(version, sql)` pairs. Versions start at 1 and never repeat.
const MIGRATIONS: &[(u32, &str)] = &[(1, include_str!("../../migrations/001_subscriptions.sql"))];

fn schema_version(conn: &rusqlite::Connection) -> Result<u32, Error> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(Error::from)
}

/// Apply every migration newer than the stored schema version.
///
/// # Errors
///
/// Returns `Error::MigrationFailed` naming the version whose batch failed.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        let current = schema_version(conn)?;

        for &(version, sql) in MIGRATIONS.iter().filter(|(version, _)| *version > current) {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            tx.execute_batch(sql)
                .and_then(|()| tx.pragma_update(None, "user_version", version))
                .map_err(|e| Error::MigrationFailed(format!("version {version}: {e}")))?;
            tx.commit()?;
            tracing::debug!(version, "applied cache migration");
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn version(conn: &Connection) -> u32 {
        conn.call(|conn| schema_version(conn)).await.unwrap()
    }

    #[tokio::test]
    async fn test_fresh_database_reaches_latest_version() {
        let conn = Connection::open_in_memory().await.unwrap();
        assert_eq!(version(&conn).await, 0);

        run(&conn).await.unwrap();

        let latest = MIGRATIONS.last().map(|(v, _)| *v).unwrap();
        assert_eq!(version(&conn).await, latest);
    }

    #[tokio::test]
    async fn test_rerun_is_a_no_op() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();
        run(&conn).await.unwrap();

        let columns: Vec<String> = conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('subscriptions') ORDER BY cid")?;
                let names = stmt.query_map([], |row| row.get(0))?.collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .unwrap();

        assert_eq!(columns, vec!["key", "source_reference", "raw_text", "usage_info", "cached_at", "auto_refresh"]);
    }

    #[test]
    fn test_versions_strictly_increase() {
        assert!(MIGRATIONS.windows(2).all(|pair| pair[0].0 < pair[1].0));
        assert_eq!(MIGRATIONS.first().map(|(v, _)| *v), Some(1));
    }
}
