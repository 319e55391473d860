//! Schema migrations for the closure state store.
//!
//! `PRAGMA user_version` is the source of truth; `store_meta.schema_version`
//! mirrors it so operators can read the version with plain SQL. A database
//! written by a newer binary is opened as-is with a warning: the schema only
//! ever gains tables and indexes, so older binaries can still read and write
//! `closure_events` and `run_markers`.

use super::schema;
use rusqlite::{Connection, types::Type};
use tracing::{info, warn};

/// Latest schema version understood by this binary.
pub const LATEST_SCHEMA_VERSION: u32 = 2;

const MIGRATIONS: &[(u32, &str)] = &[(1, schema::MIGRATION_V1_SQL), (2, schema::MIGRATION_V2_SQL)];

/// Read `PRAGMA user_version` as a `u32`.
///
/// # Errors
///
/// Returns an error if querying SQLite fails or the value is negative.
pub fn current_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(version).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(error))
    })
}

/// Apply all pending migrations in ascending order, each in its own
/// transaction. Already-applied versions are skipped.
///
/// # Errors
///
/// Returns an error if any migration fails.
pub fn migrate(conn: &mut Connection) -> rusqlite::Result<u32> {
    let start = current_schema_version(conn)?;
    if start > LATEST_SCHEMA_VERSION {
        warn!(
            found = start,
            supported = LATEST_SCHEMA_VERSION,
            "state store was written by a newer roadwatch; leaving schema untouched"
        );
        return Ok(start);
    }

    let pending = MIGRATIONS.iter().filter(|(version, _)| *version > start);
    let mut current = start;
    for &(version, sql) in pending {
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", i64::from(version))?;
        tx.execute(
            "UPDATE store_meta SET schema_version = ?1 WHERE id = 1",
            [i64::from(version)],
        )?;
        tx.commit()?;
        current = version;
    }

    if current != start {
        info!(from = start, to = current, "state store schema migrated");
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::{LATEST_SCHEMA_VERSION, current_schema_version, migrate};
    use rusqlite::{Connection, params};

    fn index_exists(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'index' AND name = ?1)",
            params![name],
            |row| row.get(0),
        )
    }

    #[test]
    fn migrate_empty_db_to_latest() -> rusqlite::Result<()> {
        let mut conn = Connection::open_in_memory()?;
        assert_eq!(current_schema_version(&conn)?, 0);

        let applied = migrate(&mut conn)?;
        assert_eq!(applied, LATEST_SCHEMA_VERSION);
        assert_eq!(current_schema_version(&conn)?, LATEST_SCHEMA_VERSION);
        assert!(index_exists(&conn, "idx_closure_events_active")?);

        let meta: i64 =
            conn.query_row("SELECT schema_version FROM store_meta WHERE id = 1", [], |row| {
                row.get(0)
            })?;
        assert_eq!(meta, i64::from(LATEST_SCHEMA_VERSION));
        Ok(())
    }

    #[test]
    fn newer_schema_is_left_alone() -> rusqlite::Result<()> {
        let mut conn = Connection::open_in_memory()?;
        migrate(&mut conn)?;
        conn.pragma_update(None, "user_version", i64::from(LATEST_SCHEMA_VERSION + 3))?;

        assert_eq!(migrate(&mut conn)?, LATEST_SCHEMA_VERSION + 3);
        let meta: i64 =
            conn.query_row("SELECT schema_version FROM store_meta WHERE id = 1", [], |row| {
                row.get(0)
            })?;
        assert_eq!(meta, i64::from(LATEST_SCHEMA_VERSION));
        Ok(())
    }

    #[test]
    fn migrate_is_idempotent() -> rusqlite::Result<()> {
        let mut conn = Connection::open_in_memory()?;
        migrate(&mut conn)?;
        assert_eq!(migrate(&mut conn)?, LATEST_SCHEMA_VERSION);
        Ok(())
    }

    #[test]
    fn is_active_is_constrained_to_zero_or_one() -> rusqlite::Result<()> {
        let mut conn = Connection::open_in_memory()?;
        migrate(&mut conn)?;
        let result = conn.execute(
            "INSERT INTO closure_events (event_id, is_full_closure, latitude, longitude, start_date, is_active)
             VALUES ('x', 1, 0.0, 0.0, 0, 2)",
            [],
        );
        assert!(result.is_err());
        Ok(())
    }
}
