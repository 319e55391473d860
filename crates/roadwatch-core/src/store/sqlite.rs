//! SQLite-backed [`EventStore`].
//!
//! Runtime defaults mirror a single-writer scheduled job:
//! - `journal_mode = WAL` so operator reads do not block a pass
//! - `busy_timeout = 5s` to ride out an overlapping invocation
//!
//! SQLite reads are always consistent with prior writes on the same
//! connection, which covers the strongly consistent `get_active` contract.

use anyhow::{Context, Result};
use rusqlite::types::Value;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params, params_from_iter};
use std::path::Path;
use std::time::Duration;

use super::{EventStore, FieldUpdate, RUN_MARKER_KEY, ScanFilter, ScanPage, StoreError, migrations};
use crate::model::EventRecord;

/// Busy timeout used for store connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const COLUMNS: &str = "event_id, is_full_closure, latitude, longitude, roadway_name, \
     direction_of_travel, description, event_type, comment, start_date, planned_end_date, \
     last_updated, is_active, last_touched, detected_polygon";

const SCAN_SUBJECT: &str = "<scan>";

#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the store database, apply pragmas and migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if opening, configuring, or migrating fails.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create store directory {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("open state store {}", path.display()))?;
        Self::from_connection(conn)
    }

    /// Fresh private in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if migrations fail.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory state store")?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        configure_connection(&conn).context("configure sqlite pragmas")?;
        migrations::migrate(&mut conn).context("apply store migrations")?;
        Ok(Self { conn })
    }

    /// Borrow the underlying connection (for diagnostics and tests).
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}

/// Connection-level SQLite failures end the pass; everything else is
/// attributed to the record being processed.
fn classify_error(subject: &str, err: &rusqlite::Error) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(failure, _)
            if matches!(
                failure.code,
                ErrorCode::CannotOpen
                    | ErrorCode::NotADatabase
                    | ErrorCode::DatabaseCorrupt
                    | ErrorCode::SystemIoFailure
                    | ErrorCode::DiskFull
                    | ErrorCode::PermissionDenied
                    | ErrorCode::ReadOnly
                    | ErrorCode::DatabaseBusy
                    | ErrorCode::DatabaseLocked
                    | ErrorCode::OutOfMemory
            ) =>
        {
            StoreError::Unavailable(err.to_string())
        }
        _ => StoreError::record(subject, err),
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<EventRecord> {
    Ok(EventRecord {
        event_id: row.get(0)?,
        is_full_closure: row.get(1)?,
        latitude: row.get(2)?,
        longitude: row.get(3)?,
        roadway_name: row.get(4)?,
        direction_of_travel: row.get(5)?,
        description: row.get(6)?,
        event_type: row.get(7)?,
        comment: row.get(8)?,
        start_date: row.get(9)?,
        planned_end_date: row.get(10)?,
        last_updated: row.get(11)?,
        is_active: row.get(12)?,
        last_touched: row.get(13)?,
        detected_polygon: row.get(14)?,
    })
}

impl EventStore for SqliteStore {
    fn get_active(&self, event_id: &str) -> Result<Option<EventRecord>, StoreError> {
        self.conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM closure_events WHERE event_id = ?1 AND is_active = 1"),
                params![event_id],
                row_to_record,
            )
            .optional()
            .map_err(|err| classify_error(event_id, &err))
    }

    fn put(&self, record: &EventRecord) -> Result<(), StoreError> {
        self.conn
            .execute(
                &format!(
                    "INSERT OR REPLACE INTO closure_events ({COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
                ),
                params![
                    record.event_id,
                    record.is_full_closure,
                    record.latitude,
                    record.longitude,
                    record.roadway_name,
                    record.direction_of_travel,
                    record.description,
                    record.event_type,
                    record.comment,
                    record.start_date,
                    record.planned_end_date,
                    record.last_updated,
                    record.is_active,
                    record.last_touched,
                    record.detected_polygon,
                ],
            )
            .map(|_| ())
            .map_err(|err| classify_error(&record.event_id, &err))
    }

    fn update_field(&self, event_id: &str, update: FieldUpdate) -> Result<(), StoreError> {
        let changed = match update {
            FieldUpdate::IsActive(active) => self.conn.execute(
                "UPDATE closure_events SET is_active = ?2 WHERE event_id = ?1",
                params![event_id, active],
            ),
            FieldUpdate::LastTouched(at) => self.conn.execute(
                "UPDATE closure_events SET last_touched = ?2 WHERE event_id = ?1",
                params![event_id, at],
            ),
        }
        .map_err(|err| classify_error(event_id, &err))?;

        if changed == 0 {
            return Err(StoreError::NotFound(event_id.to_string()));
        }
        Ok(())
    }

    fn scan(
        &self,
        filter: &ScanFilter,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<ScanPage, StoreError> {
        let limit = limit.max(1);
        let mut sql = format!("SELECT {COLUMNS} FROM closure_events WHERE 1 = 1");
        let mut args: Vec<Value> = Vec::new();

        if let Some(active) = filter.is_active {
            sql.push_str(" AND is_active = ?");
            args.push(Value::Integer(i64::from(active)));
        }
        if let Some(cutoff) = filter.last_updated_before {
            sql.push_str(" AND last_updated IS NOT NULL AND last_updated < ?");
            args.push(Value::Integer(cutoff));
        }
        if let Some(after) = cursor {
            sql.push_str(" AND event_id > ?");
            args.push(Value::Text(after.to_string()));
        }
        // One extra row tells us whether another page exists.
        sql.push_str(" ORDER BY event_id ASC LIMIT ?");
        args.push(Value::Integer(
            i64::try_from(limit.saturating_add(1)).unwrap_or(i64::MAX),
        ));

        let to_store_err = |err: rusqlite::Error| classify_error(SCAN_SUBJECT, &err);
        let mut stmt = self.conn.prepare(&sql).map_err(to_store_err)?;
        let mut records = stmt
            .query_map(params_from_iter(args), row_to_record)
            .map_err(to_store_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(to_store_err)?;

        let next_cursor = if records.len() > limit {
            records.truncate(limit);
            records.last().map(|record| record.event_id.clone())
        } else {
            None
        };

        Ok(ScanPage {
            records,
            next_cursor,
        })
    }

    fn delete(&self, event_id: &str) -> Result<(), StoreError> {
        self.conn
            .execute(
                "DELETE FROM closure_events WHERE event_id = ?1",
                params![event_id],
            )
            .map(|_| ())
            .map_err(|err| classify_error(event_id, &err))
    }

    fn last_execution_day(&self) -> Result<Option<String>, StoreError> {
        self.conn
            .query_row(
                "SELECT last_execution_day FROM run_markers WHERE name = ?1",
                params![RUN_MARKER_KEY],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| classify_error(RUN_MARKER_KEY, &err))
    }

    fn set_last_execution_day(&self, day: &str) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO run_markers (name, last_execution_day) VALUES (?1, ?2)
                 ON CONFLICT(name) DO UPDATE SET last_execution_day = excluded.last_execution_day",
                params![RUN_MARKER_KEY, day],
            )
            .map(|_| ())
            .map_err(|err| classify_error(RUN_MARKER_KEY, &err))
    }
}
