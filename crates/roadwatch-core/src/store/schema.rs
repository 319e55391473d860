//! SQLite schema for the closure state store.
//!
//! - `closure_events` holds one row per upstream `EventID`
//! - `run_markers` holds named singleton markers (the sweeper's `LastCleanup`)
//! - `store_meta` records the applied schema version

/// Migration v1: core tables.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS closure_events (
    event_id TEXT PRIMARY KEY,
    is_full_closure INTEGER NOT NULL CHECK (is_full_closure IN (0, 1)),
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    roadway_name TEXT NOT NULL DEFAULT '',
    direction_of_travel TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    event_type TEXT NOT NULL DEFAULT '',
    comment TEXT,
    start_date INTEGER NOT NULL,
    planned_end_date INTEGER,
    last_updated INTEGER,
    is_active INTEGER NOT NULL CHECK (is_active IN (0, 1)),
    last_touched INTEGER,
    detected_polygon TEXT,
    CHECK (length(event_id) > 0)
);

CREATE TABLE IF NOT EXISTS run_markers (
    name TEXT PRIMARY KEY,
    last_execution_day TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL
);

INSERT OR IGNORE INTO store_meta (id, schema_version) VALUES (1, 1);
";

/// Migration v2: indexes for the active-record scan and the retention sweep.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_closure_events_active
    ON closure_events(is_active, event_id);

CREATE INDEX IF NOT EXISTS idx_closure_events_inactive_updated
    ON closure_events(last_updated)
    WHERE is_active = 0;
";
