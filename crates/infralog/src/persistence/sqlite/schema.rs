//! `SQLite` schema definitions for the state store.

/// SQL statement to create the snapshots table.
///
/// Only the latest snapshot is kept; `content` is the state as JSON.
pub const CREATE_SNAPSHOTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    saved_at TEXT NOT NULL,
    serial INTEGER NOT NULL,
    lineage TEXT NOT NULL,
    fingerprint TEXT NOT NULL,
    content TEXT NOT NULL
)
";

/// SQL statement to create the change log table.
pub const CREATE_CHANGES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS changes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    recorded_at TEXT NOT NULL,
    kind TEXT NOT NULL,
    address TEXT NOT NULL,
    resource_type TEXT,
    status TEXT NOT NULL,
    details TEXT NOT NULL
)
";

/// SQL statement to create an index on `recorded_at` for history queries.
pub const CREATE_RECORDED_AT_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_changes_recorded_at ON changes(recorded_at DESC)
";

/// SQL statement to create an index on `resource_type` for filtering.
pub const CREATE_RESOURCE_TYPE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_changes_resource_type ON changes(resource_type)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_SNAPSHOTS_TABLE,
    CREATE_CHANGES_TABLE,
    CREATE_RECORDED_AT_INDEX,
    CREATE_RESOURCE_TYPE_INDEX,
    CREATE_METADATA_TABLE,
];
