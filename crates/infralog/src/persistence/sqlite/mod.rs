//! `SQLite` state store with change history.
//!
//! The database holds the latest state snapshot and one row per resource or
//! output change ever detected, which `infralog history` reads back.

pub mod migrations;
pub mod schema;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::StateStore;
use crate::error::{Error, Result};
use crate::tfstate::{fingerprint, DiffStatus, State, StateDiff};

/// What a change row describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// A resource change.
    Resource,
    /// An output change.
    Output,
}

impl ChangeKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Resource => "resource",
            Self::Output => "output",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the change history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Row id.
    pub id: i64,
    /// When the change was detected.
    pub recorded_at: DateTime<Utc>,
    /// Resource or output.
    pub kind: ChangeKind,
    /// Resource address or output name.
    pub address: String,
    /// Resource type; `None` for outputs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    /// Kind of change.
    pub status: DiffStatus,
    /// Attribute diffs for resources, the value diff for outputs.
    pub details: Value,
}

/// Database statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Serial of the saved snapshot.
    pub snapshot_serial: Option<u64>,
    /// When the snapshot was saved.
    pub snapshot_saved_at: Option<DateTime<Utc>>,
    /// Number of recorded changes.
    pub total_changes: i64,
    /// Oldest recorded change.
    pub oldest_change: Option<DateTime<Utc>>,
    /// Newest recorded change.
    pub newest_change: Option<DateTime<Utc>>,
    /// Database file size in bytes.
    pub db_size_bytes: u64,
}

/// State store backed by `SQLite`.
#[derive(Debug)]
pub struct SqliteStore {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema
    /// initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::internal("database lock poisoned"))
    }

    /// The most recent changes, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn recent_changes(&self, limit: usize) -> Result<Vec<ChangeRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r"
            SELECT id, recorded_at, kind, address, resource_type, status, details
            FROM changes ORDER BY recorded_at DESC, id DESC LIMIT ?1
            ",
        )?;

        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map([limit_i64], |row| {
                Ok(RawChange {
                    id: row.get(0)?,
                    recorded_at: row.get(1)?,
                    kind: row.get(2)?,
                    address: row.get(3)?,
                    resource_type: row.get(4)?,
                    status: row.get(5)?,
                    details: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(RawChange::into_record).collect()
    }

    /// Number of recorded changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count_changes(&self) -> Result<i64> {
        let count = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM changes", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StoreStats> {
        let total_changes = self.count_changes()?;
        let conn = self.conn()?;

        let snapshot: Option<(i64, String)> = conn
            .query_row(
                "SELECT serial, saved_at FROM snapshots ORDER BY id DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let (oldest, newest): (Option<String>, Option<String>) = conn.query_row(
            "SELECT MIN(recorded_at), MAX(recorded_at) FROM changes",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StoreStats {
            snapshot_serial: snapshot
                .as_ref()
                .and_then(|(serial, _)| u64::try_from(*serial).ok()),
            snapshot_saved_at: snapshot.and_then(|(_, at)| parse_timestamp(&at)),
            total_changes,
            oldest_change: oldest.as_deref().and_then(parse_timestamp),
            newest_change: newest.as_deref().and_then(parse_timestamp),
            db_size_bytes,
        })
    }
}

impl StateStore for SqliteStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn location(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Option<State>> {
        let content: Option<String> = self
            .conn()?
            .query_row(
                "SELECT content FROM snapshots ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        content
            .map(|c| {
                serde_json::from_str(&c)
                    .map_err(|e| Error::persistence(&self.path, format!("corrupt snapshot: {e}")))
            })
            .transpose()
    }

    fn save(&self, state: &State) -> Result<()> {
        let content = serde_json::to_string(state)?;
        let serial = i64::try_from(state.serial).unwrap_or(i64::MAX);

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM snapshots", [])?;
        tx.execute(
            r"
            INSERT INTO snapshots (saved_at, serial, lineage, fingerprint, content)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![
                Utc::now().to_rfc3339(),
                serial,
                state.lineage,
                fingerprint(content.as_bytes()),
                content,
            ],
        )?;
        tx.commit()?;

        debug!(serial = state.serial, "saved snapshot");
        Ok(())
    }

    fn record(&self, diff: &StateDiff) -> Result<()> {
        let recorded_at = Utc::now().to_rfc3339();
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r"
                INSERT INTO changes (recorded_at, kind, address, resource_type, status, details)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ",
            )?;

            for rd in &diff.resource_diffs {
                stmt.execute(params![
                    recorded_at,
                    ChangeKind::Resource.as_str(),
                    rd.address,
                    rd.resource_type,
                    rd.status.as_str(),
                    serde_json::to_string(&rd.attribute_diffs)?,
                ])?;
            }

            for od in &diff.output_diffs {
                stmt.execute(params![
                    recorded_at,
                    ChangeKind::Output.as_str(),
                    od.output_name,
                    Option::<String>::None,
                    od.status.as_str(),
                    serde_json::to_string(&od.value_diff)?,
                ])?;
            }
        }
        tx.commit()?;

        debug!(changes = diff.len(), "recorded change history");
        Ok(())
    }
}

/// A change row as stored, before decoding.
struct RawChange {
    id: i64,
    recorded_at: String,
    kind: String,
    address: String,
    resource_type: Option<String>,
    status: String,
    details: String,
}

impl RawChange {
    fn into_record(self) -> Result<ChangeRecord> {
        let kind = serde_json::from_value(Value::String(self.kind))?;
        let status = serde_json::from_value(Value::String(self.status))?;
        let recorded_at = parse_timestamp(&self.recorded_at).ok_or_else(|| {
            Error::internal(format!("invalid timestamp in change {}", self.id))
        })?;

        Ok(ChangeRecord {
            id: self.id,
            recorded_at,
            kind,
            address: self.address,
            resource_type: self.resource_type,
            status,
            details: serde_json::from_str(&self.details)?,
        })
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
