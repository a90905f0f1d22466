//! SQLite correspondence table between local objects and catalog resources.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info, warn};

use crate::data::{MappingRecord, ObjectKind};
use crate::error::{StoreError, StoreResult};

const MAPPING_SELECT_SQL: &str = "SELECT
    local_id,
    local_kind,
    remote_id,
    remote_global_id,
    display_name,
    content_hash,
    last_synced_at
FROM mappings";

struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: "CREATE TABLE IF NOT EXISTS mappings (
            local_id INTEGER NOT NULL,
            local_kind TEXT NOT NULL,
            remote_id INTEGER NOT NULL,
            remote_global_id TEXT NOT NULL,
            display_name TEXT NOT NULL,
            content_hash TEXT,
            last_synced_at TEXT NOT NULL,
            PRIMARY KEY (local_id, local_kind),
            UNIQUE (local_kind, remote_id)
        );",
}];

pub trait MappingStore: Send + Sync {
    fn find(&self, local_id: i64, kind: ObjectKind) -> StoreResult<Option<MappingRecord>>;

    /// Inserts or replaces the record for `(local_id, local_kind)`.
    fn upsert(&self, record: &MappingRecord) -> StoreResult<()>;

    /// Returns whether a record was removed.
    fn remove(&self, local_id: i64, kind: ObjectKind) -> StoreResult<bool>;

    fn list(&self, kind: Option<ObjectKind>) -> StoreResult<Vec<MappingRecord>>;
}

pub struct SqliteMappingStore {
    conn: Mutex<Connection>,
}

impl SqliteMappingStore {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let started_at = Instant::now();
        let conn = Connection::open(path.as_ref())?;
        let store = Self::bootstrap(conn)?;

        info!(
            path = %path.as_ref().display(),
            duration_ms = started_at.elapsed().as_millis() as u64,
            "mapping store opened"
        );

        Ok(store)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::bootstrap(Connection::open_in_memory()?)
    }

    fn bootstrap(mut conn: Connection) -> StoreResult<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        apply_migrations(&mut conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl MappingStore for SqliteMappingStore {
    fn find(&self, local_id: i64, kind: ObjectKind) -> StoreResult<Option<MappingRecord>> {
        let conn = self.conn();
        let record = conn
            .query_row(
                &format!("{MAPPING_SELECT_SQL} WHERE local_id = ?1 AND local_kind = ?2"),
                params![local_id, kind.as_str()],
                read_row,
            )
            .optional()?;

        record.transpose()
    }

    fn upsert(&self, record: &MappingRecord) -> StoreResult<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let displaced = tx.execute(
            "DELETE FROM mappings
             WHERE local_kind = ?1 AND remote_id = ?2 AND local_id != ?3",
            params![
                record.local_kind.as_str(),
                record.remote_id,
                record.local_id
            ],
        )?;
        if displaced > 0 {
            warn!(
                object_id = record.local_id,
                kind = %record.local_kind,
                remote_id = record.remote_id,
                displaced,
                "remote id was claimed by another local object; keeping the newest claim"
            );
        }

        tx.execute(
            "INSERT INTO mappings (
                local_id,
                local_kind,
                remote_id,
                remote_global_id,
                display_name,
                content_hash,
                last_synced_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (local_id, local_kind) DO UPDATE SET
                remote_id = excluded.remote_id,
                remote_global_id = excluded.remote_global_id,
                display_name = excluded.display_name,
                content_hash = excluded.content_hash,
                last_synced_at = excluded.last_synced_at;",
            params![
                record.local_id,
                record.local_kind.as_str(),
                record.remote_id,
                record.remote_global_id,
                record.display_name,
                record.content_hash,
                record.last_synced_at.to_rfc3339(),
            ],
        )?;
        tx.commit()?;

        debug!(
            object_id = record.local_id,
            kind = %record.local_kind,
            remote_id = record.remote_id,
            "mapping stored"
        );

        Ok(())
    }

    fn remove(&self, local_id: i64, kind: ObjectKind) -> StoreResult<bool> {
        let conn = self.conn();
        let removed = conn.execute(
            "DELETE FROM mappings WHERE local_id = ?1 AND local_kind = ?2",
            params![local_id, kind.as_str()],
        )?;

        Ok(removed > 0)
    }

    fn list(&self, kind: Option<ObjectKind>) -> StoreResult<Vec<MappingRecord>> {
        let conn = self.conn();
        let mut statement = conn.prepare(&format!(
            "{MAPPING_SELECT_SQL}
             WHERE (?1 IS NULL OR local_kind = ?1)
             ORDER BY local_kind, local_id"
        ))?;

        let rows = statement.query_map(params![kind.map(ObjectKind::as_str)], read_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row??);
        }

        Ok(records)
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<StoreResult<MappingRecord>> {
    let local_id: i64 = row.get(0)?;
    let local_kind: String = row.get(1)?;
    let remote_id: i64 = row.get(2)?;
    let remote_global_id: String = row.get(3)?;
    let display_name: String = row.get(4)?;
    let content_hash: Option<String> = row.get(5)?;
    let last_synced_at: String = row.get(6)?;

    Ok(decode_record(
        local_id,
        &local_kind,
        remote_id,
        remote_global_id,
        display_name,
        content_hash,
        &last_synced_at,
    ))
}

fn decode_record(
    local_id: i64,
    local_kind: &str,
    remote_id: i64,
    remote_global_id: String,
    display_name: String,
    content_hash: Option<String>,
    last_synced_at: &str,
) -> StoreResult<MappingRecord> {
    let local_kind = local_kind
        .parse::<ObjectKind>()
        .map_err(|err| StoreError::InvalidData(err.to_string()))?;
    let last_synced_at = DateTime::parse_from_rfc3339(last_synced_at)
        .map_err(|err| {
            StoreError::InvalidData(format!("bad last_synced_at `{last_synced_at}`: {err}"))
        })?
        .with_timezone(&Utc);

    Ok(MappingRecord {
        local_id,
        local_kind,
        remote_id,
        remote_global_id,
        display_name,
        content_hash,
        last_synced_at,
    })
}

pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

fn apply_migrations(conn: &mut Connection) -> StoreResult<()> {
    let current_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let latest = latest_version();

    if current_version > latest {
        return Err(StoreError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
    }
    tx.commit()?;

    Ok(())
}
