use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, Row};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::icon::{self, IconError};
use crate::model::AppEntry;
use crate::sort_key::SortKey;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS apps (
    package TEXT PRIMARY KEY,
    icon BLOB NOT NULL,
    label TEXT NOT NULL,
    sort_key TEXT NOT NULL,
    enabled INTEGER NOT NULL
)";

const SELECT_COLUMNS: &str = "SELECT package, icon, label, sort_key, enabled FROM apps";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cache database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("cache directory error: {0}")]
    Io(#[from] std::io::Error),
    #[error("icon for {package_id} cannot be decoded: {source}")]
    Decode {
        package_id: String,
        #[source]
        source: IconError,
    },
}

/// Durable record of known apps, keyed by package id.
///
/// Callers serialize access; implementations only guarantee that each call is
/// durable on its own.
pub trait AppCache: Send + Sync {
    /// All cached entries ordered by label, case-insensitively. Rows whose icon
    /// cannot be decoded are skipped.
    fn load_all(&self) -> Result<Vec<AppEntry>, StoreError>;
    /// Clears the cache and writes `entries` in one transaction.
    fn replace_all(&self, entries: &[AppEntry]) -> Result<(), StoreError>;
    fn upsert(&self, entry: &AppEntry) -> Result<(), StoreError>;
    /// Writes only the enabled flag of an existing row.
    fn update_enabled(&self, entry: &AppEntry) -> Result<(), StoreError>;
    fn remove(&self, package_id: &str) -> Result<(), StoreError>;
}

pub struct SqliteCacheStore {
    conn: Mutex<Connection>,
}

impl SqliteCacheStore {
    pub fn open_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    pub fn open_file(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_from_config(cfg: &Config) -> Result<Self, StoreError> {
        Self::open_file(&cfg.cache_db_path)
    }

    pub fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(SCHEMA, [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn get(&self, package_id: &str) -> Result<Option<AppEntry>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} WHERE package = ?1"))?;
        let mut rows = stmt.query(params![package_id])?;
        match rows.next()? {
            Some(row) => Ok(Some(entry_from_row(row)??)),
            None => Ok(None),
        }
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM apps", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl AppCache for SqliteCacheStore {
    fn load_all(&self) -> Result<Vec<AppEntry>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(SELECT_COLUMNS)?;
        let mut rows = stmt.query([])?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            match entry_from_row(row)? {
                Ok(entry) => entries.push(entry),
                Err(error) => warn!(%error, "skipping cached app row"),
            }
        }
        // SQLite's NOCASE only folds ASCII.
        entries.sort_by(|a, b| a.normalized_label().cmp(b.normalized_label()));
        debug!(count = entries.len(), "loaded app cache");
        Ok(entries)
    }

    fn replace_all(&self, entries: &[AppEntry]) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM apps", [])?;
        {
            let mut insert = tx.prepare(
                "INSERT OR REPLACE INTO apps (package, icon, label, sort_key, enabled)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for entry in entries {
                insert.execute(params![
                    entry.package_id,
                    icon::normalize(&entry.icon),
                    entry.label,
                    entry.sort_key.to_string(),
                    entry.enabled,
                ])?;
            }
        }
        tx.commit()?;
        debug!(count = entries.len(), "replaced app cache");
        Ok(())
    }

    fn upsert(&self, entry: &AppEntry) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO apps (package, icon, label, sort_key, enabled) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(package) DO UPDATE SET icon=excluded.icon, label=excluded.label,
             sort_key=excluded.sort_key, enabled=excluded.enabled",
            params![
                entry.package_id,
                icon::normalize(&entry.icon),
                entry.label,
                entry.sort_key.to_string(),
                entry.enabled,
            ],
        )?;
        Ok(())
    }

    fn update_enabled(&self, entry: &AppEntry) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE apps SET enabled = ?1 WHERE package = ?2",
            params![entry.enabled, entry.package_id],
        )?;
        Ok(())
    }

    fn remove(&self, package_id: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM apps WHERE package = ?1", params![package_id])?;
        Ok(())
    }
}

/// Outer error is a database failure, inner error an undecodable row.
fn entry_from_row(row: &Row<'_>) -> Result<Result<AppEntry, StoreError>, StoreError> {
    let package_id: String = row.get(0)?;
    let icon: Vec<u8> = row.get(1)?;
    let label: String = row.get(2)?;
    let raw_key: String = row.get(3)?;
    let enabled: bool = row.get(4)?;

    if let Err(source) = icon::decode_dimensions(&icon) {
        return Ok(Err(StoreError::Decode { package_id, source }));
    }

    let sort_key = SortKey::parse(&raw_key).unwrap_or_else(|| SortKey::for_label(&label));
    Ok(Ok(AppEntry::with_sort_key(
        package_id, label, icon, enabled, sort_key,
    )))
}
