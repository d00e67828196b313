//! Durable token registry backed by SQLite.
//!
//! Records are stored as JSON blobs keyed by address, plus a small
//! key/value table for the chain-scan checkpoint. WAL mode keeps the
//! single writer from blocking concurrent readers.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::TokenRecord;

const CHECKPOINT_KEY: &str = "chain_scan_checkpoint";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("record serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct RegistryStore {
    conn: Mutex<Connection>,
    upsert_batch: usize,
}

impl RegistryStore {
    pub fn open<P: AsRef<Path>>(path: P, upsert_batch: usize) -> Result<Self, StorageError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path.as_ref())?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS tokens (
                 address    TEXT PRIMARY KEY,
                 record     TEXT NOT NULL,
                 updated_at INTEGER NOT NULL
             ) WITHOUT ROWID;
             CREATE TABLE IF NOT EXISTS scan_state (
                 key   TEXT PRIMARY KEY,
                 value TEXT NOT NULL
             ) WITHOUT ROWID;",
        )?;
        info!(path = %path.as_ref().display(), "registry store opened");
        Ok(Self {
            conn: Mutex::new(conn),
            upsert_batch: upsert_batch.max(1),
        })
    }

    /// All persisted records. Rows that no longer deserialize (schema
    /// drift across versions) are skipped with a warning rather than
    /// failing startup.
    pub fn load_all(&self) -> Result<Vec<TokenRecord>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT address, record FROM tokens")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (address, json) = row?;
            match serde_json::from_str::<TokenRecord>(&json) {
                Ok(rec) => records.push(rec),
                Err(err) => {
                    warn!(address = %address, error = %err, "skipping unreadable stored record");
                }
            }
        }
        Ok(records)
    }

    /// Upsert the given records in bounded transactions.
    pub fn upsert(&self, records: &[TokenRecord]) -> Result<(), StorageError> {
        if records.is_empty() {
            return Ok(());
        }
        let now = chrono::Utc::now().timestamp();
        let mut conn = self.conn.lock();
        for chunk in records.chunks(self.upsert_batch) {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO tokens (address, record, updated_at)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(address) DO UPDATE SET
                         record = excluded.record,
                         updated_at = excluded.updated_at",
                )?;
                for rec in chunk {
                    let json = serde_json::to_string(rec)?;
                    stmt.execute(params![rec.address, json, now])?;
                }
            }
            tx.commit()?;
        }
        debug!(count = records.len(), "registry records persisted");
        Ok(())
    }

    pub fn checkpoint(&self) -> Result<Option<u64>, StorageError> {
        let conn = self.conn.lock();
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM scan_state WHERE key = ?1",
                params![CHECKPOINT_KEY],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        Ok(value.and_then(|v| v.parse().ok()))
    }

    pub fn set_checkpoint(&self, block: u64) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO scan_state (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![CHECKPOINT_KEY, block.to_string()],
        )?;
        Ok(())
    }
}
