//! SQLite-backed key-value storage.
//!
//! Holds the block queue and the active index between runs. Every read and
//! write failure is logged and swallowed at the [`BlockStore`] boundary so the
//! scheduler never fails because the disk did.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use super::{data_dir, BlockStore};
use crate::block::Block;
use crate::error::{DatabaseError, Result};

const BLOCKS_KEY: &str = "blocks";
const ACTIVE_INDEX_KEY: &str = "active_index";

/// SQLite database for queue persistence.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `<data_dir>/agendatimer.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(&data_dir()?.join("agendatimer.db"))
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )
    }

    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
    }

    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<(), rusqlite::Error> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn read_blocks(&self) -> Result<Vec<Block>> {
        match self.kv_get(BLOCKS_KEY)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    fn write_blocks(&self, blocks: &[Block]) -> Result<()> {
        let json = serde_json::to_string(blocks)?;
        self.kv_set(BLOCKS_KEY, &json)?;
        Ok(())
    }
}

impl BlockStore for Database {
    fn load_blocks(&self) -> Vec<Block> {
        self.read_blocks().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load blocks, starting empty");
            Vec::new()
        })
    }

    fn load_active_index(&self) -> Option<usize> {
        match self.kv_get(ACTIVE_INDEX_KEY) {
            Ok(value) => value.and_then(|v| v.parse().ok()),
            Err(e) => {
                tracing::warn!(error = %e, "failed to load active index");
                None
            }
        }
    }

    fn save_blocks(&mut self, blocks: &[Block]) {
        if let Err(e) = self.write_blocks(blocks) {
            tracing::warn!(error = %e, "failed to save blocks");
        }
    }

    fn save_active_index(&mut self, index: Option<usize>) {
        let result = match index {
            Some(i) => self.kv_set(ACTIVE_INDEX_KEY, &i.to_string()),
            None => self.kv_delete(ACTIVE_INDEX_KEY),
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to save active index");
        }
    }

    fn clear(&mut self) {
        for key in [BLOCKS_KEY, ACTIVE_INDEX_KEY] {
            if let Err(e) = self.kv_delete(key) {
                tracing::warn!(error = %e, key, "failed to clear stored queue");
            }
        }
    }
}
