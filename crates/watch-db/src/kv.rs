//! JSON documents addressed by key (stream/schedule snapshots, watch settings).

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{Database, DbError, OptionalExt};

impl Database {
    /// Raw JSON text stored under `key`.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, DbError> {
        self.with_conn(|conn| {
            let value = conn
                .query_row("SELECT value FROM kv_store WHERE key = ?1", [key], |row| {
                    row.get::<_, String>(0)
                })
                .optional()?;
            Ok(value)
        })
    }

    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)
                 ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = CURRENT_TIMESTAMP",
                rusqlite::params![key, value],
            )?;
            Ok(())
        })
    }

    /// Delete several keys in one transaction. Returns the number of rows removed.
    pub fn kv_remove(&self, keys: &[&str]) -> Result<usize, DbError> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut removed = 0;
            {
                let mut stmt = tx.prepare("DELETE FROM kv_store WHERE key = ?1")?;
                for key in keys {
                    removed += stmt.execute([key])?;
                }
            }
            tx.commit()?;
            Ok(removed)
        })
    }

    pub fn kv_get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DbError> {
        match self.kv_get(key)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| DbError::InvalidData(format!("{key}: {e}"))),
            None => Ok(None),
        }
    }

    pub fn kv_set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), DbError> {
        let raw = serde_json::to_string(value)
            .map_err(|e| DbError::InvalidData(format!("{key}: {e}")))?;
        self.kv_set(key, &raw)
    }
}
