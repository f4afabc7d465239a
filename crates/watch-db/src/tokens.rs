//! Per-platform OAuth token storage.

use serde::{Deserialize, Serialize};

use crate::{Database, DbError, OptionalExt};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub platform: String,
    pub access_token: String,
    pub refresh_token: String,
    pub scope: String,
    pub user_id: String,
    pub expires_at: i64,
}

impl Database {
    pub fn save_token(&self, token: &Token) -> Result<(), DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tokens (platform, access_token, refresh_token, scope, user_id, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    token.platform,
                    token.access_token,
                    token.refresh_token,
                    token.scope,
                    token.user_id,
                    token.expires_at
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_latest_token(&self, platform: &str) -> Result<Option<Token>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT platform, access_token, refresh_token, scope, user_id, expires_at
                 FROM tokens WHERE platform = ?1 ORDER BY id DESC LIMIT 1",
            )?;
            let token = stmt
                .query_row([platform], |row| {
                    Ok(Token {
                        platform: row.get(0)?,
                        access_token: row.get(1)?,
                        refresh_token: row.get(2)?,
                        scope: row.get(3)?,
                        user_id: row.get(4)?,
                        expires_at: row.get(5)?,
                    })
                })
                .optional()?;
            Ok(token)
        })
    }

    pub fn delete_tokens(&self, platform: &str) -> Result<(), DbError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM tokens WHERE platform = ?1", [platform])?;
            Ok(())
        })
    }
}
