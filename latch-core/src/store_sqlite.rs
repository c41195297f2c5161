//! SQLite-backed store implementation.
//! Keys and coordination state persist across process restarts.
//!
//! Enable with the `sqlite` feature flag:
//! ```toml
//! latch-core = { version = "0.1", features = ["sqlite"] }
//! ```

use rusqlite::{Connection, OptionalExtension, params};

use crate::error::StoreError;
use crate::store::KeyValueStore;
use crate::types::{Script, SetCondition, now_ms};

/// A persistent store backend backed by SQLite.
///
/// Uses WAL mode for concurrent read performance. Expired rows are treated
/// as absent and purged on access; `eval_atomic` runs inside a transaction,
/// which gives the scripts their indivisibility.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at the given path.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                expires_at INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_kv_expiry ON kv(expires_at);",
        )?;

        Ok(Self { conn })
    }

    /// Remove the row at `key` if its TTL has elapsed.
    fn purge_expired(conn: &Connection, key: &str, now: u64) -> Result<(), StoreError> {
        conn.execute(
            "DELETE FROM kv WHERE key = ?1 AND expires_at IS NOT NULL AND expires_at <= ?2",
            params![key, now],
        )?;
        Ok(())
    }

    fn live_value(conn: &Connection, key: &str, now: u64) -> Result<Option<String>, StoreError> {
        Self::purge_expired(conn, key, now)?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        Self::live_value(&self.conn, key, now_ms())
    }

    fn set(
        &mut self,
        key: &str,
        value: &str,
        ttl_ms: Option<u64>,
        condition: SetCondition,
    ) -> Result<bool, StoreError> {
        let now = now_ms();
        Self::purge_expired(&self.conn, key, now)?;
        let expires_at = ttl_ms.map(|ttl| now + ttl);

        let changed = match condition {
            SetCondition::Always => self.conn.execute(
                "INSERT INTO kv (key, value, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = ?2, expires_at = ?3",
                params![key, value, expires_at],
            )?,
            SetCondition::IfAbsent => self.conn.execute(
                "INSERT INTO kv (key, value, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO NOTHING",
                params![key, value, expires_at],
            )?,
        };
        Ok(changed > 0)
    }

    fn delete(&mut self, keys: &[String]) -> Result<u64, StoreError> {
        let now = now_ms();
        let mut removed = 0u64;
        for key in keys {
            Self::purge_expired(&self.conn, key, now)?;
            removed += self
                .conn
                .execute("DELETE FROM kv WHERE key = ?1", params![key])? as u64;
        }
        Ok(removed)
    }

    fn multi_get(&mut self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        let now = now_ms();
        keys.iter()
            .map(|key| Self::live_value(&self.conn, key, now))
            .collect()
    }

    fn ttl_ms(&mut self, key: &str) -> Result<Option<u64>, StoreError> {
        let now = now_ms();
        Self::purge_expired(&self.conn, key, now)?;
        let expires_at: Option<Option<u64>> = self
            .conn
            .query_row(
                "SELECT expires_at FROM kv WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(expires_at
            .flatten()
            .map(|at| at.saturating_sub(now)))
    }

    fn eval_atomic(
        &mut self,
        script: Script,
        keys: &[String],
        args: &[String],
    ) -> Result<i64, StoreError> {
        let now = now_ms();
        let tx = self.conn.transaction()?;

        let result = match script {
            Script::CompareAndDelete => {
                if keys.len() != 1 || args.len() != 1 {
                    return Err(StoreError::Script(
                        "compare-and-delete takes one key and one token".into(),
                    ));
                }
                let removed = tx.execute(
                    "DELETE FROM kv WHERE key = ?1 AND value = ?2
                     AND (expires_at IS NULL OR expires_at > ?3)",
                    params![keys[0], args[0], now],
                )?;
                removed as i64
            }
            Script::AcquireAll => {
                if args.len() != keys.len() + 1 {
                    return Err(StoreError::Script(
                        "acquire-all takes a ttl followed by one token per key".into(),
                    ));
                }
                let ttl_ms: u64 = args[0]
                    .parse()
                    .map_err(|_| StoreError::Script(format!("bad ttl '{}'", args[0])))?;

                let mut any_live = false;
                for key in keys {
                    Self::purge_expired(&tx, key, now)?;
                    let exists: Option<i64> = tx
                        .query_row("SELECT 1 FROM kv WHERE key = ?1", params![key], |row| {
                            row.get(0)
                        })
                        .optional()?;
                    if exists.is_some() {
                        any_live = true;
                        break;
                    }
                }
                if any_live {
                    0
                } else {
                    let expires_at = now + ttl_ms;
                    for (key, token) in keys.iter().zip(&args[1..]) {
                        tx.execute(
                            "INSERT OR REPLACE INTO kv (key, value, expires_at) VALUES (?1, ?2, ?3)",
                            params![key, token, expires_at],
                        )?;
                    }
                    1
                }
            }
            Script::ReleaseMatching => {
                if args.len() != keys.len() {
                    return Err(StoreError::Script(
                        "release-matching takes one token per key".into(),
                    ));
                }
                let mut removed = 0i64;
                for (key, token) in keys.iter().zip(args) {
                    removed += tx.execute(
                        "DELETE FROM kv WHERE key = ?1 AND value = ?2
                         AND (expires_at IS NULL OR expires_at > ?3)",
                        params![key, token, now],
                    )? as i64;
                }
                removed
            }
        };

        tx.commit()?;
        Ok(result)
    }
}
