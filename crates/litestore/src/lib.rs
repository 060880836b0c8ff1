//! litestore - SQLite persistence for the kvfs key-value model
//!
//! Keys live in three tables, one per value shape: `strings` holds byte
//! content, `hashes` holds one row per field, `sets` one row per member.
//! A hash or set key exists exactly as long as it has rows, which gives
//! the same disappear-when-empty behavior as the in-memory backend. A
//! batch runs inside a single SQL transaction and rolls back entirely
//! when any mutation fails.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};

use kvfs::glob::glob_match;
use kvfs::{Batch, KvStore, Mutation, StoreError, StoreResult};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS strings (
    k TEXT PRIMARY KEY,
    v BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS hashes (
    k TEXT NOT NULL,
    field TEXT NOT NULL,
    v TEXT NOT NULL,
    PRIMARY KEY (k, field)
);

CREATE TABLE IF NOT EXISTS sets (
    k TEXT NOT NULL,
    member TEXT NOT NULL,
    PRIMARY KEY (k, member)
);
"#;

/// A [`KvStore`] persisted in a single SQLite database file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref()).map_err(to_backend)?;
        conn.execute_batch(SCHEMA).map_err(to_backend)?;
        debug!("opened database at {}", path.as_ref().display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory database (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(to_backend)?;
        conn.execute_batch(SCHEMA).map_err(to_backend)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

fn to_backend(e: rusqlite::Error) -> StoreError {
    StoreError::backend(e.to_string())
}

// Whether `table` has any row for `key`. Table names are compile-time
// constants, never caller input.
fn occupied(conn: &Connection, table: &str, key: &str) -> StoreResult<bool> {
    let sql = format!("SELECT EXISTS (SELECT 1 FROM {table} WHERE k = ?1)");
    let n: i64 = conn
        .query_row(&sql, params![key], |row| row.get(0))
        .map_err(to_backend)?;
    Ok(n != 0)
}

// Errors when `key` is present in any of `tables`; used to reject an
// operation aimed at a key of another shape.
fn reject_other_kinds(
    conn: &Connection,
    key: &str,
    tables: [&str; 2],
    expected: &'static str,
) -> StoreResult<()> {
    for table in tables {
        if occupied(conn, table, key)? {
            return Err(StoreError::wrong_kind(key, expected));
        }
    }
    Ok(())
}

fn apply_one(conn: &Connection, mutation: Mutation) -> StoreResult<()> {
    match mutation {
        Mutation::PutString { key, value } => {
            conn.execute("DELETE FROM hashes WHERE k = ?1", params![key])
                .map_err(to_backend)?;
            conn.execute("DELETE FROM sets WHERE k = ?1", params![key])
                .map_err(to_backend)?;
            conn.execute(
                "INSERT OR REPLACE INTO strings (k, v) VALUES (?1, ?2)",
                params![key, value],
            )
            .map_err(to_backend)?;
        }
        Mutation::AppendString { key, value } => {
            reject_other_kinds(conn, &key, ["hashes", "sets"], "string")?;
            conn.execute(
                "INSERT INTO strings (k, v) VALUES (?1, ?2)
                 ON CONFLICT(k) DO UPDATE SET v = v || excluded.v",
                params![key, value],
            )
            .map_err(to_backend)?;
        }
        Mutation::PutHash { key, fields } => {
            if fields.is_empty() {
                return Ok(());
            }
            reject_other_kinds(conn, &key, ["strings", "sets"], "hash")?;
            for (field, value) in fields {
                conn.execute(
                    "INSERT OR REPLACE INTO hashes (k, field, v) VALUES (?1, ?2, ?3)",
                    params![key, field, value],
                )
                .map_err(to_backend)?;
            }
        }
        Mutation::DropHashFields { key, fields } => {
            reject_other_kinds(conn, &key, ["strings", "sets"], "hash")?;
            for field in fields {
                conn.execute(
                    "DELETE FROM hashes WHERE k = ?1 AND field = ?2",
                    params![key, field],
                )
                .map_err(to_backend)?;
            }
        }
        Mutation::AddMember { key, member } => {
            reject_other_kinds(conn, &key, ["strings", "hashes"], "set")?;
            conn.execute(
                "INSERT OR IGNORE INTO sets (k, member) VALUES (?1, ?2)",
                params![key, member],
            )
            .map_err(to_backend)?;
        }
        Mutation::RemoveMember { key, member } => {
            reject_other_kinds(conn, &key, ["strings", "hashes"], "set")?;
            conn.execute(
                "DELETE FROM sets WHERE k = ?1 AND member = ?2",
                params![key, member],
            )
            .map_err(to_backend)?;
        }
        Mutation::DeleteKeys { keys } => {
            for key in keys {
                for table in ["strings", "hashes", "sets"] {
                    let sql = format!("DELETE FROM {table} WHERE k = ?1");
                    conn.execute(&sql, params![key]).map_err(to_backend)?;
                }
            }
        }
        Mutation::RenameKey { from, to } => {
            let present = occupied(conn, "strings", &from)?
                || occupied(conn, "hashes", &from)?
                || occupied(conn, "sets", &from)?;
            if !present {
                return Err(StoreError::missing_key(&from));
            }
            for table in ["strings", "hashes", "sets"] {
                let delete = format!("DELETE FROM {table} WHERE k = ?1");
                conn.execute(&delete, params![to]).map_err(to_backend)?;
                let update = format!("UPDATE {table} SET k = ?1 WHERE k = ?2");
                conn.execute(&update, params![to, from]).map_err(to_backend)?;
            }
        }
    }
    Ok(())
}

#[async_trait]
impl KvStore for SqliteStore {
    async fn get_string(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let conn = self.lock()?;
        let value: Option<Vec<u8>> = conn
            .query_row("SELECT v FROM strings WHERE k = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(to_backend)?;
        if value.is_none() {
            reject_other_kinds(&conn, key, ["hashes", "sets"], "string")?;
        }
        Ok(value)
    }

    async fn string_len(&self, key: &str) -> StoreResult<i64> {
        let conn = self.lock()?;
        let len: Option<i64> = conn
            .query_row(
                "SELECT length(v) FROM strings WHERE k = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(to_backend)?;
        if len.is_none() {
            reject_other_kinds(&conn, key, ["hashes", "sets"], "string")?;
        }
        Ok(len.unwrap_or(0))
    }

    async fn hash_get(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        let conn = self.lock()?;
        let value: Option<String> = conn
            .query_row(
                "SELECT v FROM hashes WHERE k = ?1 AND field = ?2",
                params![key, field],
                |row| row.get(0),
            )
            .optional()
            .map_err(to_backend)?;
        if value.is_none() && !occupied(&conn, "hashes", key)? {
            reject_other_kinds(&conn, key, ["strings", "sets"], "hash")?;
        }
        Ok(value)
    }

    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT field, v FROM hashes WHERE k = ?1")
            .map_err(to_backend)?;
        let rows = stmt
            .query_map(params![key], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(to_backend)?;
        let mut fields = HashMap::new();
        for row in rows {
            let (field, value) = row.map_err(to_backend)?;
            fields.insert(field, value);
        }
        if fields.is_empty() {
            reject_other_kinds(&conn, key, ["strings", "sets"], "hash")?;
        }
        Ok(fields)
    }

    async fn hash_set_nx(&self, key: &str, field: &str, value: &str) -> StoreResult<bool> {
        let conn = self.lock()?;
        reject_other_kinds(&conn, key, ["strings", "sets"], "hash")?;
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO hashes (k, field, v) VALUES (?1, ?2, ?3)",
                params![key, field, value],
            )
            .map_err(to_backend)?;
        Ok(inserted > 0)
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT member FROM sets WHERE k = ?1")
            .map_err(to_backend)?;
        let rows = stmt
            .query_map(params![key], |row| row.get::<_, String>(0))
            .map_err(to_backend)?;
        let mut members = Vec::new();
        for row in rows {
            members.push(row.map_err(to_backend)?);
        }
        if members.is_empty() {
            reject_other_kinds(&conn, key, ["strings", "hashes"], "set")?;
        }
        Ok(members)
    }

    async fn set_len(&self, key: &str) -> StoreResult<i64> {
        let conn = self.lock()?;
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sets WHERE k = ?1",
                params![key],
                |row| row.get(0),
            )
            .map_err(to_backend)?;
        if n == 0 {
            reject_other_kinds(&conn, key, ["strings", "hashes"], "set")?;
        }
        Ok(n)
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let conn = self.lock()?;
        for table in ["strings", "hashes", "sets"] {
            if occupied(&conn, table, key)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn scan_keys(&self, pattern: &str) -> StoreResult<Vec<String>> {
        let conn = self.lock()?;
        let mut keys = Vec::new();
        for table in ["strings", "hashes", "sets"] {
            let sql = format!("SELECT DISTINCT k FROM {table}");
            let mut stmt = conn.prepare(&sql).map_err(to_backend)?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(to_backend)?;
            for row in rows {
                keys.push(row.map_err(to_backend)?);
            }
        }
        keys.sort();
        keys.dedup();
        keys.retain(|key| glob_match(pattern, key));
        Ok(keys)
    }

    async fn apply(&self, batch: Batch) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(to_backend)?;
        for mutation in batch.into_mutations() {
            apply_one(&tx, mutation)?;
        }
        tx.commit().map_err(to_backend)
    }
}
