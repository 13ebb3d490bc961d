//! SQLite bucket backend.
//!
//! All buckets share one connection; rows are keyed by `(bucket, key)`.
//! Every write bumps the row's `version`, which doubles as the revision
//! checked by `commit`. Statements run on the blocking pool so the async
//! callers never stall the runtime.

use crate::migration::run_migrations;
use crate::store::{FactStore, Versioned, ABSENT};
use async_trait::async_trait;
use bucket_types::error::{BucketError, BucketResult};
use bucket_types::factoid::{FactSet, Key};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// One bucket inside a shared SQLite database.
#[derive(Clone)]
pub struct SqliteStore {
    name: String,
    conn: Arc<Mutex<Connection>>,
}

fn store_err(e: rusqlite::Error) -> BucketError {
    BucketError::Store(e.to_string())
}

impl SqliteStore {
    /// Create a bucket view over an already migrated connection.
    pub fn new(name: impl Into<String>, conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            name: name.into(),
            conn,
        }
    }

    /// Open (or create) the database file and run migrations.
    pub fn open_connection(path: &Path) -> BucketResult<Arc<Mutex<Connection>>> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(store_err)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })
        .map_err(store_err)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(store_err)?;
        run_migrations(&conn).map_err(store_err)?;
        debug!(path = %path.display(), "Opened bucket database");
        Ok(Arc::new(Mutex::new(conn)))
    }

    /// An in-memory database, for tests.
    pub fn open_in_memory() -> BucketResult<Arc<Mutex<Connection>>> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        run_migrations(&conn).map_err(store_err)?;
        Ok(Arc::new(Mutex::new(conn)))
    }

    /// Run `op` against the connection on the blocking pool.
    async fn blocking<T, F>(&self, op: F) -> BucketResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection, &str) -> BucketResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let bucket = self.name.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| BucketError::Internal(e.to_string()))?;
            op(&mut *conn, &bucket)
        })
        .await
        .map_err(|e| BucketError::Internal(format!("spawn_blocking join failed: {e}")))?
    }
}

fn read_row(conn: &Connection, bucket: &str, key: &str) -> BucketResult<Versioned> {
    let result = conn.query_row(
        "SELECT version, value FROM facts WHERE bucket = ?1 AND key = ?2",
        rusqlite::params![bucket, key],
        |row| {
            let version: i64 = row.get(0)?;
            let value: String = row.get(1)?;
            Ok((version, value))
        },
    );
    match result {
        Ok((version, value)) => {
            let set: FactSet = serde_json::from_str(&value)
                .map_err(|e| BucketError::Serialization(e.to_string()))?;
            Ok(Versioned {
                revision: version as u64,
                value: Some(set),
            })
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(Versioned::default()),
        Err(e) => Err(store_err(e)),
    }
}

fn write_row(conn: &Connection, bucket: &str, key: &str, version: u64, set: &FactSet) -> BucketResult<()> {
    let value = serde_json::to_string(set).map_err(|e| BucketError::Serialization(e.to_string()))?;
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO facts (bucket, key, value, version, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(bucket, key) DO UPDATE SET value = ?3, version = ?4, updated_at = ?5",
        rusqlite::params![bucket, key, value, version as i64, now],
    )
    .map_err(store_err)?;
    Ok(())
}

#[async_trait]
impl FactStore for SqliteStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &Key) -> BucketResult<Versioned> {
        let key = key.as_str().to_string();
        self.blocking(move |conn, bucket| read_row(conn, bucket, &key))
            .await
    }

    async fn commit(&self, key: &Key, expected: u64, value: Option<FactSet>) -> BucketResult<u64> {
        let key = key.as_str().to_string();
        self.blocking(move |conn, bucket| {
            let tx = conn.transaction().map_err(store_err)?;
            let actual = tx
                .query_row(
                    "SELECT version FROM facts WHERE bucket = ?1 AND key = ?2",
                    rusqlite::params![bucket, key],
                    |row| row.get::<_, i64>(0),
                )
                .optional()
                .map_err(store_err)?
                .map(|v| v as u64)
                .unwrap_or(ABSENT);
            if actual != expected {
                return Err(BucketError::Conflict {
                    key,
                    expected,
                    actual,
                });
            }
            let revision = match value {
                Some(set) => {
                    write_row(&tx, bucket, &key, actual + 1, &set)?;
                    actual + 1
                }
                None => {
                    tx.execute(
                        "DELETE FROM facts WHERE bucket = ?1 AND key = ?2",
                        rusqlite::params![bucket, key],
                    )
                    .map_err(store_err)?;
                    ABSENT
                }
            };
            tx.commit().map_err(store_err)?;
            Ok(revision)
        })
        .await
    }

    async fn set(&self, key: &Key, value: FactSet) -> BucketResult<()> {
        let key = key.as_str().to_string();
        self.blocking(move |conn, bucket| {
            let tx = conn.transaction().map_err(store_err)?;
            let current = read_row(&tx, bucket, &key)?.revision;
            write_row(&tx, bucket, &key, current + 1, &value)?;
            tx.commit().map_err(store_err)
        })
        .await
    }

    async fn delete(&self, key: &Key) -> BucketResult<()> {
        let key = key.as_str().to_string();
        self.blocking(move |conn, bucket| {
            conn.execute(
                "DELETE FROM facts WHERE bucket = ?1 AND key = ?2",
                rusqlite::params![bucket, key],
            )
            .map_err(store_err)?;
            Ok(())
        })
        .await
    }
}
