//! Transactional document backend on SQLite.
//!
//! ## Physical schema (version 1)
//!
//! | Object | Shape |
//! |--------|-------|
//! | `keyvalue` | `key TEXT PRIMARY KEY, value TEXT NOT NULL` |
//! | `collections` | `collection TEXT, id TEXT, value TEXT`, primary key `(collection, id)` |
//! | `by_collection` | non-unique index on `collections(collection)` |
//!
//! The version is stamped in `PRAGMA user_version`. Renaming any of these or
//! changing the key shape needs a version bump and a migration step.
//!
//! ## Connection lifecycle
//!
//! The pool opens lazily on the first operation. Racing first callers share a
//! single open attempt. A failed open is not remembered: the next operation
//! tries again. [`DocumentStorage::close`] drops the pool and a later
//! operation reconnects.
//!
//! Write transactions start with `BEGIN IMMEDIATE` so concurrent writers queue
//! on the busy timeout instead of failing when a read lock upgrades.

use async_trait::async_trait;
use bridge_traits::{
    error::{StorageError, StorageResult},
    listeners::{ListenerRegistry, Subscription},
    storage::{ChangeEvent, ChangeListener, KeyNamespace, StorageAdapter, StoredValue},
};
use parking_lot::Mutex;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

pub const SCHEMA_VERSION: i64 = 1;

const BEGIN_WRITE: &str = "BEGIN IMMEDIATE";

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS keyvalue (
        key TEXT PRIMARY KEY NOT NULL,
        value TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS collections (
        collection TEXT NOT NULL,
        id TEXT NOT NULL,
        value TEXT NOT NULL,
        PRIMARY KEY (collection, id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS by_collection ON collections (collection)",
];

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentLocation {
    File(PathBuf),
    InMemory,
}

/// Translate a sqlx failure into the storage taxonomy.
///
/// SQLite primary result codes: 13 FULL, 3 PERM, 8 READONLY, 23 AUTH,
/// 14 CANTOPEN, 5 BUSY, 6 LOCKED, 11 CORRUPT, 26 NOTADB.
fn map_sqlx_error(err: sqlx::Error, context: &str) -> StorageError {
    let message = format!("{}: {}", context, err);
    match &err {
        sqlx::Error::Database(db) => {
            let primary = db
                .code()
                .and_then(|code| code.parse::<i32>().ok())
                .map(|code| code & 0xff);
            match primary {
                Some(13) => StorageError::QuotaExceeded(message),
                Some(3) | Some(8) | Some(23) => StorageError::PermissionDenied(message),
                Some(14) | Some(5) | Some(6) => StorageError::NotAvailable(message),
                Some(11) | Some(26) => StorageError::InvalidData(message),
                _ => StorageError::Unknown(message),
            }
        }
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => StorageError::NotAvailable(message),
        _ => StorageError::Unknown(message),
    }
}

fn decode(raw: &str, what: &str) -> StorageResult<StoredValue> {
    serde_json::from_str(raw)
        .map_err(|e| StorageError::InvalidData(format!("{} holds undecodable data: {}", what, e)))
}

/// SQLite-backed [`StorageAdapter`] with a flat key-value table and a
/// compound-keyed collection table.
pub struct DocumentStorage {
    location: DocumentLocation,
    namespace: KeyNamespace,
    connection: Mutex<Arc<OnceCell<SqlitePool>>>,
    open_count: AtomicU64,
    listeners: ListenerRegistry<ChangeEvent>,
}

impl DocumentStorage {
    pub fn new(location: DocumentLocation, prefix: Option<String>) -> Self {
        Self {
            location,
            namespace: KeyNamespace::new(prefix),
            connection: Mutex::new(Arc::new(OnceCell::new())),
            open_count: AtomicU64::new(0),
            listeners: ListenerRegistry::new(),
        }
    }

    pub fn file(path: impl Into<PathBuf>, prefix: Option<String>) -> Self {
        Self::new(DocumentLocation::File(path.into()), prefix)
    }

    pub fn in_memory(prefix: Option<String>) -> Self {
        Self::new(DocumentLocation::InMemory, prefix)
    }

    pub fn location(&self) -> &DocumentLocation {
        &self.location
    }

    /// Number of physical opens performed so far.
    pub fn open_count(&self) -> u64 {
        self.open_count.load(Ordering::SeqCst)
    }

    pub fn is_open(&self) -> bool {
        self.connection.lock().initialized()
    }

    /// Open (or reuse) the connection pool. Safe to call concurrently.
    pub async fn open(&self) -> StorageResult<SqlitePool> {
        let cell = self.connection.lock().clone();
        let pool = cell.get_or_try_init(|| self.connect()).await?;
        Ok(pool.clone())
    }

    /// Close the pool. The next operation opens a fresh one.
    pub async fn close(&self) {
        let cell = std::mem::replace(&mut *self.connection.lock(), Arc::new(OnceCell::new()));
        if let Some(pool) = cell.get() {
            pool.close().await;
            info!(location = ?self.location, "Closed document database");
        }
    }

    /// Can SQLite be opened in this process at all?
    pub async fn probe() -> bool {
        let storage = Self::in_memory(None);
        let ok = storage.open().await.is_ok();
        storage.close().await;
        ok
    }

    async fn connect(&self) -> StorageResult<SqlitePool> {
        self.open_count.fetch_add(1, Ordering::SeqCst);
        info!(location = ?self.location, "Opening document database");

        let pool = match &self.location {
            DocumentLocation::File(path) => {
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await.map_err(|e| {
                        StorageError::NotAvailable(format!(
                            "cannot create {}: {}",
                            parent.display(),
                            e
                        ))
                    })?;
                }
                let options = SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal)
                    .synchronous(SqliteSynchronous::Normal)
                    .busy_timeout(Duration::from_secs(5));
                SqlitePoolOptions::new()
                    .max_connections(4)
                    .connect_with(options)
                    .await
            }
            DocumentLocation::InMemory => {
                let options = SqliteConnectOptions::from_str("sqlite::memory:")
                    .map_err(|e| map_sqlx_error(e, "invalid in-memory database url"))?;
                // Every connection to :memory: is its own database, so keep
                // exactly one alive for the life of the pool.
                SqlitePoolOptions::new()
                    .min_connections(1)
                    .max_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None)
                    .connect_with(options)
                    .await
            }
        }
        .map_err(|e| {
            warn!(location = ?self.location, error = %e, "Failed to open document database");
            map_sqlx_error(e, "open failed")
        })?;

        if let Err(e) = Self::migrate(&pool).await {
            pool.close().await;
            return Err(e);
        }
        Ok(pool)
    }

    async fn migrate(pool: &SqlitePool) -> StorageResult<()> {
        let version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(pool)
            .await
            .map_err(|e| map_sqlx_error(e, "read schema version"))?;

        if version > SCHEMA_VERSION {
            return Err(StorageError::InvalidData(format!(
                "database schema version {} is newer than supported version {}",
                version, SCHEMA_VERSION
            )));
        }

        let mut tx = pool
            .begin_with(BEGIN_WRITE)
            .await
            .map_err(|e| map_sqlx_error(e, "begin migration"))?;
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error(e, "migration failed"))?;
        }
        sqlx::query(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(e, "stamp schema version"))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error(e, "commit migration"))?;

        debug!(from = version, to = SCHEMA_VERSION, "Document schema ready");
        Ok(())
    }

    async fn write_key(
        &self,
        key: &str,
        value: Option<&StoredValue>,
    ) -> StorageResult<Option<StoredValue>> {
        let pool = self.open().await?;
        let physical = self.namespace.apply(key);

        let mut tx = pool
            .begin_with(BEGIN_WRITE)
            .await
            .map_err(|e| map_sqlx_error(e, "begin write"))?;

        let previous: Option<String> =
            sqlx::query_scalar("SELECT value FROM keyvalue WHERE key = ?")
                .bind(&physical)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error(e, "read previous value"))?;

        match value {
            Some(value) => {
                let text = serde_json::to_string(value)?;
                sqlx::query(
                    "INSERT INTO keyvalue (key, value) VALUES (?, ?)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                )
                .bind(&physical)
                .bind(text)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error(e, "write value"))?;
            }
            None => {
                sqlx::query("DELETE FROM keyvalue WHERE key = ?")
                    .bind(&physical)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error(e, "delete value"))?;
            }
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error(e, "commit write"))?;

        Ok(match previous {
            Some(raw) => match decode(&raw, &physical) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(key = key, error = %e, "Previous value unreadable");
                    None
                }
            },
            None => None,
        })
    }
}

#[async_trait]
impl StorageAdapter for DocumentStorage {
    fn backend_name(&self) -> &'static str {
        "document"
    }

    async fn get(&self, key: &str) -> StorageResult<Option<StoredValue>> {
        let pool = self.open().await?;
        let physical = self.namespace.apply(key);
        let raw: Option<String> = sqlx::query_scalar("SELECT value FROM keyvalue WHERE key = ?")
            .bind(&physical)
            .fetch_optional(&pool)
            .await
            .map_err(|e| map_sqlx_error(e, "get"))?;
        raw.map(|raw| decode(&raw, &physical)).transpose()
    }

    async fn set(&self, key: &str, value: StoredValue) -> StorageResult<()> {
        let old_value = self.write_key(key, Some(&value)).await?;
        debug!(key = key, "document set");
        self.listeners
            .emit(&ChangeEvent::new(key, old_value, Some(value)));
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let old_value = self.write_key(key, None).await?;
        debug!(key = key, "document delete");
        self.listeners.emit(&ChangeEvent::new(key, old_value, None));
        Ok(())
    }

    async fn clear(&self) -> StorageResult<()> {
        let pool = self.open().await?;
        let mut tx = pool
            .begin_with(BEGIN_WRITE)
            .await
            .map_err(|e| map_sqlx_error(e, "begin clear"))?;

        match self.namespace.physical_prefix() {
            Some(prefix) => {
                sqlx::query("DELETE FROM keyvalue WHERE substr(key, 1, length(?)) = ?")
                    .bind(&prefix)
                    .bind(&prefix)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error(e, "clear keys"))?;
                sqlx::query(
                    "DELETE FROM collections WHERE substr(collection, 1, length(?)) = ?",
                )
                .bind(&prefix)
                .bind(&prefix)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error(e, "clear collections"))?;
            }
            None => {
                sqlx::query("DELETE FROM keyvalue")
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error(e, "truncate keys"))?;
                sqlx::query("DELETE FROM collections")
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error(e, "truncate collections"))?;
            }
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error(e, "commit clear"))?;
        debug!(prefix = ?self.namespace.prefix(), "document clear");
        Ok(())
    }

    async fn keys(&self) -> StorageResult<Vec<String>> {
        let pool = self.open().await?;
        let physical: Vec<String> = match self.namespace.physical_prefix() {
            Some(prefix) => sqlx::query_scalar(
                "SELECT key FROM keyvalue WHERE substr(key, 1, length(?)) = ? ORDER BY key",
            )
            .bind(&prefix)
            .bind(&prefix)
            .fetch_all(&pool)
            .await,
            None => {
                sqlx::query_scalar("SELECT key FROM keyvalue ORDER BY key")
                    .fetch_all(&pool)
                    .await
            }
        }
        .map_err(|e| map_sqlx_error(e, "list keys"))?;

        Ok(physical
            .iter()
            .filter_map(|key| self.namespace.strip(key).map(str::to_string))
            .collect())
    }

    async fn get_structured(
        &self,
        collection: &str,
        id: &str,
    ) -> StorageResult<Option<StoredValue>> {
        let pool = self.open().await?;
        let physical = self.namespace.apply(collection);
        let raw: Option<String> = sqlx::query_scalar(
            "SELECT value FROM collections WHERE collection = ? AND id = ?",
        )
        .bind(&physical)
        .bind(id)
        .fetch_optional(&pool)
        .await
        .map_err(|e| map_sqlx_error(e, "get structured"))?;
        raw.map(|raw| decode(&raw, &format!("{}/{}", physical, id)))
            .transpose()
    }

    async fn set_structured(
        &self,
        collection: &str,
        id: &str,
        value: StoredValue,
    ) -> StorageResult<()> {
        let pool = self.open().await?;
        let text = serde_json::to_string(&value)?;
        sqlx::query(
            "INSERT INTO collections (collection, id, value) VALUES (?, ?, ?)
             ON CONFLICT(collection, id) DO UPDATE SET value = excluded.value",
        )
        .bind(self.namespace.apply(collection))
        .bind(id)
        .bind(text)
        .execute(&pool)
        .await
        .map_err(|e| map_sqlx_error(e, "set structured"))?;
        debug!(collection = collection, id = id, "document set structured");
        Ok(())
    }

    async fn delete_structured(&self, collection: &str, id: Option<&str>) -> StorageResult<()> {
        let pool = self.open().await?;
        let physical = self.namespace.apply(collection);
        let result = match id {
            Some(id) => {
                sqlx::query("DELETE FROM collections WHERE collection = ? AND id = ?")
                    .bind(&physical)
                    .bind(id)
                    .execute(&pool)
                    .await
            }
            None => {
                sqlx::query("DELETE FROM collections WHERE collection = ?")
                    .bind(&physical)
                    .execute(&pool)
                    .await
            }
        }
        .map_err(|e| map_sqlx_error(e, "delete structured"))?;

        debug!(
            collection = collection,
            id = ?id,
            removed = result.rows_affected(),
            "document delete structured"
        );
        Ok(())
    }

    async fn list_structured(&self, collection: &str) -> StorageResult<Vec<String>> {
        let pool = self.open().await?;
        sqlx::query_scalar("SELECT id FROM collections WHERE collection = ?")
            .bind(self.namespace.apply(collection))
            .fetch_all(&pool)
            .await
            .map_err(|e| map_sqlx_error(e, "list structured"))
    }

    fn on_changed(&self, listener: ChangeListener) -> Subscription {
        self.listeners.subscribe(listener)
    }

    async fn dispose(&self) -> StorageResult<()> {
        self.close().await;
        Ok(())
    }
}
