//! Minimal async store handle for yearseq (sqlite + sqlx)
//!
//! Usage:
//! let db = Db::connect("sqlite::memory:").await?;
//! auto_migrate(Arc::new(db.clone())).await?;
//! let mut tx = db.begin().await?;
pub use futures::future::BoxFuture;
use log::{debug, error, info};
use sha2::{Digest, Sha256};
pub use sqlx::FromRow;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Executor, Row, Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::settings::{DEFAULT_MAX_CONNECTIONS, Settings};

const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

const MIGRATIONS_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS __yearseq_migrations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    table_name TEXT UNIQUE NOT NULL,
    schema_sql TEXT NOT NULL,
    hash TEXT NOT NULL,
    applied_at DATETIME DEFAULT CURRENT_TIMESTAMP
)";

/// An async database pool wrapper, constructed once at bootstrap and passed around.
#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
}

/// Migration function pointer for a model.
pub type MigrationFn = fn(Arc<Db>) -> BoxFuture<'static, Result<(), sqlx::Error>>;

/// A table migration registered through `inventory::submit!`.
pub struct Migration {
    pub table: &'static str,
    pub run: MigrationFn,
}

#[async_trait::async_trait]
pub trait Model: Send + Sync {
    fn table_name() -> &'static str;
    fn create_table_sql() -> String;
    fn columns() -> Vec<(String, String)>;

    async fn migrate(db: Arc<Db>) -> Result<(), sqlx::Error> {
        let table_name = Self::table_name();
        let create_sql = Self::create_table_sql();
        let schema_hash = hash(&create_sql);

        db.execute(MIGRATIONS_TABLE_SQL).await?;

        let applied: Option<(String,)> =
            sqlx::query_as("SELECT hash FROM __yearseq_migrations WHERE table_name = ?")
                .bind(table_name)
                .fetch_optional(db.pool())
                .await?;

        match applied {
            None => {
                db.execute(&create_sql).await?;
                sqlx::query(
                    "INSERT INTO __yearseq_migrations (table_name, schema_sql, hash) VALUES (?, ?, ?)",
                )
                .bind(table_name)
                .bind(&create_sql)
                .bind(&schema_hash)
                .execute(db.pool())
                .await?;
                info!(
                    "Migrated `{}` (table created, initial schema applied).",
                    table_name
                );
                return Ok(());
            }
            Some((stored,)) if stored == schema_hash => {
                info!("No schema changes detected for `{}`.", table_name);
                return Ok(());
            }
            Some(_) => {}
        }

        let cols: Vec<String> = sqlx::query(&format!("PRAGMA table_info({})", table_name))
            .fetch_all(db.pool())
            .await?
            .into_iter()
            .map(|row: SqliteRow| row.get::<String, _>("name"))
            .collect();

        let mut added = Vec::new();
        for (name, sqltype) in Self::columns() {
            if !cols.contains(&name) {
                db.execute(&format!(
                    "ALTER TABLE {} ADD COLUMN {} {}",
                    table_name, name, sqltype
                ))
                .await?;
                added.push((name, sqltype));
            }
        }

        for (name, sqltype) in &added {
            info!("Added column `{}.{}` {}", table_name, name, sqltype);
        }
        sqlx::query(
            "UPDATE __yearseq_migrations \
             SET schema_sql = ?, hash = ?, applied_at = CURRENT_TIMESTAMP \
             WHERE table_name = ?",
        )
        .bind(&create_sql)
        .bind(&schema_hash)
        .bind(table_name)
        .execute(db.pool())
        .await?;
        info!(
            "Schema of `{}` updated ({} column(s) added).",
            table_name,
            added.len()
        );
        Ok(())
    }
}

// Helper function to hash a SQL string
fn hash(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn is_in_memory(uri: &str) -> bool {
    uri.contains(":memory:") || uri.contains("mode=memory")
}

impl Db {
    /// Connect (or create) a SQLite database at the given URI.
    pub async fn connect(uri: &str) -> Result<Self, sqlx::Error> {
        Self::connect_pooled(uri, DEFAULT_MAX_CONNECTIONS).await
    }

    /// Connect using the database URL and pool size from `settings`.
    pub async fn connect_with(settings: &Settings) -> Result<Self, sqlx::Error> {
        Self::connect_pooled(&settings.database_url, settings.max_connections).await
    }

    async fn connect_pooled(uri: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        info!("Connecting to SQLite database at URI: {}", uri);
        let mut options = SqliteConnectOptions::from_str(uri)?.busy_timeout(BUSY_TIMEOUT);
        // An in-memory database lives exactly as long as its connection.
        let pool_options = if is_in_memory(uri) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            options = options.journal_mode(SqliteJournalMode::Wal);
            SqlitePoolOptions::new().max_connections(max_connections)
        };
        let pool = pool_options.connect_with(options).await?;
        info!("Connected to SQLite database: {}", uri);
        Ok(Db { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a transaction; the caller commits or rolls back.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
        self.pool.begin().await
    }

    /// Start a transaction that takes the write lock up front, so a
    /// read-then-write sequence cannot be upgraded into `SQLITE_BUSY`.
    pub async fn begin_immediate(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
        self.pool.begin_with("BEGIN IMMEDIATE").await
    }

    pub async fn acquire(&self) -> Result<PoolConnection<Sqlite>, sqlx::Error> {
        self.pool.acquire().await
    }

    /// Execute an arbitrary SQL statement, e.g. DDL, INSERT, UPDATE.
    pub async fn execute(&self, sql: &str) -> Result<(), sqlx::Error> {
        debug!("Executing SQL: {}", sql);
        let result = self.pool.execute(sql).await;
        match &result {
            Ok(_) => debug!("SQL executed successfully"),
            Err(e) => error!("SQL execution failed: {}", e),
        }
        result.map(|_| ())
    }

    /// Fetch all rows and map to a type implementing `FromRow`.
    pub async fn fetch_all<T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin>(
        &self,
        sql: &str,
    ) -> Result<Vec<T>, sqlx::Error> {
        debug!("Fetching rows with SQL: {}", sql);
        let result = sqlx::query_as(sql).fetch_all(&self.pool).await;
        match &result {
            Ok(rows) => debug!("Fetched {} rows successfully", rows.len()),
            Err(e) => error!("Row fetch failed: {}", e),
        }
        result
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Migrate all registered models using the inventory pattern.
pub async fn auto_migrate(db: Arc<Db>) -> Result<(), sqlx::Error> {
    info!("Starting auto migration of all registered models...");
    let mut total = 0;
    for m in inventory::iter::<Migration> {
        total += 1;
        if let Err(e) = (m.run)(db.clone()).await {
            error!("Auto-migration failed for `{}`: {}", m.table, e);
            return Err(e);
        }
    }
    info!("Auto migration completed for {} models.", total);
    Ok(())
}

/// Drop every registered table and forget its migration record.
pub async fn wipe(db: &Db) -> Result<(), sqlx::Error> {
    db.execute(MIGRATIONS_TABLE_SQL).await?;
    for m in inventory::iter::<Migration> {
        db.execute(&format!("DROP TABLE IF EXISTS {}", m.table))
            .await?;
        sqlx::query("DELETE FROM __yearseq_migrations WHERE table_name = ?")
            .bind(m.table)
            .execute(db.pool())
            .await?;
        info!("Dropped `{}`.", m.table);
    }
    Ok(())
}
