//! Database Connection Management
//!
//! This module provides connection handling and schema initialization for
//! the libsql-backed node store.
//!
//! # Architecture
//!
//! - **Path-agnostic**: Accepts any valid PathBuf
//! - **WAL mode**: Write-Ahead Logging for concurrent readers
//! - **Uniqueness in the schema**: Path, sibling slug, category name and
//!   category order rules are unique indexes, so conditional writes are
//!   decided by SQLite rather than by read-then-write logic
//! - **Sequences table**: `tree_sequences` backs atomic index allocation
//!
//! # Database Connection Patterns
//!
//! Use `connect_with_timeout()` in async functions. The 5-second busy
//! timeout lets concurrent writers wait for the lock instead of failing
//! immediately with `SQLITE_BUSY`.
//!
//! ```no_run
//! # use jobboard_core::db::DatabaseService;
//! # use std::path::PathBuf;
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let db_service = DatabaseService::new(PathBuf::from("./data/jobboard.db")).await?;
//! let conn = db_service.connect_with_timeout().await?;
//! # Ok(())
//! # }
//! ```

use crate::db::error::DatabaseError;
use libsql::{Builder, Database};
use std::path::PathBuf;
use std::sync::Arc;

/// Busy timeout applied to every async connection, in milliseconds
pub const BUSY_TIMEOUT_MS: u32 = 5000;

/// Database service for managing the libsql connection and schema
#[derive(Debug, Clone)]
pub struct DatabaseService {
    /// libsql database handle (wrapped in Arc for sharing)
    pub db: Arc<Database>,

    /// Path to the database file
    pub db_path: PathBuf,
}

impl DatabaseService {
    /// Create a new DatabaseService with the specified database path
    ///
    /// This will:
    /// 1. Ensure the parent directory exists (create if needed)
    /// 2. Open/create the database file
    /// 3. Initialize the schema (CREATE TABLE IF NOT EXISTS)
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if:
    /// - Parent directory cannot be created
    /// - Database connection fails
    /// - Schema initialization fails
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        let is_new_database = !db_path.exists();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::PermissionDenied {
                        DatabaseError::permission_denied(db_path.clone())
                    } else {
                        DatabaseError::DirectoryCreationFailed(e)
                    }
                })?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
        };

        service.initialize_schema(is_new_database).await?;
        tracing::info!(path = %service.db_path.display(), "Database ready");

        Ok(service)
    }

    /// Execute a PRAGMA statement
    ///
    /// PRAGMA statements return rows, so they go through query() rather
    /// than execute().
    async fn execute_pragma(
        &self,
        conn: &libsql::Connection,
        pragma: &str,
    ) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let _ = stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Initialize database schema and configuration
    ///
    /// Idempotent: safe to call on an existing database.
    ///
    /// # Schema
    ///
    /// - `tree_nodes`: categories and places, one row per node
    /// - `tree_sequences`: last allocated value per sequence scope
    async fn initialize_schema(&self, is_new_database: bool) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
            .await?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS tree_nodes (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                path TEXT NOT NULL,
                -- '' for roots
                parent_path TEXT NOT NULL,
                local_index INTEGER NOT NULL,
                depth INTEGER NOT NULL,
                child_count INTEGER NOT NULL DEFAULT 0,
                name TEXT NOT NULL,
                slug TEXT,
                description TEXT,
                category_order INTEGER,
                place_type INTEGER,
                created_at TEXT NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!(
                "Failed to create tree_nodes table: {}",
                e
            ))
        })?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS tree_sequences (
                scope TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!(
                "Failed to create tree_sequences table: {}",
                e
            ))
        })?;

        self.create_indexes(&conn).await?;

        if is_new_database {
            self.execute_pragma(&conn, "PRAGMA wal_checkpoint(TRUNCATE)")
                .await?;
        }

        Ok(())
    }

    /// Create unique and lookup indexes for `tree_nodes`
    async fn create_indexes(&self, conn: &libsql::Connection) -> Result<(), DatabaseError> {
        let indexes = [
            (
                "idx_tree_nodes_path",
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_tree_nodes_path
                 ON tree_nodes(kind, path)",
            ),
            (
                "idx_tree_nodes_sibling_slug",
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_tree_nodes_sibling_slug
                 ON tree_nodes(kind, parent_path, slug) WHERE slug IS NOT NULL",
            ),
            (
                "idx_tree_nodes_category_name",
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_tree_nodes_category_name
                 ON tree_nodes(name) WHERE kind = 'category'",
            ),
            (
                "idx_tree_nodes_category_order",
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_tree_nodes_category_order
                 ON tree_nodes(category_order) WHERE category_order IS NOT NULL",
            ),
            (
                "idx_tree_nodes_parent",
                "CREATE INDEX IF NOT EXISTS idx_tree_nodes_parent
                 ON tree_nodes(kind, parent_path, local_index)",
            ),
            (
                "idx_tree_nodes_name",
                "CREATE INDEX IF NOT EXISTS idx_tree_nodes_name ON tree_nodes(kind, name)",
            ),
        ];

        for (name, sql) in indexes {
            conn.execute(sql, ()).await.map_err(|e| {
                DatabaseError::initialization_failed(format!(
                    "Failed to create index '{}': {}",
                    name, e
                ))
            })?;
        }

        Ok(())
    }

    /// Get a raw connection
    ///
    /// Only for synchronous contexts where the connection is not held
    /// across `.await` points. Prefer `connect_with_timeout()`.
    pub fn connect(&self) -> Result<libsql::Connection, DatabaseError> {
        self.db.connect().map_err(DatabaseError::LibsqlError)
    }

    /// Get an async connection with busy timeout configured
    pub async fn connect_with_timeout(&self) -> Result<libsql::Connection, DatabaseError> {
        let conn = self.connect()?;

        self.execute_pragma(&conn, &format!("PRAGMA busy_timeout = {}", BUSY_TIMEOUT_MS))
            .await?;

        Ok(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn table_names(service: &DatabaseService) -> Vec<String> {
        let conn = service.connect_with_timeout().await.unwrap();
        let mut rows = conn
            .query(
                "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                (),
            )
            .await
            .unwrap();
        let mut names = Vec::new();
        while let Some(row) = rows.next().await.unwrap() {
            names.push(row.get::<String>(0).unwrap());
        }
        names
    }

    #[tokio::test]
    async fn new_creates_parent_directory_and_schema() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("board.db");

        let service = DatabaseService::new(db_path.clone()).await.unwrap();

        assert!(db_path.exists());
        let tables = table_names(&service).await;
        assert!(tables.contains(&"tree_nodes".to_string()));
        assert!(tables.contains(&"tree_sequences".to_string()));
    }

    #[tokio::test]
    async fn reopening_existing_database_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("board.db");

        let first = DatabaseService::new(db_path.clone()).await.unwrap();
        let conn = first.connect_with_timeout().await.unwrap();
        conn.execute(
            "INSERT INTO tree_sequences (scope, value) VALUES ('category_order', 7)",
            (),
        )
        .await
        .unwrap();
        drop(conn);
        drop(first);

        let second = DatabaseService::new(db_path).await.unwrap();
        let conn = second.connect_with_timeout().await.unwrap();
        let mut rows = conn
            .query(
                "SELECT value FROM tree_sequences WHERE scope = 'category_order'",
                (),
            )
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), 7);
    }
}
