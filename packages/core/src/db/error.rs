//! Database Error Types
//!
//! This module defines error types for node store operations, covering
//! connection, initialization, query failures and rejected conditional
//! writes.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which uniqueness rule rejected a conditional write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// Node id already stored
    Id,
    /// `(kind, path)` already stored
    Path,
    /// A sibling already holds the slug
    SiblingSlug,
    /// Category names are unique across the whole category tree
    CategoryName,
    /// Category order values are unique
    CategoryOrder,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConflictKind::Id => "id",
            ConflictKind::Path => "path",
            ConflictKind::SiblingSlug => "sibling slug",
            ConflictKind::CategoryName => "category name",
            ConflictKind::CategoryOrder => "category order",
        };
        f.write_str(label)
    }
}

/// Node store errors
///
/// Covers all error cases for database connection, initialization,
/// and basic operations. Tree-level meaning (broken trees, malformed
/// paths) is added by [`crate::tree::TreeError`].
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to establish database connection
    #[cfg(feature = "libsql-store")]
    #[error("Failed to connect to database at {path}: {source}")]
    ConnectionFailed {
        path: PathBuf,
        source: libsql::Error,
    },

    /// Failed to initialize database schema
    #[error("Failed to initialize database schema: {0}")]
    InitializationFailed(String),

    /// Permission denied when accessing database
    #[error("Permission denied for database path: {path}")]
    PermissionDenied { path: PathBuf },

    /// Failed to create parent directory
    #[error("Failed to create parent directory for database: {0}")]
    DirectoryCreationFailed(#[from] std::io::Error),

    /// libsql operation error
    #[cfg(feature = "libsql-store")]
    #[error("Database operation failed: {0}")]
    LibsqlError(#[from] libsql::Error),

    /// SQL execution error with context
    #[error("SQL execution failed: {context}")]
    SqlExecutionError { context: String },

    /// A stored row could not be turned back into a node
    #[error("Corrupt row: {context}")]
    RowDecode { context: String },

    /// Conditional write rejected by a uniqueness rule
    #[error("Conflict on {kind}: {detail}")]
    Conflict { kind: ConflictKind, detail: String },

    /// Record addressed by id does not exist
    #[error("Record not found: {id}")]
    NotFound { id: String },
}

impl DatabaseError {
    /// Create a connection failed error
    #[cfg(feature = "libsql-store")]
    pub fn connection_failed(path: PathBuf, source: libsql::Error) -> Self {
        Self::ConnectionFailed { path, source }
    }

    /// Create an initialization failed error
    pub fn initialization_failed(msg: impl Into<String>) -> Self {
        Self::InitializationFailed(msg.into())
    }

    /// Create a permission denied error
    pub fn permission_denied(path: PathBuf) -> Self {
        Self::PermissionDenied { path }
    }

    /// Create a SQL execution error with context
    pub fn sql_execution(context: impl Into<String>) -> Self {
        Self::SqlExecutionError {
            context: context.into(),
        }
    }

    /// Create a row decoding error
    pub fn row_decode(context: impl Into<String>) -> Self {
        Self::RowDecode {
            context: context.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict(kind: ConflictKind, detail: impl Into<String>) -> Self {
        Self::Conflict {
            kind,
            detail: detail.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(id: impl ToString) -> Self {
        Self::NotFound { id: id.to_string() }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
