//! Tree Error Types
//!
//! Errors surfaced by the tree core. None are swallowed or retried
//! internally; every variant propagates to the immediate caller.

use thiserror::Error;
use uuid::Uuid;

use crate::db::{ConflictKind, DatabaseError};
use crate::models::{NodeKind, ValidationError};

/// Tree operation errors
#[derive(Error, Debug)]
pub enum TreeError {
    /// A stored or supplied path does not decode to a segment sequence.
    /// Indicates corruption or a schema mismatch.
    #[error("Malformed path '{path}': {reason}")]
    MalformedPath { path: String, reason: String },

    /// A local index does not fit in one path segment
    #[error("Local index {index} does not fit in a path segment of {step_len} characters")]
    PathOverflow { index: u64, step_len: usize },

    /// An ancestor implied by a node's path is missing from the store
    #[error("Broken tree: ancestor '{missing}' of node path '{path}' is not stored")]
    BrokenTree { path: String, missing: String },

    /// Lookup by path or id found no record
    #[error("Node not found: {0}")]
    NotFound(String),

    /// A conditional write was rejected
    #[error("Conflict on {kind}: {detail}")]
    Conflict { kind: ConflictKind, detail: String },

    /// A child must share its parent's kind
    #[error("Cannot insert a {child} under a {parent}")]
    KindMismatch { parent: NodeKind, child: NodeKind },

    /// Rejected user input
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Job-counting collaborator failed
    #[error("Failed to count jobs for node {node_id}: {source}")]
    JobCount {
        node_id: Uuid,
        source: anyhow::Error,
    },

    /// Backing store failure
    #[error("Node store failure: {0}")]
    Store(DatabaseError),
}

impl TreeError {
    /// Create a malformed path error
    pub fn malformed_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a broken tree error
    pub fn broken_tree(path: impl Into<String>, missing: impl Into<String>) -> Self {
        Self::BrokenTree {
            path: path.into(),
            missing: missing.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<DatabaseError> for TreeError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Conflict { kind, detail } => Self::Conflict { kind, detail },
            DatabaseError::NotFound { id } => Self::NotFound(id),
            other => Self::Store(other),
        }
    }
}
