//! Service Layer Error Types
//!
//! This module defines error types for service-layer operations, providing
//! detailed error handling for business logic failures.

use thiserror::Error;
use uuid::Uuid;

use crate::config::ConfigError;
use crate::db::{ConflictKind, DatabaseError};
use crate::models::ValidationError;
use crate::tree::TreeError;

/// Category and place catalog errors
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Category names are unique across the category tree
    #[error("Category name already in use: {name}")]
    CategoryNameTaken { name: String },

    /// Slug path did not resolve to a node
    #[error("No {kind} at '{slug_path}'")]
    UnknownSlugPath { kind: String, slug_path: String },

    /// Validation failed for the node
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Tree core failure
    #[error(transparent)]
    Tree(TreeError),

    /// Invalid tree configuration
    #[error("Invalid catalog configuration: {0}")]
    Config(#[from] ConfigError),
}

impl CatalogError {
    /// Create a category name taken error
    pub fn category_name_taken(name: impl Into<String>) -> Self {
        Self::CategoryNameTaken { name: name.into() }
    }

    /// Create an unknown slug path error
    pub fn unknown_slug_path(kind: impl ToString, slug_path: impl Into<String>) -> Self {
        Self::UnknownSlugPath {
            kind: kind.to_string(),
            slug_path: slug_path.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::UnknownSlugPath { .. } => true,
            Self::Tree(err) => err.is_not_found(),
            _ => false,
        }
    }
}

impl From<TreeError> for CatalogError {
    fn from(err: TreeError) -> Self {
        match err {
            TreeError::Validation(validation) => Self::Validation(validation),
            TreeError::Conflict {
                kind: ConflictKind::CategoryName,
                detail,
            } => Self::CategoryNameTaken { name: detail },
            other => Self::Tree(other),
        }
    }
}

/// Job posting errors
#[derive(Error, Debug)]
pub enum JobServiceError {
    /// Job not found by ID
    #[error("Job not found: {id}")]
    JobNotFound { id: Uuid },

    /// The job exists but is not accepting applications
    #[error("Job is not active: {id}")]
    JobInactive { id: Uuid },

    /// Posting rules rejected the job
    #[error("Job validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Category or place referenced by the job is missing
    #[error("Job references unknown {kind} {id}")]
    UnknownNode { kind: String, id: Uuid },

    /// Job repository failure
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    /// Tree lookup failure
    #[error("Tree operation failed: {0}")]
    Tree(#[from] TreeError),
}

impl JobServiceError {
    /// Create a job not found error
    pub fn job_not_found(id: Uuid) -> Self {
        Self::JobNotFound { id }
    }

    /// Create a job inactive error
    pub fn job_inactive(id: Uuid) -> Self {
        Self::JobInactive { id }
    }

    /// Create an unknown node error
    pub fn unknown_node(kind: impl ToString, id: Uuid) -> Self {
        Self::UnknownNode {
            kind: kind.to_string(),
            id,
        }
    }
}
