//! NodeStore Trait - Persistence Abstraction Layer
//!
//! This module defines the `NodeStore` trait that abstracts persistence of
//! tree nodes. The trait enables multiple backend implementations
//! (in-memory, libsql) without changing the tree logic in
//! [`crate::tree::TreeStore`].
//!
//! # Architecture
//!
//! - **Abstraction Point**: Between the tree core (path arithmetic, slug
//!   rules) and the storage engine
//! - **Atomic primitives**: Index allocation, insertion and slug claiming
//!   are each a single atomic operation. The tree core never reads a
//!   maximum and writes `max + 1` in two steps.
//! - **Range scans**: Descendant queries are prefix scans over `path`
//!
//! # Design Decisions
//!
//! 1. **Async-First**: All methods are async so embedded and networked
//!    backends share the trait
//! 2. **Ownership Semantics**: Insert takes ownership of the record
//! 3. **Typed errors**: Uniqueness violations surface as
//!    [`DatabaseError::Conflict`]
//!
//! # Examples
//!
//! ```rust
//! use jobboard_core::db::{MemoryNodeStore, NodeStore, SequenceScope};
//! use jobboard_core::models::NodeKind;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let store = MemoryNodeStore::new();
//! let first = store.allocate(&SequenceScope::roots(NodeKind::Category)).await?;
//! let second = store.allocate(&SequenceScope::roots(NodeKind::Category)).await?;
//! assert_eq!((first, second), (1, 2));
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{NodeKind, TreeNode};

/// A sequence that can be advanced atomically
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SequenceScope {
    /// Local indexes of the children of `parent_path` (empty string for
    /// roots) within one kind's path space. First allocation is 1.
    Children { kind: NodeKind, parent_path: String },

    /// Global category display order. First allocation is 0.
    CategoryOrder,
}

impl SequenceScope {
    pub fn roots(kind: NodeKind) -> Self {
        Self::Children {
            kind,
            parent_path: String::new(),
        }
    }

    pub fn children(kind: NodeKind, parent_path: impl Into<String>) -> Self {
        Self::Children {
            kind,
            parent_path: parent_path.into(),
        }
    }

    /// Stable key used to persist the sequence
    pub fn key(&self) -> String {
        match self {
            SequenceScope::Children { kind, parent_path } => {
                format!("children:{}:{}", kind.as_str(), parent_path)
            }
            SequenceScope::CategoryOrder => "category_order".to_string(),
        }
    }
}

/// Parameters for node insertion (avoids too-many-arguments lint)
#[derive(Debug, Clone)]
pub struct NodeInsert {
    /// Record with `path` and `depth` already computed
    pub node: TreeNode,

    /// Parent path, empty for roots
    pub parent_path: String,

    /// Value of the last path segment
    pub local_index: u64,

    /// Parent whose `child_count` is incremented in the same atomic step
    pub parent_id: Option<Uuid>,
}

/// Result of an insertion
#[derive(Debug, Clone)]
pub struct InsertOutcome {
    pub node: TreeNode,

    /// Parent's `child_count` after the increment
    pub parent_child_count: Option<u32>,
}

/// Result of a conditional slug write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlugClaim {
    /// Slug stored on the node
    Claimed,
    /// A sibling already holds the slug; nothing written
    Taken,
    /// The node already had a slug; nothing written
    AlreadySet(String),
}

/// Abstraction layer for tree node persistence
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`. Every method is atomic with
/// respect to concurrent calls on the same store, including calls from other
/// connections for database-backed implementations.
///
/// # Uniqueness Rules
///
/// `insert` and `try_set_slug` enforce, per kind:
/// - unique `id`
/// - unique `path`
/// - unique non-null `slug` among nodes sharing a parent path
/// - for categories: unique `name` and unique non-null `category_order`
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Allocate the next value of `scope`.
    ///
    /// The returned value is `max(previous allocation + 1, current maximum
    /// stored value + 1)`; for [`SequenceScope::CategoryOrder`] an empty
    /// store yields 0, for children an empty parent yields 1.
    async fn allocate(&self, scope: &SequenceScope) -> Result<u64, DatabaseError>;

    /// Insert a node and bump its parent's `child_count` atomically.
    ///
    /// # Errors
    ///
    /// - [`DatabaseError::Conflict`] if a uniqueness rule is violated
    /// - [`DatabaseError::NotFound`] if `parent_id` is not stored
    async fn insert(&self, insert: NodeInsert) -> Result<InsertOutcome, DatabaseError>;

    /// Get node by id
    async fn get(&self, id: Uuid) -> Result<Option<TreeNode>, DatabaseError>;

    /// Get node by `(kind, path)`
    async fn get_by_path(
        &self,
        kind: NodeKind,
        path: &str,
    ) -> Result<Option<TreeNode>, DatabaseError>;

    /// Get every stored node among `paths`, ordered by path.
    /// Missing paths are simply absent from the result.
    async fn get_by_paths(
        &self,
        kind: NodeKind,
        paths: &[String],
    ) -> Result<Vec<TreeNode>, DatabaseError>;

    /// All nodes whose path has `prefix` as a strict prefix, ordered by path
    async fn scan_prefix(&self, kind: NodeKind, prefix: &str)
        -> Result<Vec<TreeNode>, DatabaseError>;

    /// Direct children of `parent_path` (empty string for roots), ordered by path
    async fn children(
        &self,
        kind: NodeKind,
        parent_path: &str,
    ) -> Result<Vec<TreeNode>, DatabaseError>;

    /// Every node of `kind`, ordered by path
    async fn list(&self, kind: NodeKind) -> Result<Vec<TreeNode>, DatabaseError>;

    /// Nodes of `kind` named exactly `name`
    async fn find_by_name(&self, kind: NodeKind, name: &str)
        -> Result<Vec<TreeNode>, DatabaseError>;

    /// Store `slug` on the node if its slug is unset and no sibling holds it
    async fn try_set_slug(&self, id: Uuid, slug: &str) -> Result<SlugClaim, DatabaseError>;

    /// Clear the node's slug so it can be assigned again
    async fn clear_slug(&self, id: Uuid) -> Result<(), DatabaseError>;
}
