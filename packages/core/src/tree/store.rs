//! Tree Store
//!
//! Insertion and structural queries over a [`NodeStore`], using
//! [`PathEncoder`] for all path arithmetic.
//!
//! # Insertion
//!
//! A new node's local index comes from [`NodeStore::allocate`], which is a
//! single atomic step. The record is then written with
//! [`NodeStore::insert`], which also bumps the parent's `child_count` in the
//! same atomic step. Two concurrent insertions under the same parent
//! therefore always receive different paths.
//!
//! # Queries
//!
//! - `ancestors_of`: decode the path into prefixes and fetch them in one call
//! - `descendants_of`: prefix range scan
//! - `siblings_of`: nodes sharing the parent path, excluding the node itself

use std::sync::Arc;
use uuid::Uuid;

use crate::db::{NodeInsert, NodeStore, SequenceScope};
use crate::models::{NewNode, NodeKind, TreeNode};
use crate::tree::{PathEncoder, TreeError};

/// Materialized-path tree over a node store
#[derive(Clone)]
pub struct TreeStore {
    store: Arc<dyn NodeStore>,
    encoder: PathEncoder,
}

impl TreeStore {
    pub fn new(store: Arc<dyn NodeStore>, encoder: PathEncoder) -> Self {
        Self { store, encoder }
    }

    /// Tree store with the default path encoding
    pub fn with_defaults(store: Arc<dyn NodeStore>) -> Self {
        Self::new(store, PathEncoder::default())
    }

    pub fn encoder(&self) -> &PathEncoder {
        &self.encoder
    }

    pub fn node_store(&self) -> &Arc<dyn NodeStore> {
        &self.store
    }

    /// Insert `node` as a new root of its kind's tree
    pub async fn insert_root(&self, node: NewNode) -> Result<TreeNode, TreeError> {
        node.validate()?;
        let kind = node.kind();
        let local_index = self.store.allocate(&SequenceScope::roots(kind)).await?;
        let path = self.encoder.encode(None, local_index)?;

        let outcome = self
            .store
            .insert(NodeInsert {
                node: node.into_tree_node(path, 1),
                parent_path: String::new(),
                local_index,
                parent_id: None,
            })
            .await?;

        tracing::debug!(
            kind = %kind,
            path = %outcome.node.path,
            name = %outcome.node.name,
            "Inserted root node"
        );
        Ok(outcome.node)
    }

    /// Insert `node` as the last child of `parent`.
    ///
    /// `parent.child_count` is updated to the stored value.
    pub async fn insert_child(
        &self,
        parent: &mut TreeNode,
        node: NewNode,
    ) -> Result<TreeNode, TreeError> {
        node.validate()?;
        let kind = node.kind();
        if kind != parent.kind() {
            return Err(TreeError::KindMismatch {
                parent: parent.kind(),
                child: kind,
            });
        }

        let local_index = self
            .store
            .allocate(&SequenceScope::children(kind, parent.path.clone()))
            .await?;
        let path = self.encoder.encode(Some(&parent.path), local_index)?;
        let depth = parent.depth + 1;

        let outcome = self
            .store
            .insert(NodeInsert {
                node: node.into_tree_node(path, depth),
                parent_path: parent.path.clone(),
                local_index,
                parent_id: Some(parent.id),
            })
            .await?;

        if let Some(count) = outcome.parent_child_count {
            parent.child_count = count;
        }

        tracing::debug!(
            kind = %kind,
            parent = %parent.path,
            path = %outcome.node.path,
            name = %outcome.node.name,
            "Inserted child node"
        );
        Ok(outcome.node)
    }

    /// Look a node up by path
    pub async fn get_by_path(&self, kind: NodeKind, path: &str) -> Result<TreeNode, TreeError> {
        self.encoder.decode(path)?;
        self.store
            .get_by_path(kind, path)
            .await?
            .ok_or_else(|| TreeError::not_found(format!("{kind} at path '{path}'")))
    }

    /// Look a node up by id
    pub async fn get(&self, id: Uuid) -> Result<TreeNode, TreeError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| TreeError::not_found(id.to_string()))
    }

    /// Fresh snapshot of `node`
    pub async fn refresh(&self, node: &TreeNode) -> Result<TreeNode, TreeError> {
        self.get(node.id).await
    }

    /// Ancestors of `node`, root first, excluding `node`.
    ///
    /// # Errors
    ///
    /// [`TreeError::BrokenTree`] if any ancestor path is not stored.
    pub async fn ancestors_of(&self, node: &TreeNode) -> Result<Vec<TreeNode>, TreeError> {
        let paths = self.encoder.ancestor_paths(&node.path)?;
        if paths.is_empty() {
            return Ok(Vec::new());
        }

        let found = self.store.get_by_paths(node.kind(), &paths).await?;

        // found is path-ordered, as are the expected paths
        let mut found_iter = found.into_iter().peekable();
        let mut ancestors = Vec::with_capacity(paths.len());
        for expected in &paths {
            match found_iter.next_if(|candidate| &candidate.path == expected) {
                Some(ancestor) => ancestors.push(ancestor),
                None => {
                    tracing::warn!(
                        path = %node.path,
                        missing = %expected,
                        "Ancestor missing from store"
                    );
                    return Err(TreeError::broken_tree(node.path.clone(), expected.clone()));
                }
            }
        }
        Ok(ancestors)
    }

    /// Every node below `node`, in pre-order
    pub async fn descendants_of(&self, node: &TreeNode) -> Result<Vec<TreeNode>, TreeError> {
        self.encoder.decode(&node.path)?;
        Ok(self.store.scan_prefix(node.kind(), &node.path).await?)
    }

    /// Nodes sharing `node`'s immediate parent, excluding `node`
    pub async fn siblings_of(&self, node: &TreeNode) -> Result<Vec<TreeNode>, TreeError> {
        let parent_path = self.encoder.parent_path(&node.path)?.unwrap_or_default();
        let siblings = self.store.children(node.kind(), parent_path).await?;
        Ok(siblings
            .into_iter()
            .filter(|sibling| sibling.id != node.id)
            .collect())
    }

    /// Direct children of `node`, in path order
    pub async fn children_of(&self, node: &TreeNode) -> Result<Vec<TreeNode>, TreeError> {
        self.encoder.decode(&node.path)?;
        Ok(self.store.children(node.kind(), &node.path).await?)
    }

    /// Immediate parent of `node`, `None` for roots
    pub async fn parent_of(&self, node: &TreeNode) -> Result<Option<TreeNode>, TreeError> {
        match self.encoder.parent_path(&node.path)? {
            Some(parent_path) => self
                .store
                .get_by_path(node.kind(), parent_path)
                .await?
                .map(Some)
                .ok_or_else(|| TreeError::broken_tree(node.path.clone(), parent_path)),
            None => Ok(None),
        }
    }

    /// Root nodes of `kind`, in path order
    pub async fn roots(&self, kind: NodeKind) -> Result<Vec<TreeNode>, TreeError> {
        Ok(self.store.children(kind, "").await?)
    }

    /// Every node of `kind`, in pre-order
    pub async fn all(&self, kind: NodeKind) -> Result<Vec<TreeNode>, TreeError> {
        Ok(self.store.list(kind).await?)
    }

    /// Clear `node`'s slug so the next assignment derives it again
    pub async fn clear_slug(&self, node: &mut TreeNode) -> Result<(), TreeError> {
        self.store.clear_slug(node.id).await?;
        node.slug = None;
        Ok(())
    }
}
