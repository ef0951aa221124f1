//! In-memory NodeStore
//!
//! Keeps each kind's nodes in a `BTreeMap` keyed by path, so prefix scans
//! are ordered range scans. A single `RwLock` makes every trait method
//! atomic: writers hold the lock across the whole check-then-write.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::{
    ConflictKind, DatabaseError, InsertOutcome, NodeInsert, NodeStore, SequenceScope, SlugClaim,
};
use crate::models::{NodeKind, TreeNode};
use crate::tree::prefix_upper_bound;

#[derive(Debug, Clone)]
struct StoredNode {
    node: TreeNode,
    parent_path: String,
    local_index: u64,
}

#[derive(Debug, Default)]
struct MemoryState {
    trees: HashMap<NodeKind, BTreeMap<String, StoredNode>>,
    locations: HashMap<Uuid, (NodeKind, String)>,
    sequences: HashMap<String, u64>,
}

impl MemoryState {
    fn tree(&self, kind: NodeKind) -> impl Iterator<Item = &StoredNode> {
        self.trees.get(&kind).into_iter().flat_map(|tree| tree.values())
    }

    fn siblings<'a>(
        &'a self,
        kind: NodeKind,
        parent_path: &'a str,
    ) -> impl Iterator<Item = &'a StoredNode> + 'a {
        self.tree(kind)
            .filter(move |stored| stored.parent_path == parent_path)
    }

    fn locate(&self, id: Uuid) -> Option<&StoredNode> {
        let (kind, path) = self.locations.get(&id)?;
        self.trees.get(kind)?.get(path)
    }

    fn locate_mut(&mut self, id: Uuid) -> Option<&mut StoredNode> {
        let (kind, path) = self.locations.get(&id)?;
        self.trees.get_mut(kind)?.get_mut(path)
    }

    fn sequence_floor(&self, scope: &SequenceScope) -> u64 {
        match scope {
            SequenceScope::Children { kind, parent_path } => {
                self.siblings(*kind, parent_path)
                    .map(|stored| stored.local_index)
                    .max()
                    .unwrap_or(0)
                    + 1
            }
            SequenceScope::CategoryOrder => self
                .tree(NodeKind::Category)
                .filter_map(|stored| stored.node.category_order())
                .max()
                .map(|max| max + 1)
                .unwrap_or(0),
        }
    }

    fn check_unique(&self, insert: &NodeInsert) -> Result<(), DatabaseError> {
        let node = &insert.node;
        let kind = node.kind();

        if self.locations.contains_key(&node.id) {
            return Err(DatabaseError::conflict(ConflictKind::Id, node.id.to_string()));
        }

        if self
            .trees
            .get(&kind)
            .is_some_and(|tree| tree.contains_key(&node.path))
        {
            return Err(DatabaseError::conflict(ConflictKind::Path, node.path.clone()));
        }

        if let Some(slug) = &node.slug {
            if self
                .siblings(kind, &insert.parent_path)
                .any(|stored| stored.node.slug.as_deref() == Some(slug.as_str()))
            {
                return Err(DatabaseError::conflict(ConflictKind::SiblingSlug, slug.clone()));
            }
        }

        if kind == NodeKind::Category {
            if self
                .tree(NodeKind::Category)
                .any(|stored| stored.node.name == node.name)
            {
                return Err(DatabaseError::conflict(
                    ConflictKind::CategoryName,
                    node.name.clone(),
                ));
            }

            if let Some(order) = node.category_order() {
                if self
                    .tree(NodeKind::Category)
                    .any(|stored| stored.node.category_order() == Some(order))
                {
                    return Err(DatabaseError::conflict(
                        ConflictKind::CategoryOrder,
                        order.to_string(),
                    ));
                }
            }
        }

        Ok(())
    }
}

/// NodeStore kept entirely in process memory
#[derive(Debug, Default)]
pub struct MemoryNodeStore {
    state: RwLock<MemoryState>,
}

impl MemoryNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored nodes of `kind`
    pub async fn len(&self, kind: NodeKind) -> usize {
        let state = self.state.read().await;
        state.trees.get(&kind).map_or(0, BTreeMap::len)
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.locations.is_empty()
    }
}

#[async_trait]
impl NodeStore for MemoryNodeStore {
    async fn allocate(&self, scope: &SequenceScope) -> Result<u64, DatabaseError> {
        let mut state = self.state.write().await;
        let floor = state.sequence_floor(scope);
        let key = scope.key();
        let next = match state.sequences.get(&key) {
            Some(previous) => (previous + 1).max(floor),
            None => floor,
        };
        state.sequences.insert(key, next);
        Ok(next)
    }

    async fn insert(&self, insert: NodeInsert) -> Result<InsertOutcome, DatabaseError> {
        let mut state = self.state.write().await;
        state.check_unique(&insert)?;

        let parent_child_count = match insert.parent_id {
            Some(parent_id) => {
                let parent = state
                    .locate_mut(parent_id)
                    .ok_or_else(|| DatabaseError::not_found(parent_id))?;
                parent.node.child_count += 1;
                Some(parent.node.child_count)
            }
            None => None,
        };

        let node = insert.node;
        let kind = node.kind();
        state.locations.insert(node.id, (kind, node.path.clone()));
        state.trees.entry(kind).or_default().insert(
            node.path.clone(),
            StoredNode {
                node: node.clone(),
                parent_path: insert.parent_path,
                local_index: insert.local_index,
            },
        );

        Ok(InsertOutcome {
            node,
            parent_child_count,
        })
    }

    async fn get(&self, id: Uuid) -> Result<Option<TreeNode>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state.locate(id).map(|stored| stored.node.clone()))
    }

    async fn get_by_path(
        &self,
        kind: NodeKind,
        path: &str,
    ) -> Result<Option<TreeNode>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state
            .trees
            .get(&kind)
            .and_then(|tree| tree.get(path))
            .map(|stored| stored.node.clone()))
    }

    async fn get_by_paths(
        &self,
        kind: NodeKind,
        paths: &[String],
    ) -> Result<Vec<TreeNode>, DatabaseError> {
        let state = self.state.read().await;
        let Some(tree) = state.trees.get(&kind) else {
            return Ok(Vec::new());
        };
        let mut nodes: Vec<TreeNode> = paths
            .iter()
            .filter_map(|path| tree.get(path))
            .map(|stored| stored.node.clone())
            .collect();
        nodes.sort_by(|a, b| a.path.cmp(&b.path));
        nodes.dedup_by(|a, b| a.path == b.path);
        Ok(nodes)
    }

    async fn scan_prefix(
        &self,
        kind: NodeKind,
        prefix: &str,
    ) -> Result<Vec<TreeNode>, DatabaseError> {
        let state = self.state.read().await;
        let Some(tree) = state.trees.get(&kind) else {
            return Ok(Vec::new());
        };
        let upper = prefix_upper_bound(prefix);
        Ok(tree
            .range::<str, _>((Bound::Excluded(prefix), Bound::Excluded(upper.as_str())))
            .map(|(_, stored)| stored.node.clone())
            .collect())
    }

    async fn children(
        &self,
        kind: NodeKind,
        parent_path: &str,
    ) -> Result<Vec<TreeNode>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state
            .siblings(kind, parent_path)
            .map(|stored| stored.node.clone())
            .collect())
    }

    async fn list(&self, kind: NodeKind) -> Result<Vec<TreeNode>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state.tree(kind).map(|stored| stored.node.clone()).collect())
    }

    async fn find_by_name(
        &self,
        kind: NodeKind,
        name: &str,
    ) -> Result<Vec<TreeNode>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state
            .tree(kind)
            .filter(|stored| stored.node.name == name)
            .map(|stored| stored.node.clone())
            .collect())
    }

    async fn try_set_slug(&self, id: Uuid, slug: &str) -> Result<SlugClaim, DatabaseError> {
        let mut state = self.state.write().await;
        let (kind, parent_path) = {
            let stored = state.locate(id).ok_or_else(|| DatabaseError::not_found(id))?;
            if let Some(existing) = &stored.node.slug {
                return Ok(SlugClaim::AlreadySet(existing.clone()));
            }
            (stored.node.kind(), stored.parent_path.clone())
        };

        let taken = state
            .siblings(kind, &parent_path)
            .any(|stored| stored.node.id != id && stored.node.slug.as_deref() == Some(slug));
        if taken {
            return Ok(SlugClaim::Taken);
        }

        if let Some(stored) = state.locate_mut(id) {
            stored.node.slug = Some(slug.to_string());
        }
        Ok(SlugClaim::Claimed)
    }

    async fn clear_slug(&self, id: Uuid) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        let stored = state
            .locate_mut(id)
            .ok_or_else(|| DatabaseError::not_found(id))?;
        stored.node.slug = None;
        Ok(())
    }
}
