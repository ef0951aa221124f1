//! Derived, display-oriented properties of tree nodes
//!
//! Nothing here is cached on the node. [`TreeNodeView::describe`] computes
//! every label from one ancestor lookup and hands the result back as
//! [`NodeLabels`]; the caller decides how long to keep it.
//!
//! # Examples
//!
//! ```rust
//! use jobboard_core::config::TreeConfig;
//! use jobboard_core::db::MemoryNodeStore;
//! use jobboard_core::models::NewNode;
//! use jobboard_core::services::MemoryJobRepository;
//! use jobboard_core::tree::{TreeNodeView, TreeStore};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let tree = TreeStore::with_defaults(Arc::new(MemoryNodeStore::new()));
//! let view = TreeNodeView::new(tree.clone(), TreeConfig::default(), Arc::new(MemoryJobRepository::new()));
//!
//! let mut technology = tree.insert_root(NewNode::category("Technology", None)).await?;
//! let software = tree.insert_child(&mut technology, NewNode::category("Software", None)).await?;
//!
//! assert_eq!(view.full_name(&software).await?, "Technology > Software");
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::TreeConfig;
use crate::models::{NodeKind, TreeNode};
use crate::tree::{slugify, TreeError, TreeStore};

/// Counts jobs that reference a category or place directly
#[async_trait]
pub trait JobCounter: Send + Sync {
    async fn count_jobs(&self, kind: NodeKind, node_id: Uuid) -> anyhow::Result<u64>;
}

/// Labels of one node snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLabels {
    /// Node these labels were computed for
    pub node_id: Uuid,

    /// Ancestor names then own name, root first
    pub full_name: String,

    /// Own name then ancestor names, root last
    pub reversed_full_name: String,

    /// Slugs from root to node
    pub full_path: String,
}

impl NodeLabels {
    /// Compute labels from an already fetched ancestor chain (root first).
    ///
    /// Nodes without a slug contribute [`slugify`] of their name to
    /// `full_path`.
    pub fn from_chain(ancestors: &[TreeNode], node: &TreeNode, config: &TreeConfig) -> Self {
        let separator = config.name_separator(node.kind());
        let chain: Vec<&TreeNode> = ancestors.iter().chain(std::iter::once(node)).collect();

        let names: Vec<&str> = chain.iter().map(|n| n.name.as_str()).collect();
        let full_name = names.join(separator);
        let reversed_full_name = names.iter().rev().copied().collect::<Vec<_>>().join(separator);

        let full_path = chain
            .iter()
            .map(|n| n.slug.clone().unwrap_or_else(|| slugify(&n.name)))
            .collect::<Vec<_>>()
            .join(&config.path_separator);

        Self {
            node_id: node.id,
            full_name,
            reversed_full_name,
            full_path,
        }
    }
}

/// Read-only derived views over a [`TreeStore`]
#[derive(Clone)]
pub struct TreeNodeView {
    tree: TreeStore,
    config: TreeConfig,
    counter: Arc<dyn JobCounter>,
}

impl TreeNodeView {
    pub fn new(tree: TreeStore, config: TreeConfig, counter: Arc<dyn JobCounter>) -> Self {
        Self {
            tree,
            config,
            counter,
        }
    }

    /// All labels of `node` from a single ancestor lookup
    pub async fn describe(&self, node: &TreeNode) -> Result<NodeLabels, TreeError> {
        let ancestors = self.tree.ancestors_of(node).await?;
        Ok(NodeLabels::from_chain(&ancestors, node, &self.config))
    }

    pub async fn full_name(&self, node: &TreeNode) -> Result<String, TreeError> {
        Ok(self.describe(node).await?.full_name)
    }

    pub async fn reversed_full_name(&self, node: &TreeNode) -> Result<String, TreeError> {
        Ok(self.describe(node).await?.reversed_full_name)
    }

    pub async fn full_path(&self, node: &TreeNode) -> Result<String, TreeError> {
        Ok(self.describe(node).await?.full_path)
    }

    /// Jobs referencing `node` directly
    pub async fn job_count(&self, node: &TreeNode) -> Result<u64, TreeError> {
        self.counter
            .count_jobs(node.kind(), node.id)
            .await
            .map_err(|source| TreeError::JobCount {
                node_id: node.id,
                source,
            })
    }

    /// Direct job count of `node` plus the direct job counts of each of its
    /// ancestors. Descendants are not included.
    pub async fn total_job_count(&self, node: &TreeNode) -> Result<u64, TreeError> {
        let mut total = self.job_count(node).await?;
        for ancestor in self.tree.ancestors_of(node).await? {
            total += self.job_count(&ancestor).await?;
        }
        Ok(total)
    }

    /// Direct job count of `node` plus those of all its descendants
    pub async fn subtree_job_count(&self, node: &TreeNode) -> Result<u64, TreeError> {
        let mut total = self.job_count(node).await?;
        for descendant in self.tree.descendants_of(node).await? {
            total += self.job_count(&descendant).await?;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryNodeStore;
    use crate::models::{NewNode, PlaceType};
    use crate::tree::SlugAssigner;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct FixedCounts(Mutex<HashMap<Uuid, u64>>);

    impl FixedCounts {
        async fn set(&self, id: Uuid, count: u64) {
            self.0.lock().await.insert(id, count);
        }
    }

    #[async_trait]
    impl JobCounter for FixedCounts {
        async fn count_jobs(&self, _kind: NodeKind, node_id: Uuid) -> anyhow::Result<u64> {
            Ok(self.0.lock().await.get(&node_id).copied().unwrap_or(0))
        }
    }

    struct FailingCounter;

    #[async_trait]
    impl JobCounter for FailingCounter {
        async fn count_jobs(&self, _kind: NodeKind, _node_id: Uuid) -> anyhow::Result<u64> {
            anyhow::bail!("job index offline")
        }
    }

    fn setup(counter: Arc<dyn JobCounter>) -> (TreeStore, TreeNodeView) {
        let tree = TreeStore::with_defaults(Arc::new(MemoryNodeStore::new()));
        let view = TreeNodeView::new(tree.clone(), TreeConfig::default(), counter);
        (tree, view)
    }

    #[tokio::test]
    async fn place_names_use_comma_separator() {
        let (tree, view) = setup(Arc::new(FixedCounts::default()));
        let mut europe = tree
            .insert_root(NewNode::place("Europe", PlaceType::Continent))
            .await
            .unwrap();
        let mut germany = tree
            .insert_child(&mut europe, NewNode::place("Germany", PlaceType::Country))
            .await
            .unwrap();
        let berlin = tree
            .insert_child(&mut germany, NewNode::place("Berlin", PlaceType::City))
            .await
            .unwrap();

        let labels = view.describe(&berlin).await.unwrap();
        assert_eq!(labels.full_name, "Europe, Germany, Berlin");
        assert_eq!(labels.reversed_full_name, "Berlin, Germany, Europe");
        assert_eq!(labels.full_path, "europe/germany/berlin");
        assert_eq!(labels.node_id, berlin.id);
    }

    #[tokio::test]
    async fn full_path_prefers_assigned_slugs() {
        let (tree, view) = setup(Arc::new(FixedCounts::default()));
        let mut tech = tree
            .insert_root(NewNode::category("Technology", None).with_slug("tech"))
            .await
            .unwrap();
        let mut software = tree
            .insert_child(&mut tech, NewNode::category("Software", None))
            .await
            .unwrap();
        SlugAssigner::new().assign(&mut software, &tree).await.unwrap();

        assert_eq!(view.full_path(&software).await.unwrap(), "tech/software");
    }

    #[tokio::test]
    async fn total_job_count_sums_self_and_ancestors_only() {
        let counts = Arc::new(FixedCounts::default());
        let (tree, view) = setup(counts.clone());
        let mut tech = tree
            .insert_root(NewNode::category("Technology", None))
            .await
            .unwrap();
        let mut software = tree
            .insert_child(&mut tech, NewNode::category("Software", None))
            .await
            .unwrap();
        let embedded = tree
            .insert_child(&mut software, NewNode::category("Embedded", None))
            .await
            .unwrap();

        counts.set(tech.id, 5).await;
        counts.set(software.id, 3).await;
        counts.set(embedded.id, 100).await;

        assert_eq!(view.job_count(&software).await.unwrap(), 3);
        assert_eq!(view.total_job_count(&software).await.unwrap(), 8);
        assert_eq!(view.subtree_job_count(&software).await.unwrap(), 103);
    }

    #[tokio::test]
    async fn counter_failures_carry_node_id() {
        let (tree, view) = setup(Arc::new(FailingCounter));
        let node = tree
            .insert_root(NewNode::category("Technology", None))
            .await
            .unwrap();

        match view.job_count(&node).await.unwrap_err() {
            TreeError::JobCount { node_id, .. } => assert_eq!(node_id, node.id),
            other => panic!("unexpected error: {other}"),
        }
    }
}
