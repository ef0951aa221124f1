//! Catalog Service
//!
//! Creates and lists categories and places on top of the tree core. Every
//! node created here gets its path from [`TreeStore`] and its slug from
//! [`SlugAssigner`]; categories additionally get a `category_order` from
//! the store's atomic sequence when none is given.
//!
//! # Examples
//!
//! ```rust
//! use jobboard_core::config::BoardConfig;
//! use jobboard_core::db::MemoryNodeStore;
//! use jobboard_core::models::NewNode;
//! use jobboard_core::services::CatalogService;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let catalog = CatalogService::new(Arc::new(MemoryNodeStore::new()), BoardConfig::default())?;
//! let mut tech = catalog.create_category(None, NewNode::category("Technology", None)).await?;
//! let rust = catalog
//!     .create_category(Some(&mut tech), NewNode::category("Rust", None))
//!     .await?;
//!
//! assert_eq!(rust.path, "00010001");
//! assert_eq!(catalog.resolve_slug_path(rust.kind(), "technology/rust").await?.id, rust.id);
//! # Ok(())
//! # }
//! ```

use std::cmp::Ordering;
use std::sync::Arc;

use crate::config::BoardConfig;
use crate::db::{NodeStore, SequenceScope};
use crate::models::{NewNode, NodeAttributes, NodeKind, PlaceType, TreeNode, ValidationError};
use crate::services::error::CatalogError;
use crate::tree::{JobCounter, PathEncoder, SlugAssigner, TreeError, TreeNodeView, TreeStore};

/// Coarse-to-fine nesting rule for places
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceRules;

impl PlaceRules {
    /// Check that `place_type` is strictly finer than every place type in
    /// `ancestors`.
    ///
    /// # Errors
    ///
    /// [`ValidationError::PlaceTypeNesting`] listing the types that would be
    /// accepted.
    pub fn check_nesting(
        ancestors: &[TreeNode],
        place_type: PlaceType,
    ) -> Result<(), ValidationError> {
        let Some(finest) = ancestors.iter().filter_map(TreeNode::place_type).max() else {
            return Ok(());
        };

        if place_type.finer_than(finest) {
            Ok(())
        } else {
            Err(ValidationError::place_type_nesting(
                place_type,
                finest.finer_types(),
            ))
        }
    }
}

/// Category and place management
#[derive(Clone)]
pub struct CatalogService {
    tree: TreeStore,
    slugs: SlugAssigner,
    config: Arc<BoardConfig>,
}

impl CatalogService {
    /// Create a catalog over `store` with the tree settings of `config`
    pub fn new(store: Arc<dyn NodeStore>, config: BoardConfig) -> Result<Self, CatalogError> {
        config.validate()?;
        let encoder = PathEncoder::new(&config.tree)?;
        Ok(Self {
            tree: TreeStore::new(store, encoder),
            slugs: SlugAssigner::new(),
            config: Arc::new(config),
        })
    }

    pub fn tree(&self) -> &TreeStore {
        &self.tree
    }

    pub fn config(&self) -> &Arc<BoardConfig> {
        &self.config
    }

    /// Label and job-count view sharing this catalog's tree and settings
    pub fn view(&self, counter: Arc<dyn JobCounter>) -> TreeNodeView {
        TreeNodeView::new(self.tree.clone(), self.config.tree.clone(), counter)
    }

    /// Create a category as a root (`parent` is `None`) or under `parent`.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::CategoryNameTaken`] if a category already has the name
    /// - [`CatalogError::Validation`] if `node` is not a category or fails validation
    /// - [`CatalogError::Tree`] with [`TreeError::KindMismatch`] if `parent` is a place
    ///
    /// All checks run before a `category_order` is allocated, so a rejected
    /// category leaves the order sequence untouched.
    pub async fn create_category(
        &self,
        parent: Option<&mut TreeNode>,
        mut node: NewNode,
    ) -> Result<TreeNode, CatalogError> {
        if let Some(parent) = parent.as_deref() {
            if parent.kind() != NodeKind::Category {
                return Err(TreeError::KindMismatch {
                    parent: parent.kind(),
                    child: node.kind(),
                }
                .into());
            }
        }
        node.validate()?;
        let NodeAttributes::Category(attrs) = &mut node.attributes else {
            return Err(ValidationError::InvalidNodeKind(node.kind().to_string()).into());
        };

        let store = self.tree.node_store();
        let existing = store
            .find_by_name(NodeKind::Category, &node.name)
            .await
            .map_err(TreeError::from)?;
        if !existing.is_empty() {
            return Err(CatalogError::category_name_taken(node.name));
        }

        if attrs.category_order.is_none() {
            let order = store
                .allocate(&SequenceScope::CategoryOrder)
                .await
                .map_err(TreeError::from)?;
            tracing::debug!(name = %node.name, order, "Allocated category order");
            attrs.category_order = Some(order);
        }

        let name = node.name.clone();
        self.insert(parent, node).await.map_err(|err| match err {
            CatalogError::CategoryNameTaken { .. } => CatalogError::category_name_taken(name),
            other => other,
        })
    }

    /// Create a place as a root (`parent` is `None`) or under `parent`.
    ///
    /// The coarse-to-fine nesting rule is checked only when
    /// `enforce_place_nesting` is set.
    pub async fn create_place(
        &self,
        parent: Option<&mut TreeNode>,
        node: NewNode,
    ) -> Result<TreeNode, CatalogError> {
        let NodeAttributes::Place(attrs) = &node.attributes else {
            return Err(ValidationError::InvalidNodeKind(node.kind().to_string()).into());
        };

        if self.config.enforce_place_nesting {
            if let Some(parent) = parent.as_deref() {
                let mut chain = self.tree.ancestors_of(parent).await?;
                chain.push(parent.clone());
                PlaceRules::check_nesting(&chain, attrs.place_type)?;
            }
        }

        self.insert(parent, node).await
    }

    /// Store the node, then give it a sibling-unique slug.
    ///
    /// The two steps are separate writes. If slug assignment fails the node
    /// stays stored with `slug: None`; `SlugAssigner::assign` can be rerun on it.
    async fn insert(
        &self,
        parent: Option<&mut TreeNode>,
        node: NewNode,
    ) -> Result<TreeNode, CatalogError> {
        let mut created = match parent {
            Some(parent) => self.tree.insert_child(parent, node).await?,
            None => self.tree.insert_root(node).await?,
        };
        self.slugs.assign(&mut created, &self.tree).await?;
        Ok(created)
    }

    /// Root categories ordered by `category_order`, unordered ones last
    pub async fn list_categories(&self) -> Result<Vec<TreeNode>, CatalogError> {
        let mut roots = self.tree.roots(NodeKind::Category).await?;
        roots.sort_by(|a, b| {
            let by_order = match (a.category_order(), b.category_order()) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            by_order.then_with(|| a.path.cmp(&b.path))
        });
        Ok(roots)
    }

    /// Places up to `default_place_hierarchy` levels deep, coarse types first
    pub async fn list_places(&self) -> Result<Vec<TreeNode>, CatalogError> {
        let max_depth = self.config.default_place_hierarchy;
        let mut places: Vec<TreeNode> = self
            .tree
            .all(NodeKind::Place)
            .await?
            .into_iter()
            .filter(|place| max_depth == 0 || place.depth <= max_depth)
            .collect();
        places.sort_by(|a, b| {
            a.place_type()
                .cmp(&b.place_type())
                .then_with(|| a.path.cmp(&b.path))
        });
        Ok(places)
    }

    /// Find the node whose slugs from the root match `slug_path`
    /// (e.g. `"technology/software"`)
    pub async fn resolve_slug_path(
        &self,
        kind: NodeKind,
        slug_path: &str,
    ) -> Result<TreeNode, CatalogError> {
        let separator = self.config.tree.path_separator.as_str();
        let mut current: Option<TreeNode> = None;

        for segment in slug_path.split(separator).filter(|s| !s.is_empty()) {
            let candidates = match &current {
                Some(node) => self.tree.children_of(node).await?,
                None => self.tree.roots(kind).await?,
            };
            current = Some(
                candidates
                    .into_iter()
                    .find(|candidate| candidate.slug.as_deref() == Some(segment))
                    .ok_or_else(|| CatalogError::unknown_slug_path(kind, slug_path))?,
            );
        }

        current.ok_or_else(|| CatalogError::unknown_slug_path(kind, slug_path))
    }
}
