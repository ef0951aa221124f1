//! Tree Node Data Structures
//!
//! This module defines the `TreeNode` record shared by the two hierarchical
//! entity kinds of the job board: categories and places.
//!
//! # Architecture
//!
//! - **Composition over inheritance**: A node is a plain record. Tree behaviour
//!   lives in [`crate::tree::TreeStore`], slug behaviour in
//!   [`crate::tree::SlugAssigner`].
//! - **Materialized path**: `path` encodes the full ancestor chain as
//!   fixed-width segments, so ancestry is a string-prefix test.
//! - **Kind-specific attributes**: Category and Place data live in
//!   [`NodeAttributes`], the kind is derived from the attributes.
//!
//! # Examples
//!
//! ```rust
//! use jobboard_core::models::{NewNode, NodeKind, PlaceType};
//!
//! let category = NewNode::category("Technology", Some("All things tech"));
//! assert_eq!(category.kind(), NodeKind::Category);
//!
//! let place = NewNode::place("Berlin", PlaceType::City);
//! assert_eq!(place.kind(), NodeKind::Place);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ValidationError;
use crate::tree::slugify;

/// The two entity kinds that carry tree behaviour.
///
/// Each kind owns an independent path space: a category and a place may
/// both have path `"0001"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Category,
    Place,
}

impl NodeKind {
    /// Stable lowercase identifier, used as storage discriminator
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Category => "category",
            NodeKind::Place => "place",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "category" => Ok(NodeKind::Category),
            "place" => Ok(NodeKind::Place),
            other => Err(ValidationError::InvalidNodeKind(other.to_string())),
        }
    }
}

/// Granularity of a place, ordered coarse-to-fine.
///
/// The derived `Ord` follows declaration order, so
/// `PlaceType::Continent < PlaceType::Street`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PlaceType {
    Continent,
    Region,
    Country,
    State,
    County,
    #[default]
    City,
    Street,
}

impl PlaceType {
    /// All place types, coarse-to-fine
    pub const ALL: [PlaceType; 7] = [
        PlaceType::Continent,
        PlaceType::Region,
        PlaceType::Country,
        PlaceType::State,
        PlaceType::County,
        PlaceType::City,
        PlaceType::Street,
    ];

    /// Numeric rank (0 = continent), used as storage representation
    pub fn rank(&self) -> i64 {
        match self {
            PlaceType::Continent => 0,
            PlaceType::Region => 1,
            PlaceType::Country => 2,
            PlaceType::State => 3,
            PlaceType::County => 4,
            PlaceType::City => 5,
            PlaceType::Street => 6,
        }
    }

    /// Inverse of [`PlaceType::rank`]
    pub fn from_rank(rank: i64) -> Option<Self> {
        usize::try_from(rank)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
    }

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            PlaceType::Continent => "Continent",
            PlaceType::Region => "Region",
            PlaceType::Country => "Country",
            PlaceType::State => "State",
            PlaceType::County => "County",
            PlaceType::City => "City",
            PlaceType::Street => "Street",
        }
    }

    /// True when `self` is strictly finer-grained than `other`
    pub fn finer_than(&self, other: PlaceType) -> bool {
        *self > other
    }

    /// Place types strictly finer than `self`, coarse-to-fine
    pub fn finer_types(&self) -> Vec<PlaceType> {
        Self::ALL.iter().copied().filter(|t| t > self).collect()
    }
}

/// Category-specific attributes
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAttributes {
    pub description: Option<String>,

    /// Global display order. Unique when set; allocated automatically by
    /// the catalog service when absent.
    pub category_order: Option<u64>,
}

/// Place-specific attributes
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceAttributes {
    pub place_type: PlaceType,
}

/// Kind-specific attributes of a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NodeAttributes {
    Category(CategoryAttributes),
    Place(PlaceAttributes),
}

impl NodeAttributes {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeAttributes::Category(_) => NodeKind::Category,
            NodeAttributes::Place(_) => NodeKind::Place,
        }
    }

    pub fn as_category(&self) -> Option<&CategoryAttributes> {
        match self {
            NodeAttributes::Category(attrs) => Some(attrs),
            NodeAttributes::Place(_) => None,
        }
    }

    pub fn as_place(&self) -> Option<&PlaceAttributes> {
        match self {
            NodeAttributes::Place(attrs) => Some(attrs),
            NodeAttributes::Category(_) => None,
        }
    }
}

/// A node that has not been placed in a tree yet.
///
/// `path` and `depth` are computed by the tree store on insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNode {
    pub name: String,
    pub slug: Option<String>,
    pub attributes: NodeAttributes,
}

impl NewNode {
    pub fn category(name: impl Into<String>, description: Option<&str>) -> Self {
        Self {
            name: name.into(),
            slug: None,
            attributes: NodeAttributes::Category(CategoryAttributes {
                description: description.map(str::to_string),
                category_order: None,
            }),
        }
    }

    pub fn place(name: impl Into<String>, place_type: PlaceType) -> Self {
        Self {
            name: name.into(),
            slug: None,
            attributes: NodeAttributes::Place(PlaceAttributes { place_type }),
        }
    }

    /// Use a caller-chosen slug instead of deriving one from the name
    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    /// Set an explicit category order. Ignored for places.
    pub fn with_category_order(mut self, order: u64) -> Self {
        if let NodeAttributes::Category(attrs) = &mut self.attributes {
            attrs.category_order = Some(order);
        }
        self
    }

    pub fn kind(&self) -> NodeKind {
        self.attributes.kind()
    }

    /// Validate user-supplied fields before insertion.
    ///
    /// An explicit slug must already be in slug form (lower case ASCII,
    /// digits, `-` and `_`), so it never contains the path separator.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name".to_string()));
        }
        if let Some(slug) = &self.slug {
            if slug.is_empty() || slugify(slug) != *slug {
                return Err(ValidationError::InvalidSlug(slug.clone()));
            }
        }
        Ok(())
    }

    /// Attach tree position, producing a persistable record
    pub(crate) fn into_tree_node(self, path: String, depth: u32) -> TreeNode {
        TreeNode {
            id: Uuid::new_v4(),
            path,
            depth,
            child_count: 0,
            name: self.name,
            slug: self.slug,
            attributes: self.attributes,
            created_at: Utc::now(),
        }
    }
}

/// A persisted node of a category or place tree.
///
/// # Fields
///
/// - `id`: Unique identifier, immutable
/// - `path`: Fixed-width segment string, one segment per level (root first)
/// - `depth`: Number of path segments; roots have depth 1
/// - `child_count`: Number of direct children
/// - `name`: Display label
/// - `slug`: URL-safe identifier, unique among siblings once assigned
/// - `attributes`: Category or place specific data
///
/// A `TreeNode` value is a snapshot. Store operations that change the
/// stored record (child insertion, slug assignment) update the snapshot
/// they were handed; other snapshots of the same node go stale until
/// refreshed through [`crate::tree::TreeStore::refresh`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub id: Uuid,
    pub path: String,
    pub depth: u32,
    pub child_count: u32,
    pub name: String,
    pub slug: Option<String>,
    pub attributes: NodeAttributes,
    pub created_at: DateTime<Utc>,
}

impl TreeNode {
    pub fn kind(&self) -> NodeKind {
        self.attributes.kind()
    }

    pub fn is_root(&self) -> bool {
        self.depth == 1
    }

    pub fn is_leaf(&self) -> bool {
        self.child_count == 0
    }

    /// Place type, if this node is a place
    pub fn place_type(&self) -> Option<PlaceType> {
        self.attributes.as_place().map(|attrs| attrs.place_type)
    }

    /// Category order, if this node is a category with an order
    pub fn category_order(&self) -> Option<u64> {
        self.attributes
            .as_category()
            .and_then(|attrs| attrs.category_order)
    }
}

impl fmt::Display for TreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
