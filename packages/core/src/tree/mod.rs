//! Hierarchical Node Tree
//!
//! Category and place trees share this core:
//!
//! - [`PathEncoder`]: fixed-width, sortable path strings
//! - [`TreeStore`]: insertion and ancestor / descendant / sibling queries
//! - [`TreeNodeView`]: full names, slug paths and job counts
//! - [`SlugAssigner`]: sibling-unique slugs
//!
//! Nodes are plain records ([`crate::models::TreeNode`]); every behaviour
//! lives in one of the services above.

mod error;
mod path;
mod slug;
mod store;
mod view;

pub use error::TreeError;
pub use path::PathEncoder;
pub(crate) use path::prefix_upper_bound;
pub use slug::{slugify, SlugAssigner};
pub use store::TreeStore;
pub use view::{JobCounter, NodeLabels, TreeNodeView};
