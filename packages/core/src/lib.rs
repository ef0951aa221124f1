//! Job Board Core
//!
//! Category and place hierarchies for a job board, plus the job posting
//! rules and notification plumbing built on top of them.
//!
//! # Architecture
//!
//! - **Materialized paths**: every node stores its position as a fixed-width
//!   path string; lexicographic order of paths is pre-order of the tree
//! - **Atomic store primitives**: sequence allocation, insertion with the
//!   parent's child count, and slug claims are single atomic operations of
//!   the [`db::NodeStore`], so the tree layer holds no locks
//! - **libsql**: embedded SQLite-compatible backend; an in-memory store
//!   backs tests and ephemeral use
//!
//! # Modules
//!
//! - [`tree`] - Path encoding, tree queries, slugs, labels and job counts
//! - [`db`] - Node store trait and its memory and libsql backends
//! - [`models`] - Nodes, jobs and validation errors
//! - [`services`] - Catalog, job posting and notification services
//! - [`config`] - Board and tree settings
//! - [`logging`] - Tracing subscriber setup

pub mod config;
pub mod db;
pub mod logging;
pub mod models;
pub mod services;
pub mod tree;

// Re-export commonly used types
pub use config::{BoardConfig, TreeConfig};
pub use models::*;
pub use tree::{PathEncoder, SlugAssigner, TreeError, TreeNodeView, TreeStore};
