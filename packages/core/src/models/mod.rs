//! Data Models
//!
//! This module contains the data structures of the job board:
//!
//! - `TreeNode` - Category or place positioned in a materialized-path tree
//! - `NewNode` - Node input before tree placement
//! - `Job` / `JobStat` - Job postings and their interaction statistics
//! - `ValidationError` - Rule violations surfaced to the submitting user

mod job;
mod node;
mod validation;

pub use job::{normalize_salary, Job, JobStat, MarkupLanguage, NewJob, StatType};
pub use node::{
    CategoryAttributes, NewNode, NodeAttributes, NodeKind, PlaceAttributes, PlaceType, TreeNode,
};
pub use validation::ValidationError;
