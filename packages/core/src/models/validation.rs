//! Validation errors raised by model rules before anything is persisted.

use thiserror::Error;
use uuid::Uuid;

use super::PlaceType;

/// Validation errors for nodes and job postings
///
/// These are user-facing, normal-flow failures: the submitting caller is
/// expected to correct the input. They are never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid node kind: {0}")]
    InvalidNodeKind(String),

    #[error("Invalid slug: '{0}'")]
    InvalidSlug(String),

    #[error("Invalid salary range: minimum {min} exceeds maximum {max}")]
    InvalidSalaryRange { min: u64, max: u64 },

    #[error("Job posting end date is in the past")]
    ExpiredPosting,

    #[error(
        "Similar active job posting from your company already exists (job {existing_id}). \
         Change the title of your posting or deactivate the original one"
    )]
    DuplicatePosting { existing_id: Uuid },

    #[error("Please wait {minutes} minutes between two applications")]
    ApplicationTooSoon { minutes: u64 },

    #[error("Place cannot be of type {requested}. It needs to be one of: {}", format_types(.allowed))]
    PlaceTypeNesting {
        requested: &'static str,
        allowed: Vec<PlaceType>,
    },
}

impl ValidationError {
    /// Create a place nesting error for `requested`, listing permissible types
    pub fn place_type_nesting(requested: PlaceType, allowed: Vec<PlaceType>) -> Self {
        Self::PlaceTypeNesting {
            requested: requested.label(),
            allowed,
        }
    }
}

fn format_types(types: &[PlaceType]) -> String {
    if types.is_empty() {
        return "none".to_string();
    }
    types
        .iter()
        .map(PlaceType::label)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nesting_error_lists_allowed_types() {
        let err = ValidationError::place_type_nesting(
            PlaceType::Country,
            vec![PlaceType::City, PlaceType::Street],
        );
        assert_eq!(
            err.to_string(),
            "Place cannot be of type Country. It needs to be one of: City, Street"
        );
    }

    #[test]
    fn nesting_error_with_no_allowed_types() {
        let err = ValidationError::place_type_nesting(PlaceType::Street, Vec::new());
        assert!(err.to_string().ends_with("one of: none"));
    }
}
