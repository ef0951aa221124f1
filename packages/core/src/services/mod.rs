//! Business Services
//!
//! - `CatalogService` - Category and place creation, listing and slug lookup
//! - `JobService` - Job posting rules, activation, statistics and search
//! - `NotificationQueue` - Bounded background queue for outgoing mail
//!
//! Services coordinate the tree core and the job repository, implementing
//! the board's business rules.

pub mod catalog_service;
pub mod error;
pub mod job_repository;
pub mod job_service;
pub mod notifications;

pub use catalog_service::{CatalogService, PlaceRules};
pub use error::{CatalogError, JobServiceError};
pub use job_repository::{JobFilter, JobRepository, JobSearch, MemoryJobRepository};
pub use job_service::{CompanyJobCount, JobService};
pub use notifications::{
    Mailer, Notification, NotificationError, NotificationKind, NotificationQueue,
    NotificationSender,
};
