//! Database Layer
//!
//! Persistence for category and place trees:
//!
//! - [`NodeStore`]: the storage abstraction with atomic allocation,
//!   insertion and slug claiming
//! - [`MemoryNodeStore`]: in-process implementation
//! - [`LibsqlNodeStore`]: libsql implementation over [`DatabaseService`]
//!   (feature `libsql-store`, on by default)

mod error;
mod memory_store;
mod node_store;

#[cfg(feature = "libsql-store")]
mod database;
#[cfg(feature = "libsql-store")]
mod libsql_store;


pub use error::{ConflictKind, DatabaseError};
pub use memory_store::MemoryNodeStore;
pub use node_store::{InsertOutcome, NodeInsert, NodeStore, SequenceScope, SlugClaim};

#[cfg(feature = "libsql-store")]
pub use database::{DatabaseService, BUSY_TIMEOUT_MS};
#[cfg(feature = "libsql-store")]
pub use libsql_store::LibsqlNodeStore;
