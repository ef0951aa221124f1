//! LibsqlNodeStore - NodeStore Implementation for the libsql Backend
//!
//! Persists tree nodes in the `tree_nodes` table created by
//! [`DatabaseService`].
//!
//! # Design Principles
//!
//! 1. **Single-statement primitives**: Index allocation is one
//!    `INSERT .. ON CONFLICT DO UPDATE .. RETURNING` statement, slug claiming
//!    is one conditional `UPDATE`
//! 2. **Schema-enforced uniqueness**: Unique indexes reject duplicate paths,
//!    sibling slugs, category names and category orders; the failure is
//!    mapped to [`DatabaseError::Conflict`]
//! 3. **Row Conversion**: `row_to_node` is the single decoding point
//!
//! # Examples
//!
//! ```rust,no_run
//! use jobboard_core::db::{DatabaseService, LibsqlNodeStore, NodeStore};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let db = Arc::new(DatabaseService::new(PathBuf::from("./data/board.db")).await?);
//!     let store: Arc<dyn NodeStore> = Arc::new(LibsqlNodeStore::new(db));
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use libsql::params::Params;
use libsql::{Connection, Row, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::node_store::{InsertOutcome, NodeInsert, NodeStore, SequenceScope, SlugClaim};
use crate::db::{ConflictKind, DatabaseError, DatabaseService};
use crate::models::{
    CategoryAttributes, NodeAttributes, NodeKind, PlaceAttributes, PlaceType, TreeNode,
};
use crate::tree::prefix_upper_bound;

const NODE_COLUMNS: &str = "id, kind, path, parent_path, local_index, depth, child_count, \
                            name, slug, description, category_order, place_type, created_at";

/// NodeStore over a libsql database
pub struct LibsqlNodeStore {
    db: Arc<DatabaseService>,
}

impl LibsqlNodeStore {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Arc<DatabaseService> {
        &self.db
    }

    /// Parse timestamp from database - handles both SQLite and RFC3339 formats
    fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }

        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
            .map(|naive| naive.and_utc())
            .map_err(|_| {
                DatabaseError::row_decode(format!(
                    "Unable to parse timestamp '{}' as RFC3339 or SQLite format",
                    s
                ))
            })
    }

    /// Convert libsql::Row to TreeNode
    ///
    /// Expects the columns of `NODE_COLUMNS`, in order.
    fn row_to_node(row: &Row) -> Result<TreeNode, DatabaseError> {
        let column = |idx: i32, name: &str, e: libsql::Error| {
            DatabaseError::row_decode(format!("Failed to get {} (column {}): {}", name, idx, e))
        };

        let id: String = row.get(0).map_err(|e| column(0, "id", e))?;
        let kind: String = row.get(1).map_err(|e| column(1, "kind", e))?;
        let path: String = row.get(2).map_err(|e| column(2, "path", e))?;
        let depth: i64 = row.get(5).map_err(|e| column(5, "depth", e))?;
        let child_count: i64 = row.get(6).map_err(|e| column(6, "child_count", e))?;
        let name: String = row.get(7).map_err(|e| column(7, "name", e))?;
        let slug: Option<String> = row.get(8).map_err(|e| column(8, "slug", e))?;
        let description: Option<String> = row.get(9).map_err(|e| column(9, "description", e))?;
        let category_order: Option<i64> =
            row.get(10).map_err(|e| column(10, "category_order", e))?;
        let place_type: Option<i64> = row.get(11).map_err(|e| column(11, "place_type", e))?;
        let created_at: String = row.get(12).map_err(|e| column(12, "created_at", e))?;

        let id = Uuid::parse_str(&id)
            .map_err(|e| DatabaseError::row_decode(format!("Invalid node id '{}': {}", id, e)))?;
        let kind: NodeKind = kind
            .parse()
            .map_err(|e| DatabaseError::row_decode(format!("Node {}: {}", id, e)))?;

        let attributes = match kind {
            NodeKind::Category => NodeAttributes::Category(CategoryAttributes {
                description,
                category_order: category_order
                    .map(|order| from_db_int(order, "category_order"))
                    .transpose()?,
            }),
            NodeKind::Place => {
                let rank = place_type.ok_or_else(|| {
                    DatabaseError::row_decode(format!("Place {} has no place_type", id))
                })?;
                let place_type = PlaceType::from_rank(rank).ok_or_else(|| {
                    DatabaseError::row_decode(format!("Place {} has unknown place_type {}", id, rank))
                })?;
                NodeAttributes::Place(PlaceAttributes { place_type })
            }
        };

        Ok(TreeNode {
            id,
            path,
            depth: u32::try_from(depth)
                .map_err(|_| DatabaseError::row_decode(format!("Node {} has depth {}", id, depth)))?,
            child_count: u32::try_from(child_count).map_err(|_| {
                DatabaseError::row_decode(format!("Node {} has child_count {}", id, child_count))
            })?,
            name,
            slug,
            attributes,
            created_at: Self::parse_timestamp(&created_at)?,
        })
    }

    /// Run a node query and decode every row
    async fn query_nodes(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<TreeNode>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        let mut rows = conn
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Query failed: {}", e)))?;

        let mut nodes = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to fetch row: {}", e)))?
        {
            nodes.push(Self::row_to_node(&row)?);
        }
        Ok(nodes)
    }

    async fn query_node(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Option<TreeNode>, DatabaseError> {
        Ok(self.query_nodes(sql, params).await?.into_iter().next())
    }

    async fn insert_in_transaction(
        conn: &Connection,
        insert: &NodeInsert,
    ) -> Result<Option<u32>, DatabaseError> {
        let parent_child_count = match insert.parent_id {
            Some(parent_id) => {
                let mut rows = conn
                    .query(
                        "UPDATE tree_nodes SET child_count = child_count + 1
                         WHERE id = ?1 RETURNING child_count",
                        [parent_id.to_string()],
                    )
                    .await
                    .map_err(|e| {
                        DatabaseError::sql_execution(format!(
                            "Failed to update child count of {}: {}",
                            parent_id, e
                        ))
                    })?;
                let row = rows
                    .next()
                    .await
                    .map_err(|e| {
                        DatabaseError::sql_execution(format!("Failed to fetch row: {}", e))
                    })?
                    .ok_or_else(|| DatabaseError::not_found(parent_id))?;
                let count: i64 = row
                    .get(0)
                    .map_err(|e| DatabaseError::row_decode(format!("child_count: {}", e)))?;
                Some(u32::try_from(count).map_err(|_| {
                    DatabaseError::row_decode(format!("Node {} has child_count {}", parent_id, count))
                })?)
            }
            None => None,
        };

        let node = &insert.node;
        let (description, category_order, place_type) = match &node.attributes {
            NodeAttributes::Category(attrs) => (
                attrs.description.clone(),
                attrs.category_order.map(to_db_int).transpose()?,
                None,
            ),
            NodeAttributes::Place(attrs) => (None, None, Some(attrs.place_type.rank())),
        };

        conn.execute(
            &format!(
                "INSERT INTO tree_nodes ({NODE_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, ?9, ?10, ?11, ?12)"
            ),
            libsql::params![
                node.id.to_string(),
                node.kind().as_str(),
                node.path.as_str(),
                insert.parent_path.as_str(),
                to_db_int(insert.local_index)?,
                i64::from(node.depth),
                node.name.as_str(),
                node.slug.clone(),
                description,
                category_order,
                place_type,
                node.created_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| write_error(e, &format!("insert {} '{}'", node.kind(), node.path)))?;

        Ok(parent_child_count)
    }
}

#[async_trait]
impl NodeStore for LibsqlNodeStore {
    async fn allocate(&self, scope: &SequenceScope) -> Result<u64, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;

        let upsert = |floor: &str| {
            format!(
                "INSERT INTO tree_sequences (scope, value) VALUES (?1, ({floor}))
                 ON CONFLICT(scope) DO UPDATE
                 SET value = MAX(tree_sequences.value + 1, excluded.value)
                 RETURNING value"
            )
        };

        let mut rows = match scope {
            SequenceScope::Children { kind, parent_path } => {
                conn.query(
                    &upsert(
                        "SELECT COALESCE(MAX(local_index), 0) + 1 FROM tree_nodes
                         WHERE kind = ?2 AND parent_path = ?3",
                    ),
                    libsql::params![scope.key(), kind.as_str(), parent_path.as_str()],
                )
                .await
            }
            SequenceScope::CategoryOrder => {
                conn.query(
                    &upsert(
                        "SELECT COALESCE(MAX(category_order) + 1, 0) FROM tree_nodes
                         WHERE kind = 'category'",
                    ),
                    [scope.key()],
                )
                .await
            }
        }
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to allocate {}: {}", scope.key(), e))
        })?;

        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to fetch row: {}", e)))?
            .ok_or_else(|| {
                DatabaseError::sql_execution(format!("Allocation of {} returned no row", scope.key()))
            })?;
        let value: i64 = row
            .get(0)
            .map_err(|e| DatabaseError::row_decode(format!("sequence value: {}", e)))?;

        from_db_int(value, "sequence value")
    }

    async fn insert(&self, insert: NodeInsert) -> Result<InsertOutcome, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;

        conn.execute("BEGIN IMMEDIATE", ()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to begin transaction: {}", e))
        })?;

        let parent_child_count = match Self::insert_in_transaction(&conn, &insert).await {
            Ok(count) => count,
            Err(e) => {
                let _rollback = conn.execute("ROLLBACK", ()).await;
                return Err(e);
            }
        };

        if let Err(e) = conn.execute("COMMIT", ()).await {
            let _rollback = conn.execute("ROLLBACK", ()).await;
            return Err(DatabaseError::sql_execution(format!(
                "Failed to commit transaction: {}",
                e
            )));
        }

        Ok(InsertOutcome {
            node: insert.node,
            parent_child_count,
        })
    }

    async fn get(&self, id: Uuid) -> Result<Option<TreeNode>, DatabaseError> {
        self.query_node(
            &format!("SELECT {NODE_COLUMNS} FROM tree_nodes WHERE id = ?1"),
            [id.to_string()],
        )
        .await
    }

    async fn get_by_path(
        &self,
        kind: NodeKind,
        path: &str,
    ) -> Result<Option<TreeNode>, DatabaseError> {
        self.query_node(
            &format!("SELECT {NODE_COLUMNS} FROM tree_nodes WHERE kind = ?1 AND path = ?2"),
            [kind.as_str(), path],
        )
        .await
    }

    async fn get_by_paths(
        &self,
        kind: NodeKind,
        paths: &[String],
    ) -> Result<Vec<TreeNode>, DatabaseError> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = (2..paths.len() + 2)
            .map(|n| format!("?{n}"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut values = Vec::with_capacity(paths.len() + 1);
        values.push(Value::Text(kind.as_str().to_string()));
        values.extend(paths.iter().cloned().map(Value::Text));

        self.query_nodes(
            &format!(
                "SELECT {NODE_COLUMNS} FROM tree_nodes
                 WHERE kind = ?1 AND path IN ({placeholders}) ORDER BY path"
            ),
            Params::Positional(values),
        )
        .await
    }

    async fn scan_prefix(
        &self,
        kind: NodeKind,
        prefix: &str,
    ) -> Result<Vec<TreeNode>, DatabaseError> {
        let upper = prefix_upper_bound(prefix);
        self.query_nodes(
            &format!(
                "SELECT {NODE_COLUMNS} FROM tree_nodes
                 WHERE kind = ?1 AND path > ?2 AND path < ?3 ORDER BY path"
            ),
            [kind.as_str(), prefix, upper.as_str()],
        )
        .await
    }

    async fn children(
        &self,
        kind: NodeKind,
        parent_path: &str,
    ) -> Result<Vec<TreeNode>, DatabaseError> {
        self.query_nodes(
            &format!(
                "SELECT {NODE_COLUMNS} FROM tree_nodes
                 WHERE kind = ?1 AND parent_path = ?2 ORDER BY path"
            ),
            [kind.as_str(), parent_path],
        )
        .await
    }

    async fn list(&self, kind: NodeKind) -> Result<Vec<TreeNode>, DatabaseError> {
        self.query_nodes(
            &format!("SELECT {NODE_COLUMNS} FROM tree_nodes WHERE kind = ?1 ORDER BY path"),
            [kind.as_str()],
        )
        .await
    }

    async fn find_by_name(
        &self,
        kind: NodeKind,
        name: &str,
    ) -> Result<Vec<TreeNode>, DatabaseError> {
        self.query_nodes(
            &format!(
                "SELECT {NODE_COLUMNS} FROM tree_nodes
                 WHERE kind = ?1 AND name = ?2 ORDER BY path"
            ),
            [kind.as_str(), name],
        )
        .await
    }

    async fn try_set_slug(&self, id: Uuid, slug: &str) -> Result<SlugClaim, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;

        let updated = conn
            .execute(
                "UPDATE tree_nodes SET slug = ?1 WHERE id = ?2 AND slug IS NULL",
                [slug.to_string(), id.to_string()],
            )
            .await;

        match updated {
            Ok(1) => Ok(SlugClaim::Claimed),
            Ok(_) => match self.get(id).await? {
                None => Err(DatabaseError::not_found(id)),
                Some(TreeNode {
                    slug: Some(existing),
                    ..
                }) => Ok(SlugClaim::AlreadySet(existing)),
                Some(_) => Err(DatabaseError::sql_execution(format!(
                    "Slug of node {} changed during assignment",
                    id
                ))),
            },
            Err(e) => match write_error(e, &format!("set slug '{}' on {}", slug, id)) {
                DatabaseError::Conflict {
                    kind: ConflictKind::SiblingSlug,
                    ..
                } => Ok(SlugClaim::Taken),
                other => Err(other),
            },
        }
    }

    async fn clear_slug(&self, id: Uuid) -> Result<(), DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        let updated = conn
            .execute(
                "UPDATE tree_nodes SET slug = NULL WHERE id = ?1",
                [id.to_string()],
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to clear slug of {}: {}", id, e))
            })?;

        if updated == 0 {
            return Err(DatabaseError::not_found(id));
        }
        Ok(())
    }
}

/// Map a failed write to a conflict when a unique index rejected it
fn write_error(err: libsql::Error, context: &str) -> DatabaseError {
    let message = err.to_string();
    if !message.contains("constraint failed") {
        return DatabaseError::sql_execution(format!("Failed to {}: {}", context, message));
    }

    let kind = if message.contains("tree_nodes.slug") {
        ConflictKind::SiblingSlug
    } else if message.contains("tree_nodes.category_order") {
        ConflictKind::CategoryOrder
    } else if message.contains("tree_nodes.name") {
        ConflictKind::CategoryName
    } else if message.contains("tree_nodes.id") {
        ConflictKind::Id
    } else {
        ConflictKind::Path
    };

    tracing::debug!(%kind, context, "Write rejected by unique index");
    DatabaseError::conflict(kind, format!("{}: {}", context, message))
}

fn to_db_int(value: u64) -> Result<i64, DatabaseError> {
    i64::try_from(value)
        .map_err(|_| DatabaseError::sql_execution(format!("{} exceeds the INTEGER range", value)))
}

fn from_db_int(value: i64, column: &str) -> Result<u64, DatabaseError> {
    u64::try_from(value)
        .map_err(|_| DatabaseError::row_decode(format!("{} is negative: {}", column, value)))
}
