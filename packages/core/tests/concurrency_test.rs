//! Concurrent writers against one tree
//!
//! Tests cover:
//! - Concurrent child insertion under one parent yields distinct paths
//! - The parent's stored child count matches the number of children
//! - Concurrent slug assignment for same-named siblings yields distinct slugs

use anyhow::Result;
use jobboard_core::db::{MemoryNodeStore, NodeStore};
use jobboard_core::models::{NewNode, PlaceType, TreeNode};
use jobboard_core::tree::{SlugAssigner, TreeStore};
use std::collections::HashSet;
use std::sync::Arc;

#[cfg(feature = "libsql-store")]
use jobboard_core::db::{DatabaseService, LibsqlNodeStore};
#[cfg(feature = "libsql-store")]
use tempfile::TempDir;

const WRITERS: usize = 12;

async fn insert_children_concurrently(tree: &TreeStore) -> Result<(TreeNode, Vec<TreeNode>)> {
    let parent = tree
        .insert_root(NewNode::place("Germany", PlaceType::Country))
        .await?;

    let mut handles = Vec::with_capacity(WRITERS);
    for _ in 0..WRITERS {
        let tree = tree.clone();
        let mut snapshot = parent.clone();
        handles.push(tokio::spawn(async move {
            tree.insert_child(&mut snapshot, NewNode::place("Berlin", PlaceType::City))
                .await
        }));
    }

    let mut children = Vec::with_capacity(WRITERS);
    for handle in handles {
        children.push(handle.await??);
    }
    Ok((parent, children))
}

async fn check_concurrent_inserts(tree: &TreeStore) -> Result<()> {
    let (parent, children) = insert_children_concurrently(tree).await?;

    let paths: HashSet<_> = children.iter().map(|c| c.path.clone()).collect();
    assert_eq!(paths.len(), WRITERS, "every child gets its own path");

    let indices: HashSet<_> = children
        .iter()
        .map(|c| tree.encoder().last_segment(&c.path))
        .collect::<Result<_, _>>()?;
    assert_eq!(indices, (1..=WRITERS as u64).collect::<HashSet<_>>());

    let stored = tree.refresh(&parent).await?;
    assert_eq!(stored.child_count as usize, WRITERS);
    Ok(())
}

async fn check_concurrent_slugs(tree: &TreeStore) -> Result<()> {
    let (_parent, children) = insert_children_concurrently(tree).await?;

    let mut handles = Vec::with_capacity(children.len());
    for mut child in children {
        let tree = tree.clone();
        handles.push(tokio::spawn(async move {
            SlugAssigner::new().assign(&mut child, &tree).await
        }));
    }

    let mut assigned = HashSet::new();
    for handle in handles {
        assert!(assigned.insert(handle.await??), "slugs are unique");
    }
    assert!(assigned.contains("berlin"));
    assert!(assigned.contains(&format!("berlin-{WRITERS}")));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_memory_concurrent_inserts() -> Result<()> {
    let store: Arc<dyn NodeStore> = Arc::new(MemoryNodeStore::new());
    check_concurrent_inserts(&TreeStore::with_defaults(store)).await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_memory_concurrent_slugs() -> Result<()> {
    let store: Arc<dyn NodeStore> = Arc::new(MemoryNodeStore::new());
    check_concurrent_slugs(&TreeStore::with_defaults(store)).await
}

#[cfg(feature = "libsql-store")]
async fn libsql_tree() -> Result<(TreeStore, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db = Arc::new(DatabaseService::new(temp_dir.path().join("concurrency.db")).await?);
    let store: Arc<dyn NodeStore> = Arc::new(LibsqlNodeStore::new(db));
    Ok((TreeStore::with_defaults(store), temp_dir))
}

#[cfg(feature = "libsql-store")]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_libsql_concurrent_inserts() -> Result<()> {
    let (tree, _temp_dir) = libsql_tree().await?;
    check_concurrent_inserts(&tree).await
}

#[cfg(feature = "libsql-store")]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_libsql_concurrent_slugs() -> Result<()> {
    let (tree, _temp_dir) = libsql_tree().await?;
    check_concurrent_slugs(&tree).await
}
