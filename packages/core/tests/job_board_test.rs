//! End-to-end tests for the job board services
//!
//! Tests cover:
//! - Building category and place trees through the catalog
//! - Posting jobs and counting them per node
//! - Notification delivery through the bounded queue

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use jobboard_core::config::BoardConfig;
use jobboard_core::db::MemoryNodeStore;
use jobboard_core::models::{NewJob, NewNode, NodeKind, PlaceType, TreeNode};
use jobboard_core::services::{
    CatalogService, JobService, Mailer, MemoryJobRepository, Notification, NotificationKind,
    NotificationQueue,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<Notification>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn deliver(&self, notification: &Notification) -> anyhow::Result<()> {
        self.sent.lock().await.push(notification.clone());
        Ok(())
    }
}

struct Board {
    catalog: CatalogService,
    jobs: JobService,
    repo: Arc<MemoryJobRepository>,
}

fn board(config: BoardConfig, queue: Option<&NotificationQueue>) -> Result<Board> {
    let catalog = CatalogService::new(Arc::new(MemoryNodeStore::new()), config.clone())?;
    let repo = Arc::new(MemoryJobRepository::new());
    let mut jobs = JobService::new(repo.clone(), catalog.tree().clone(), Arc::new(config));
    if let Some(queue) = queue {
        jobs = jobs.with_notifications(queue.sender());
    }
    Ok(Board {
        catalog,
        jobs,
        repo,
    })
}

fn posting(category: &TreeNode, place: &TreeNode, title: &str) -> NewJob {
    NewJob {
        category_id: category.id,
        place_id: place.id,
        company_id: Uuid::new_v4(),
        job_type: "full-time".to_string(),
        title: title.to_string(),
        description: "Ship it".to_string(),
        salary_range_min: None,
        salary_range_max: Some(90_000),
        url: None,
        valid_until: None,
        is_active: None,
        spotlight: false,
        poster_email: Some("jobs@example.com".to_string()),
    }
}

#[tokio::test]
async fn test_job_counts_follow_the_place_tree() -> Result<()> {
    let config = BoardConfig {
        moderate_new_posts: false,
        ..BoardConfig::default()
    };
    let board = board(config, None)?;

    let mut technology = board
        .catalog
        .create_category(None, NewNode::category("Technology", None))
        .await?;
    let software = board
        .catalog
        .create_category(Some(&mut technology), NewNode::category("Software", None))
        .await?;

    let mut germany = board
        .catalog
        .create_place(None, NewNode::place("Germany", PlaceType::Country))
        .await?;
    let berlin = board
        .catalog
        .create_place(Some(&mut germany), NewNode::place("Berlin", PlaceType::City))
        .await?;

    for title in ["Backend Engineer", "Frontend Engineer", "SRE"] {
        board
            .jobs
            .submit(posting(&software, &berlin, title), Utc::now())
            .await?;
    }
    for title in ["CTO", "VP Engineering", "Architect", "Data Engineer", "QA"] {
        board
            .jobs
            .submit(posting(&technology, &germany, title), Utc::now())
            .await?;
    }

    let view = board.catalog.view(board.repo.clone());
    assert_eq!(view.job_count(&berlin).await?, 3);
    assert_eq!(view.total_job_count(&berlin).await?, 8);
    assert_eq!(view.subtree_job_count(&germany).await?, 8);

    let labels = view.describe(&berlin).await?;
    assert_eq!(labels.full_name, "Germany, Berlin");
    assert_eq!(labels.reversed_full_name, "Berlin, Germany");
    assert_eq!(labels.full_path, "germany/berlin");

    let resolved = board
        .catalog
        .resolve_slug_path(NodeKind::Category, "technology/software")
        .await?;
    assert_eq!(resolved.id, software.id);
    Ok(())
}

#[tokio::test]
async fn test_submission_notifies_admin_and_poster() -> Result<()> {
    let mailer = Arc::new(RecordingMailer::default());
    let config = BoardConfig {
        admin_email: Some("admin@example.com".to_string()),
        admin_notifications: true,
        poster_notifications: true,
        application_notifications: true,
        ..BoardConfig::default()
    };
    let queue = NotificationQueue::from_config(mailer.clone(), &config)?;
    let board = board(config, Some(&queue))?;

    let category = board
        .catalog
        .create_category(None, NewNode::category("Design", None))
        .await?;
    let place = board
        .catalog
        .create_place(None, NewNode::place("Lisbon", PlaceType::City))
        .await?;

    let job = board
        .jobs
        .submit(posting(&category, &place, "Product Designer"), Utc::now())
        .await?;
    assert!(!job.is_active, "moderated boards hold new posts");

    board.jobs.activate(job.id).await?;
    board
        .jobs
        .apply_online(job.id, "ana@example.com", "Hello", "127.0.0.1", Utc::now())
        .await?;
    assert_eq!(board.jobs.application_count(job.id).await?, 1);

    drop(board);
    let delivered = queue.shutdown().await?;
    assert_eq!(delivered, 4);

    let kinds: Vec<_> = mailer.sent.lock().await.iter().map(|n| n.kind).collect();
    assert_eq!(
        kinds,
        vec![
            NotificationKind::NewPostAdmin,
            NotificationKind::PostPending,
            NotificationKind::PostPublished,
            NotificationKind::Application,
        ]
    );
    Ok(())
}
