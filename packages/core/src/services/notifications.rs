//! Outbound Notification Queue
//!
//! Job board emails (new posting for the admin, pending / published notices
//! for the poster, online applications) are queued here and delivered by a
//! single background worker through a [`Mailer`].
//!
//! ## Bounded Queue
//!
//! The queue is a bounded `tokio::sync::mpsc` channel. Submission never
//! blocks: a full queue returns [`NotificationError::QueueFull`] to the
//! caller, a stopped worker returns [`NotificationError::Closed`].
//!
//! ## Delivery
//!
//! Delivery failures are logged and the worker moves on to the next
//! message. `shutdown` stops accepting work, drains what is already queued
//! and reports how many messages were delivered.
//!
//! Dropping the [`NotificationQueue`] without calling `shutdown` detaches the
//! worker: it keeps delivering for outstanding [`NotificationSender`]s and
//! stops once the last sender is gone.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::BoardConfig;
use crate::models::Job;

/// Notification queue errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotificationError {
    #[error("Notification queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("Notification queue is closed")]
    Closed,

    #[error("Notification queue capacity must be greater than 0")]
    InvalidCapacity,

    #[error("Notification worker failed: {0}")]
    WorkerFailed(String),
}

/// What a notification is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    /// A new posting awaits the admin
    NewPostAdmin,
    /// The poster's posting awaits moderation
    PostPending,
    /// The poster's posting is live
    PostPublished,
    /// A job seeker applied online
    Application,
}

/// A rendered outbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub to: String,
    pub from: Option<String>,
    pub reply_to: Option<String>,
    pub subject: String,
    pub body: String,
}

impl Notification {
    /// Admin notice for a newly submitted job
    pub fn new_post_admin(config: &BoardConfig, job: &Job, admin_email: &str) -> Self {
        let mut body = job_summary(job);
        if !job.is_active {
            body.push_str("\nThis posting is waiting for activation.\n");
        }

        Self {
            kind: NotificationKind::NewPostAdmin,
            to: admin_email.to_string(),
            from: config.admin_email.clone(),
            reply_to: job.poster_email.clone(),
            subject: config.render_subject(&config.new_post_admin_subject, &job.title),
            body,
        }
    }

    /// Poster notice that the job awaits moderation
    pub fn post_pending(config: &BoardConfig, job: &Job, poster_email: &str) -> Self {
        Self {
            kind: NotificationKind::PostPending,
            to: poster_email.to_string(),
            from: config.admin_email.clone(),
            reply_to: None,
            subject: config.render_subject(&config.mail_pending_subject, &job.title),
            body: format!(
                "Thank you for posting on {}. Your ad will be published once it has been reviewed.\n\n{}",
                config.site_name,
                job_summary(job)
            ),
        }
    }

    /// Poster notice that the job is live
    pub fn post_published(config: &BoardConfig, job: &Job, poster_email: &str) -> Self {
        Self {
            kind: NotificationKind::PostPublished,
            to: poster_email.to_string(),
            from: config.admin_email.clone(),
            reply_to: None,
            subject: config.render_subject(&config.mail_publish_subject, &job.title),
            body: format!(
                "Your ad on {} is now published.\n\n{}",
                config.site_name,
                job_summary(job)
            ),
        }
    }

    /// Online application forwarded to the poster
    pub fn application(
        config: &BoardConfig,
        job: &Job,
        poster_email: &str,
        applicant_email: &str,
        message: &str,
    ) -> Self {
        Self {
            kind: NotificationKind::Application,
            to: poster_email.to_string(),
            from: config.admin_email.clone(),
            reply_to: Some(applicant_email.to_string()),
            subject: config.render_subject(&config.mail_apply_online_subject, &job.title),
            body: message.to_string(),
        }
    }
}

fn job_summary(job: &Job) -> String {
    let mut summary = format!("{}\n\n{}\n", job.title, job.description);
    if let Some(url) = &job.url {
        summary.push_str(&format!("\nCompany website: {}\n", url));
    }
    summary
}

/// Delivers rendered notifications
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Cloneable handle for submitting notifications
#[derive(Clone)]
pub struct NotificationSender {
    tx: mpsc::Sender<Notification>,
    capacity: usize,
}

impl NotificationSender {
    /// Queue `notification` without waiting for capacity
    pub fn submit(&self, notification: Notification) -> Result<(), NotificationError> {
        match self.tx.try_send(notification) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                tracing::warn!(
                    kind = ?dropped.kind,
                    to = %dropped.to,
                    "Notification queue full, notification rejected"
                );
                Err(NotificationError::QueueFull {
                    capacity: self.capacity,
                })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(NotificationError::Closed),
        }
    }
}

/// Bounded notification queue with one delivery worker
pub struct NotificationQueue {
    sender: NotificationSender,
    shutdown_tx: mpsc::Sender<()>,
    worker: JoinHandle<u64>,
}

impl NotificationQueue {
    /// Create the queue and spawn its worker on the current runtime
    pub fn start(mailer: Arc<dyn Mailer>, capacity: usize) -> Result<Self, NotificationError> {
        if capacity == 0 {
            return Err(NotificationError::InvalidCapacity);
        }

        tracing::info!(capacity, "NotificationQueue starting");

        let (tx, mut rx) = mpsc::channel::<Notification>(capacity);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let worker = tokio::spawn(async move {
            let mut delivered = 0u64;
            let mut queue_dropped = false;
            loop {
                tokio::select! {
                    biased;

                    signal = shutdown_rx.recv(), if !queue_dropped => match signal {
                        Some(()) => {
                            rx.close();
                            while let Some(notification) = rx.recv().await {
                                delivered += Self::deliver(mailer.as_ref(), &notification).await;
                            }
                            break;
                        }
                        // Queue handle dropped; serve the remaining senders
                        None => queue_dropped = true,
                    },

                    received = rx.recv() => match received {
                        Some(notification) => {
                            delivered += Self::deliver(mailer.as_ref(), &notification).await;
                        }
                        None => break,
                    },
                }
            }
            tracing::info!(delivered, "NotificationQueue stopped");
            delivered
        });

        Ok(Self {
            sender: NotificationSender { tx, capacity },
            shutdown_tx,
            worker,
        })
    }

    /// Start a queue sized from `config`
    pub fn from_config(
        mailer: Arc<dyn Mailer>,
        config: &BoardConfig,
    ) -> Result<Self, NotificationError> {
        Self::start(mailer, config.notification_queue_capacity)
    }

    async fn deliver(mailer: &dyn Mailer, notification: &Notification) -> u64 {
        match mailer.deliver(notification).await {
            Ok(()) => {
                tracing::debug!(
                    kind = ?notification.kind,
                    to = %notification.to,
                    "Notification delivered"
                );
                1
            }
            Err(e) => {
                tracing::warn!(
                    kind = ?notification.kind,
                    to = %notification.to,
                    "Notification delivery failed: {}",
                    e
                );
                0
            }
        }
    }

    /// Get a cloneable submission handle
    pub fn sender(&self) -> NotificationSender {
        self.sender.clone()
    }

    pub fn submit(&self, notification: Notification) -> Result<(), NotificationError> {
        self.sender.submit(notification)
    }

    /// Stop accepting notifications, deliver the queued ones and return the
    /// number delivered over the queue's lifetime
    pub async fn shutdown(self) -> Result<u64, NotificationError> {
        // A full shutdown channel means a shutdown is already pending
        let _ = self.shutdown_tx.try_send(());
        self.worker
            .await
            .map_err(|e| NotificationError::WorkerFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tokio::sync::{Mutex, Notify};
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn deliver(&self, notification: &Notification) -> anyhow::Result<()> {
            if notification.to.ends_with("@invalid") {
                anyhow::bail!("unknown recipient");
            }
            self.sent.lock().await.push(notification.clone());
            Ok(())
        }
    }

    /// Blocks every delivery until released
    struct GatedMailer {
        gate: Notify,
    }

    #[async_trait]
    impl Mailer for GatedMailer {
        async fn deliver(&self, _notification: &Notification) -> anyhow::Result<()> {
            self.gate.notified().await;
            Ok(())
        }
    }

    fn sample_job() -> Job {
        Job {
            id: Uuid::new_v4(),
            category_id: Uuid::new_v4(),
            place_id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            job_type: "full-time".to_string(),
            title: "Rust Developer".to_string(),
            slug: "rust-developer".to_string(),
            description: "Write Rust".to_string(),
            description_html: "Write Rust".to_string(),
            salary_range_min: None,
            salary_range_max: None,
            url: Some("https://example.com".to_string()),
            created_on: Utc::now(),
            valid_until: None,
            is_active: false,
            spotlight: false,
            poster_email: Some("poster@example.com".to_string()),
        }
    }

    fn note(to: &str) -> Notification {
        Notification::post_pending(&BoardConfig::default(), &sample_job(), to)
    }

    #[test]
    fn subjects_are_rendered_from_config() {
        let config = BoardConfig::default();
        let job = sample_job();

        let admin = Notification::new_post_admin(&config, &job, "admin@example.com");
        assert_eq!(admin.subject, "[ Jobboard ] New job: Rust Developer");
        assert_eq!(admin.reply_to.as_deref(), Some("poster@example.com"));
        assert!(admin.body.contains("waiting for activation"));

        let apply = Notification::application(
            &config,
            &job,
            "poster@example.com",
            "seeker@example.com",
            "Hire me",
        );
        assert_eq!(apply.kind, NotificationKind::Application);
        assert_eq!(apply.reply_to.as_deref(), Some("seeker@example.com"));
        assert_eq!(apply.body, "Hire me");
    }

    #[tokio::test]
    async fn queued_notifications_are_delivered_before_shutdown_returns() {
        let mailer = Arc::new(RecordingMailer::default());
        let queue = NotificationQueue::start(mailer.clone(), 8).unwrap();

        queue.submit(note("a@example.com")).unwrap();
        queue.submit(note("nobody@invalid")).unwrap();
        queue.sender().submit(note("b@example.com")).unwrap();

        let delivered = queue.shutdown().await.unwrap();
        assert_eq!(delivered, 2);

        let sent = mailer.sent.lock().await;
        let recipients: Vec<_> = sent.iter().map(|n| n.to.as_str()).collect();
        assert_eq!(recipients, vec!["a@example.com", "b@example.com"]);
    }

    #[tokio::test]
    async fn full_queue_rejects_without_blocking() {
        let mailer = Arc::new(GatedMailer {
            gate: Notify::new(),
        });
        let queue = NotificationQueue::start(mailer.clone(), 1).unwrap();

        // The worker takes the first message and blocks on the gate; the
        // second fills the single slot.
        queue.submit(note("first@example.com")).unwrap();
        tokio::task::yield_now().await;
        let mut saw_full = false;
        for _ in 0..3 {
            if let Err(err) = queue.submit(note("more@example.com")) {
                assert_eq!(err, NotificationError::QueueFull { capacity: 1 });
                saw_full = true;
                break;
            }
        }
        assert!(saw_full);
    }

    #[tokio::test]
    async fn sender_reports_closed_after_shutdown() {
        let queue = NotificationQueue::start(Arc::new(RecordingMailer::default()), 4).unwrap();
        let sender = queue.sender();
        queue.shutdown().await.unwrap();

        assert_eq!(
            sender.submit(note("late@example.com")),
            Err(NotificationError::Closed)
        );
    }

    #[tokio::test]
    async fn senders_keep_working_after_the_queue_is_dropped() {
        let mailer = Arc::new(RecordingMailer::default());
        let queue = NotificationQueue::start(mailer.clone(), 4).unwrap();
        let sender = queue.sender();
        drop(queue);
        tokio::task::yield_now().await;

        sender.submit(note("after-drop@example.com")).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while mailer.sent.lock().await.is_empty() {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("notification delivered after the queue handle was dropped");

        assert_eq!(mailer.sent.lock().await[0].to, "after-drop@example.com");
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let result = tokio_test::block_on(async {
            NotificationQueue::start(Arc::new(RecordingMailer::default()), 0).map(|_| ())
        });
        assert_eq!(result, Err(NotificationError::InvalidCapacity));
    }
}
