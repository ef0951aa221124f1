//! Job Service
//!
//! Posting rules that sit on top of the category and place trees:
//!
//! - submission with moderation, salary normalisation and markup rendering
//! - validation (expired end date, duplicate active postings)
//! - activation toggling and expiry cleanup
//! - online applications, rate limited per IP address
//! - application / visit / spam statistics
//! - listings by category, place, company and job type
//! - outbound notifications through a [`NotificationSender`]

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::BoardConfig;
use crate::models::{Job, JobStat, NewJob, NodeKind, StatType, ValidationError};
use crate::services::error::JobServiceError;
use crate::services::job_repository::{JobFilter, JobRepository, JobSearch};
use crate::services::notifications::{Notification, NotificationSender};
use crate::tree::TreeStore;

/// Number of active jobs posted by one company
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompanyJobCount {
    pub company_id: Uuid,
    pub job_count: u64,
}

/// Job posting service
pub struct JobService {
    repo: Arc<dyn JobRepository>,
    tree: TreeStore,
    config: Arc<BoardConfig>,
    notifications: Option<NotificationSender>,
}

impl JobService {
    pub fn new(repo: Arc<dyn JobRepository>, tree: TreeStore, config: Arc<BoardConfig>) -> Self {
        Self {
            repo,
            tree,
            config,
            notifications: None,
        }
    }

    /// Queue notifications through `sender`
    pub fn with_notifications(mut self, sender: NotificationSender) -> Self {
        self.notifications = Some(sender);
        self
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// Validate and store a new job posting
    pub async fn submit(&self, input: NewJob, now: DateTime<Utc>) -> Result<Job, JobServiceError> {
        let job = Job::from_submission(
            input,
            self.config.markup_language,
            self.config.moderate_new_posts,
            now,
        );

        self.check_references(&job).await?;
        self.validate(&job, now).await?;
        self.repo.save(job.clone()).await?;

        tracing::info!(
            job_id = %job.id,
            slug = %job.slug,
            active = job.is_active,
            "Job submitted"
        );

        if self.config.admin_notifications {
            if let Some(admin_email) = &self.config.admin_email {
                self.notify(Notification::new_post_admin(&self.config, &job, admin_email));
            }
        }
        if self.config.poster_notifications {
            if let Some(poster_email) = &job.poster_email {
                let notification = if job.is_active {
                    Notification::post_published(&self.config, &job, poster_email)
                } else {
                    Notification::post_pending(&self.config, &job, poster_email)
                };
                self.notify(notification);
            }
        }

        Ok(job)
    }

    /// Posting rules for `job` as of `now`.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::ExpiredPosting`] if `valid_until` has passed
    /// - [`ValidationError::DuplicatePosting`] if another active job has the
    ///   same place, company and slug
    pub async fn validate(&self, job: &Job, now: DateTime<Utc>) -> Result<(), JobServiceError> {
        job.check_fields(now)?;

        if let Some(existing) = self
            .repo
            .find_active_duplicate(job.place_id, job.company_id, &job.slug)
            .await?
        {
            if existing.id != job.id {
                return Err(ValidationError::DuplicatePosting {
                    existing_id: existing.id,
                }
                .into());
            }
        }

        Ok(())
    }

    async fn check_references(&self, job: &Job) -> Result<(), JobServiceError> {
        for (kind, id) in [
            (NodeKind::Category, job.category_id),
            (NodeKind::Place, job.place_id),
        ] {
            match self.tree.get(id).await {
                Ok(node) if node.kind() == kind => {}
                Ok(_) => return Err(JobServiceError::unknown_node(kind, id)),
                Err(err) if err.is_not_found() => {
                    return Err(JobServiceError::unknown_node(kind, id))
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Job, JobServiceError> {
        self.repo
            .get(id)
            .await?
            .ok_or_else(|| JobServiceError::job_not_found(id))
    }

    /// Flip a job between active and inactive
    pub async fn toggle_active(&self, id: Uuid) -> Result<Job, JobServiceError> {
        let job = self.get(id).await?;
        let active = !job.is_active;
        self.store_activation(job, active).await
    }

    pub async fn activate(&self, id: Uuid) -> Result<Job, JobServiceError> {
        let job = self.get(id).await?;
        self.store_activation(job, true).await
    }

    pub async fn deactivate(&self, id: Uuid) -> Result<Job, JobServiceError> {
        let job = self.get(id).await?;
        self.store_activation(job, false).await
    }

    async fn store_activation(&self, mut job: Job, active: bool) -> Result<Job, JobServiceError> {
        let was_active = job.is_active;
        job.is_active = active;
        self.repo.save(job.clone()).await?;
        tracing::debug!(job_id = %job.id, active, "Job activation changed");

        if active && !was_active && self.config.poster_notifications {
            if let Some(poster_email) = &job.poster_email {
                self.notify(Notification::post_published(&self.config, &job, poster_email));
            }
        }
        Ok(job)
    }

    /// Deactivate every active job whose end date is at or before `now`.
    ///
    /// Returns the number of jobs deactivated.
    pub async fn deactivate_expired(&self, now: DateTime<Utc>) -> Result<u64, JobServiceError> {
        let mut deactivated = 0u64;
        for mut job in self.repo.list(&JobFilter::active()).await? {
            if job.is_expired(now) {
                job.is_active = false;
                self.repo.save(job).await?;
                deactivated += 1;
            }
        }
        tracing::info!(deactivated, "Expired jobs deactivated");
        Ok(deactivated)
    }

    /// Record an application, visit or spam report
    pub async fn record_stat(
        &self,
        job_id: Uuid,
        stat_type: StatType,
        origin_ip: &str,
        now: DateTime<Utc>,
    ) -> Result<JobStat, JobServiceError> {
        let job = self.get(job_id).await?;
        let stat = JobStat::new(&job, stat_type, origin_ip, now);
        self.repo.record_stat(stat.clone()).await?;
        Ok(stat)
    }

    pub async fn application_count(&self, job_id: Uuid) -> Result<u64, JobServiceError> {
        Ok(self.repo.count_stats(job_id, StatType::Application).await?)
    }

    /// Record an online application and forward it to the poster.
    ///
    /// # Errors
    ///
    /// - [`JobServiceError::JobInactive`] if the job is not active
    /// - [`ValidationError::ApplicationTooSoon`] if `origin_ip` applied
    ///   within the last `minutes_between_applications` minutes
    pub async fn apply_online(
        &self,
        job_id: Uuid,
        applicant_email: &str,
        message: &str,
        origin_ip: &str,
        now: DateTime<Utc>,
    ) -> Result<JobStat, JobServiceError> {
        let job = self.get(job_id).await?;
        if !job.is_active {
            return Err(JobServiceError::job_inactive(job_id));
        }

        let minutes = self.config.minutes_between_applications;
        if minutes > 0 {
            if let Some(last) = self
                .repo
                .last_stat_from(origin_ip, StatType::Application)
                .await?
            {
                let elapsed = now.signed_duration_since(last).num_minutes();
                if elapsed < i64::try_from(minutes).unwrap_or(i64::MAX) {
                    tracing::debug!(origin_ip, job_id = %job_id, "Application rate limited");
                    return Err(ValidationError::ApplicationTooSoon { minutes }.into());
                }
            }
        }

        let stat = JobStat::new(&job, StatType::Application, origin_ip, now);
        self.repo.record_stat(stat.clone()).await?;

        if self.config.application_notifications {
            if let Some(poster_email) = &job.poster_email {
                self.notify(Notification::application(
                    &self.config,
                    &job,
                    poster_email,
                    applicant_email,
                    message,
                ));
            }
        }
        Ok(stat)
    }

    /// One page (1-based) of active jobs matching `filter`, newest first
    pub async fn list_active(
        &self,
        filter: JobFilter,
        page: usize,
    ) -> Result<Vec<Job>, JobServiceError> {
        let filter = JobFilter {
            active_only: true,
            ..filter
        };
        let per_page = self.config.jobs_per_page;
        Ok(self
            .repo
            .list(&filter)
            .await?
            .into_iter()
            .skip(page.saturating_sub(1).saturating_mul(per_page))
            .take(per_page)
            .collect())
    }

    /// Companies with active jobs and how many each has, busiest first
    pub async fn companies_with_counts(&self) -> Result<Vec<CompanyJobCount>, JobServiceError> {
        let mut counts: HashMap<Uuid, u64> = HashMap::new();
        for job in self.repo.list(&JobFilter::active()).await? {
            *counts.entry(job.company_id).or_default() += 1;
        }

        let mut companies: Vec<CompanyJobCount> = counts
            .into_iter()
            .map(|(company_id, job_count)| CompanyJobCount {
                company_id,
                job_count,
            })
            .collect();
        companies.sort_by(|a, b| {
            b.job_count
                .cmp(&a.job_count)
                .then(a.company_id.cmp(&b.company_id))
        });
        Ok(companies)
    }

    /// Active jobs whose title or description contains `keywords`.
    ///
    /// The search itself is recorded.
    pub async fn search(
        &self,
        keywords: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Job>, JobServiceError> {
        let keywords = keywords.trim();
        if keywords.is_empty() {
            return Err(ValidationError::MissingField("keywords".to_string()).into());
        }

        self.repo
            .record_search(JobSearch {
                keywords: keywords.to_string(),
                created_on: now,
            })
            .await?;

        let filter = JobFilter {
            keywords: Some(keywords.to_string()),
            ..JobFilter::active()
        };
        Ok(self
            .repo
            .list(&filter)
            .await?
            .into_iter()
            .take(self.config.jobs_per_search)
            .collect())
    }

    fn notify(&self, notification: Notification) {
        if let Some(sender) = &self.notifications {
            if let Err(e) = sender.submit(notification) {
                tracing::warn!("Notification not queued: {}", e);
            }
        }
    }
}
