//! Job persistence boundary
//!
//! Job storage belongs to the surrounding application. [`JobRepository`]
//! is the narrow surface the job service needs; [`MemoryJobRepository`]
//! implements it in process and doubles as the [`JobCounter`] used by
//! [`crate::tree::TreeNodeView`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{Job, JobStat, NodeKind, StatType};
use crate::tree::JobCounter;

/// Which jobs to list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFilter {
    pub category_id: Option<Uuid>,
    pub place_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    /// Exact job type, e.g. `"full-time"`
    pub job_type: Option<String>,
    /// Only active jobs when true
    pub active_only: bool,
    /// Case-insensitive substring of title or description
    pub keywords: Option<String>,
}

impl JobFilter {
    pub fn active() -> Self {
        Self {
            active_only: true,
            ..Self::default()
        }
    }

    fn matches(&self, job: &Job) -> bool {
        if self.active_only && !job.is_active {
            return false;
        }
        if self.category_id.is_some_and(|id| id != job.category_id)
            || self.place_id.is_some_and(|id| id != job.place_id)
            || self.company_id.is_some_and(|id| id != job.company_id)
            || self
                .job_type
                .as_deref()
                .is_some_and(|job_type| job_type != job.job_type)
        {
            return false;
        }
        match &self.keywords {
            Some(keywords) => {
                let needle = keywords.to_lowercase();
                job.title.to_lowercase().contains(&needle)
                    || job.description.to_lowercase().contains(&needle)
            }
            None => true,
        }
    }
}

/// A recorded keyword search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSearch {
    pub keywords: String,
    pub created_on: DateTime<Utc>,
}

/// Storage for jobs and their statistics
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert or replace a job
    async fn save(&self, job: Job) -> Result<(), DatabaseError>;

    async fn get(&self, id: Uuid) -> Result<Option<Job>, DatabaseError>;

    /// Jobs matching `filter`, newest first
    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, DatabaseError>;

    /// An active job with the same place, company and slug
    async fn find_active_duplicate(
        &self,
        place_id: Uuid,
        company_id: Uuid,
        slug: &str,
    ) -> Result<Option<Job>, DatabaseError>;

    /// Time of the most recent stat of `stat_type` recorded from `origin_ip`
    async fn last_stat_from(
        &self,
        origin_ip: &str,
        stat_type: StatType,
    ) -> Result<Option<DateTime<Utc>>, DatabaseError>;

    async fn record_stat(&self, stat: JobStat) -> Result<(), DatabaseError>;

    async fn count_stats(&self, job_id: Uuid, stat_type: StatType) -> Result<u64, DatabaseError>;

    async fn record_search(&self, search: JobSearch) -> Result<(), DatabaseError>;

    /// Jobs referencing the category or place directly
    async fn count_by_node(&self, kind: NodeKind, node_id: Uuid) -> Result<u64, DatabaseError>;
}

#[derive(Debug, Default)]
struct JobTables {
    jobs: HashMap<Uuid, Job>,
    stats: Vec<JobStat>,
    searches: Vec<JobSearch>,
}

/// In-process job repository
#[derive(Debug, Default)]
pub struct MemoryJobRepository {
    tables: RwLock<JobTables>,
}

impl MemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keyword searches recorded so far, oldest first
    pub async fn searches(&self) -> Vec<JobSearch> {
        self.tables.read().await.searches.clone()
    }
}

#[async_trait]
impl JobRepository for MemoryJobRepository {
    async fn save(&self, job: Job) -> Result<(), DatabaseError> {
        self.tables.write().await.jobs.insert(job.id, job);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Job>, DatabaseError> {
        Ok(self.tables.read().await.jobs.get(&id).cloned())
    }

    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, DatabaseError> {
        let tables = self.tables.read().await;
        let mut jobs: Vec<Job> = tables
            .jobs
            .values()
            .filter(|job| filter.matches(job))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_on.cmp(&a.created_on).then(a.id.cmp(&b.id)));
        Ok(jobs)
    }

    async fn find_active_duplicate(
        &self,
        place_id: Uuid,
        company_id: Uuid,
        slug: &str,
    ) -> Result<Option<Job>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .jobs
            .values()
            .find(|job| {
                job.is_active
                    && job.place_id == place_id
                    && job.company_id == company_id
                    && job.slug == slug
            })
            .cloned())
    }

    async fn last_stat_from(
        &self,
        origin_ip: &str,
        stat_type: StatType,
    ) -> Result<Option<DateTime<Utc>>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .stats
            .iter()
            .filter(|stat| stat.origin_ip == origin_ip && stat.stat_type == stat_type)
            .map(|stat| stat.created_on)
            .max())
    }

    async fn record_stat(&self, stat: JobStat) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        if !tables.jobs.contains_key(&stat.job_id) {
            return Err(DatabaseError::not_found(stat.job_id));
        }
        tables.stats.push(stat);
        Ok(())
    }

    async fn count_stats(&self, job_id: Uuid, stat_type: StatType) -> Result<u64, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .stats
            .iter()
            .filter(|stat| stat.job_id == job_id && stat.stat_type == stat_type)
            .count() as u64)
    }

    async fn record_search(&self, search: JobSearch) -> Result<(), DatabaseError> {
        self.tables.write().await.searches.push(search);
        Ok(())
    }

    async fn count_by_node(&self, kind: NodeKind, node_id: Uuid) -> Result<u64, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .jobs
            .values()
            .filter(|job| match kind {
                NodeKind::Category => job.category_id == node_id,
                NodeKind::Place => job.place_id == node_id,
            })
            .count() as u64)
    }
}

#[async_trait]
impl JobCounter for MemoryJobRepository {
    async fn count_jobs(&self, kind: NodeKind, node_id: Uuid) -> anyhow::Result<u64> {
        Ok(self.count_by_node(kind, node_id).await?)
    }
}
