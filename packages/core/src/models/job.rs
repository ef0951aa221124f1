//! Job Posting Data Structures
//!
//! Jobs reference exactly one category and one place by id. They never
//! mutate the trees; the tree core only counts them.

use chrono::{DateTime, Utc};
use pulldown_cmark::{html, Parser};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::ValidationError;
use crate::tree::slugify;

/// Markup language used to render a job description to HTML
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkupLanguage {
    /// Description is stored verbatim as HTML
    #[default]
    None,
    Markdown,
}

impl MarkupLanguage {
    pub fn render(&self, source: &str) -> String {
        match self {
            MarkupLanguage::None => source.to_string(),
            MarkupLanguage::Markdown => {
                let parser = Parser::new(source);
                let mut out = String::with_capacity(source.len() * 3 / 2);
                html::push_html(&mut out, parser);
                out
            }
        }
    }
}

/// Input for a job submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewJob {
    pub category_id: Uuid,
    pub place_id: Uuid,
    pub company_id: Uuid,
    pub job_type: String,
    pub title: String,
    pub description: String,
    pub salary_range_min: Option<u64>,
    pub salary_range_max: Option<u64>,
    pub url: Option<String>,
    pub valid_until: Option<DateTime<Utc>>,
    /// Explicit activation state; `None` lets the moderation setting decide
    pub is_active: Option<bool>,
    pub spotlight: bool,
    /// Contact address of the poster, used for notifications
    pub poster_email: Option<String>,
}

/// A job posting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Uuid,
    pub category_id: Uuid,
    pub place_id: Uuid,
    pub company_id: Uuid,
    pub job_type: String,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub description_html: String,
    pub salary_range_min: Option<u64>,
    pub salary_range_max: Option<u64>,
    pub url: Option<String>,
    pub created_on: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub spotlight: bool,
    pub poster_email: Option<String>,
}

impl Job {
    /// Build a job from a submission.
    ///
    /// Derives the slug from the title, renders the description and
    /// normalises the salary range. `moderate` decides the activation state
    /// when the submission leaves it open.
    pub fn from_submission(
        input: NewJob,
        markup: MarkupLanguage,
        moderate: bool,
        now: DateTime<Utc>,
    ) -> Self {
        let (salary_range_min, salary_range_max) =
            normalize_salary(input.salary_range_min, input.salary_range_max);
        let is_active = input.is_active.unwrap_or(!moderate);

        Self {
            id: Uuid::new_v4(),
            category_id: input.category_id,
            place_id: input.place_id,
            company_id: input.company_id,
            job_type: input.job_type,
            slug: slugify(&input.title),
            description_html: markup.render(&input.description),
            title: input.title,
            description: input.description,
            salary_range_min,
            salary_range_max,
            url: input.url,
            created_on: now,
            valid_until: input.valid_until,
            is_active,
            spotlight: input.spotlight,
            poster_email: input.poster_email,
        }
    }

    /// Field-level checks that do not need the repository
    pub fn check_fields(&self, now: DateTime<Utc>) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingField("title".to_string()));
        }
        if self.description.trim().is_empty() {
            return Err(ValidationError::MissingField("description".to_string()));
        }
        if let (Some(min), Some(max)) = (self.salary_range_min, self.salary_range_max) {
            if min > max {
                return Err(ValidationError::InvalidSalaryRange { min, max });
            }
        }
        if let Some(valid_until) = self.valid_until {
            if valid_until < now {
                return Err(ValidationError::ExpiredPosting);
            }
        }
        Ok(())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.valid_until.is_some_and(|until| until <= now)
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

/// Copy whichever salary bound is present into the missing one
pub fn normalize_salary(min: Option<u64>, max: Option<u64>) -> (Option<u64>, Option<u64>) {
    match (min, max) {
        (Some(min), None) => (Some(min), Some(min)),
        (None, Some(max)) => (Some(max), Some(max)),
        other => other,
    }
}

/// Kind of recorded interaction with a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatType {
    Application,
    Hit,
    Spam,
}

impl StatType {
    pub fn code(&self) -> char {
        match self {
            StatType::Application => 'A',
            StatType::Hit => 'H',
            StatType::Spam => 'S',
        }
    }
}

/// A recorded application, visit or spam report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStat {
    pub id: Uuid,
    pub job_id: Uuid,
    pub stat_type: StatType,
    pub description: String,
    pub origin_ip: String,
    pub created_on: DateTime<Utc>,
}

impl JobStat {
    pub fn new(job: &Job, stat_type: StatType, origin_ip: &str, now: DateTime<Utc>) -> Self {
        let description = match stat_type {
            StatType::Application => format!(
                "Job application for [{}]{} from IP: {}",
                job.id, job.title, origin_ip
            ),
            StatType::Hit => format!("Visit for [{}]{} from IP: {}", job.id, job.title, origin_ip),
            StatType::Spam => format!(
                "Spam report for [{}]{} from IP: {}",
                job.id, job.title, origin_ip
            ),
        };

        Self {
            id: Uuid::new_v4(),
            job_id: job.id,
            stat_type,
            description,
            origin_ip: origin_ip.to_string(),
            created_on: now,
        }
    }
}
