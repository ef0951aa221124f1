//! Configuration for the job board core
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::models::{MarkupLanguage, NodeKind};

/// Default alphabet for path segments: digits then upper-case letters,
/// ascending in byte order
pub const DEFAULT_PATH_ALPHABET: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Default number of alphabet characters per path segment
pub const DEFAULT_STEP_LEN: usize = 4;

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Tree encoding and display settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Characters per path segment
    pub step_len: usize,

    /// Digit alphabet for path segments; must be ASCII and strictly ascending
    pub alphabet: String,

    /// Separator for category full names ("Technology > Software")
    pub category_name_separator: String,

    /// Separator for place full names ("Europe, Germany, Berlin")
    pub place_name_separator: String,

    /// Separator for slug paths ("technology/software")
    pub path_separator: String,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            step_len: DEFAULT_STEP_LEN,
            alphabet: DEFAULT_PATH_ALPHABET.to_string(),
            category_name_separator: " > ".to_string(),
            place_name_separator: ", ".to_string(),
            path_separator: "/".to_string(),
        }
    }
}

impl TreeConfig {
    /// Name separator used for nodes of `kind`
    pub fn name_separator(&self, kind: NodeKind) -> &str {
        match kind {
            NodeKind::Category => &self.category_name_separator,
            NodeKind::Place => &self.place_name_separator,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.step_len == 0 {
            return Err(ConfigError::Invalid(
                "step_len must be greater than 0".to_string(),
            ));
        }

        if !self.alphabet.is_ascii() {
            return Err(ConfigError::Invalid("alphabet must be ASCII".to_string()));
        }

        let bytes = self.alphabet.as_bytes();
        if bytes.len() < 2 {
            return Err(ConfigError::Invalid(
                "alphabet needs at least two characters".to_string(),
            ));
        }

        if bytes.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(ConfigError::Invalid(
                "alphabet must be strictly ascending".to_string(),
            ));
        }

        if self.path_separator.is_empty() {
            return Err(ConfigError::Invalid(
                "path_separator cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Job board settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub site_name: String,

    pub jobs_per_page: usize,

    pub jobs_per_search: usize,

    /// Minimum minutes between two online applications from the same IP
    /// address (0 disables the limit)
    pub minutes_between_applications: u64,

    /// Place depth used when listing places by default
    pub default_place_hierarchy: u32,

    /// New postings without an explicit state start inactive
    pub moderate_new_posts: bool,

    pub markup_language: MarkupLanguage,

    pub admin_email: Option<String>,

    pub admin_notifications: bool,

    pub poster_notifications: bool,

    pub application_notifications: bool,

    /// Bounded capacity of the outbound notification queue
    pub notification_queue_capacity: usize,

    pub new_post_admin_subject: String,

    pub mail_pending_subject: String,

    pub mail_publish_subject: String,

    pub mail_apply_online_subject: String,

    /// Enforce coarse-to-fine place type nesting on insertion
    pub enforce_place_nesting: bool,

    pub tree: TreeConfig,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            site_name: "Jobboard".to_string(),
            jobs_per_page: 50,
            jobs_per_search: 25,
            minutes_between_applications: 10,
            default_place_hierarchy: 4,
            moderate_new_posts: true,
            markup_language: MarkupLanguage::None,
            admin_email: None,
            admin_notifications: false,
            poster_notifications: false,
            application_notifications: false,
            notification_queue_capacity: 64,
            new_post_admin_subject: "[ {site_name} ] New job: {job_title}".to_string(),
            mail_pending_subject: "Your ad on {site_name}".to_string(),
            mail_publish_subject: "Your ad on {site_name} was published".to_string(),
            mail_apply_online_subject: "[ {site_name} ] I wish to apply for {job_title}"
                .to_string(),
            enforce_place_nesting: false,
            tree: TreeConfig::default(),
        }
    }
}

impl BoardConfig {
    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON config file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.site_name.is_empty() {
            return Err(ConfigError::Invalid("site_name cannot be empty".to_string()));
        }

        if self.jobs_per_page == 0 || self.jobs_per_search == 0 {
            return Err(ConfigError::Invalid(
                "page sizes must be greater than 0".to_string(),
            ));
        }

        if self.notification_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "notification_queue_capacity must be greater than 0".to_string(),
            ));
        }

        if self.admin_notifications && self.admin_email.is_none() {
            return Err(ConfigError::Invalid(
                "admin_notifications requires admin_email".to_string(),
            ));
        }

        self.tree.validate()
    }

    /// Fill `{site_name}` and `{job_title}` placeholders of a subject template
    pub fn render_subject(&self, template: &str, job_title: &str) -> String {
        template
            .replace("{site_name}", &self.site_name)
            .replace("{job_title}", job_title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = BoardConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tree.step_len, 4);
        assert_eq!(config.tree.name_separator(NodeKind::Category), " > ");
        assert_eq!(config.tree.name_separator(NodeKind::Place), ", ");
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            BoardConfig::from_json_str(r#"{"site_name": "Rust Jobs", "tree": {"step_len": 3}}"#)
                .unwrap();
        assert_eq!(config.site_name, "Rust Jobs");
        assert_eq!(config.tree.step_len, 3);
        assert_eq!(config.tree.alphabet, DEFAULT_PATH_ALPHABET);
        assert_eq!(config.jobs_per_page, 50);
    }

    #[test]
    fn unordered_alphabet_is_rejected() {
        let tree = TreeConfig {
            alphabet: "0213".to_string(),
            ..TreeConfig::default()
        };
        assert!(matches!(tree.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn admin_notifications_need_an_address() {
        let config = BoardConfig {
            admin_notifications: true,
            ..BoardConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn subject_placeholders_are_filled() {
        let config = BoardConfig::default();
        assert_eq!(
            config.render_subject(&config.new_post_admin_subject, "Rust Dev"),
            "[ Jobboard ] New job: Rust Dev"
        );
    }

    #[test]
    fn config_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"moderate_new_posts": false}}"#).unwrap();
        let config = BoardConfig::from_json_file(file.path()).unwrap();
        assert!(!config.moderate_new_posts);
    }
}
