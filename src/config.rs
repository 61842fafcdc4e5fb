use std::path::Path;

use chrono::FixedOffset;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::AppError;
use crate::validation::ValidationRule;

/// Where documents live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// MongoDB documents, Meilisearch index.
    Mongo,
    /// Everything in process memory; for local runs and demos.
    Memory,
}

/// Service configuration.
///
/// Read from an optional TOML file, then overridden by `NEWSDESK__*`
/// environment variables (e.g. `NEWSDESK__MONGODB_URI`).
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub storage: StorageKind,
    pub mongodb_uri: String,
    pub mongodb_database: String,
    /// Meilisearch URL. Without it searches fail and nothing is indexed.
    #[serde(default)]
    pub meili_url: Option<String>,
    #[serde(default)]
    pub meili_api_key: Option<String>,
    pub listen_addr: String,
    /// Inactivity after which a session expires.
    pub session_expiry_minutes: i64,
    /// Period of the expired-session sweep.
    pub session_purge_interval_secs: u64,
    /// Newsroom timezone as an offset from UTC, used for highlight cutoffs.
    pub default_timezone_offset_minutes: i32,
    #[serde(default = "default_validation_rules")]
    pub validation: Vec<ValidationRule>,
}

fn default_validation_rules() -> Vec<ValidationRule> {
    vec![
        ValidationRule::new("publish", "text", &["headline", "slugline", "body_html"]),
        ValidationRule::new("publish", "composite", &["headline"]),
        ValidationRule::new("publish", "picture", &["headline", "renditions"]),
    ]
}

impl AppConfig {
    /// Load the configuration. Without an explicit path, `newsdesk.toml` in
    /// the working directory is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name("newsdesk").required(false),
        };

        let config = Config::builder()
            .set_default("storage", "mongo")?
            .set_default("mongodb_uri", "mongodb://localhost:27017")?
            .set_default("mongodb_database", "newsdesk")?
            .set_default("listen_addr", "127.0.0.1:5000")?
            .set_default("session_expiry_minutes", 240)?
            .set_default("session_purge_interval_secs", 60)?
            .set_default("default_timezone_offset_minutes", 0)?
            .add_source(file)
            .add_source(
                Environment::with_prefix("NEWSDESK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.session_purge_interval_secs == 0 {
            return Err(AppError::Config("session_purge_interval_secs must be positive".into()));
        }
        self.session_expiry()?;
        self.timezone().map(|_| ())
    }

    /// Inactivity window after which sessions expire.
    pub fn session_expiry(&self) -> Result<chrono::Duration, AppError> {
        if self.session_expiry_minutes <= 0 {
            return Err(AppError::Config("session_expiry_minutes must be positive".into()));
        }
        chrono::Duration::try_minutes(self.session_expiry_minutes).ok_or_else(|| {
            AppError::Config(format!(
                "session_expiry_minutes out of range: {}",
                self.session_expiry_minutes
            ))
        })
    }

    pub fn timezone(&self) -> Result<FixedOffset, AppError> {
        self.default_timezone_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                AppError::Config(format!(
                    "default_timezone_offset_minutes out of range: {}",
                    self.default_timezone_offset_minutes
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config.session_expiry_minutes, 240);
        assert_eq!(config.session_purge_interval_secs, 60);
        assert_eq!(config.validation.len(), 3);
        assert_eq!(config.timezone().unwrap(), FixedOffset::east_opt(0).unwrap());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!("newsdesk-{}.toml", uuid::Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
storage = "memory"
session_expiry_minutes = 30
default_timezone_offset_minutes = 120

[[validation]]
act = "publish"
type = "text"
required = ["headline"]
max_length = {{ headline = 64 }}
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.storage, StorageKind::Memory);
        assert_eq!(config.session_expiry_minutes, 30);
        assert_eq!(config.timezone().unwrap(), FixedOffset::east_opt(7200).unwrap());
        assert_eq!(config.validation.len(), 1);
        assert_eq!(config.validation[0].max_length["headline"], 64);
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        let mut config = AppConfig::load(None).unwrap();
        config.session_expiry_minutes = i64::MAX;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
        assert!(matches!(config.session_expiry(), Err(AppError::Config(_))));

        config.session_expiry_minutes = 0;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        config.session_expiry_minutes = 240;
        config.default_timezone_offset_minutes = i32::MAX;
        assert!(matches!(config.timezone(), Err(AppError::Config(_))));
        config.default_timezone_offset_minutes = 24 * 60;
        assert!(matches!(config.timezone(), Err(AppError::Config(_))));

        config.default_timezone_offset_minutes = -300;
        assert!(config.validate().is_ok());
        assert_eq!(config.session_expiry().unwrap(), chrono::Duration::minutes(240));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("newsdesk-absent-{}.toml", uuid::Uuid::new_v4()));
        assert!(matches!(AppConfig::load(Some(&path)), Err(AppError::Config(_))));
    }
}
