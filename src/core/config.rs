

use std::path::Path;

use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use super::error::{CascadeError, Result};
use crate::store::DEFAULT_MAX_BATCH_SIZE;
use crate::trigger::PathPattern;

const DEFAULT_PROJECT_ID: &str = "demo-project";


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeConfig {

    pub project_id: String,
    pub database: String,
    pub emulator_host: Option<String>,
    pub access_token: Option<String>,
    pub timeout: u64,
    pub max_retries: u32,


    pub max_batch_size: usize,
    pub page_size: Option<usize>,
    pub commit_concurrency: usize,
    pub recursive: bool,


    pub trigger_pattern: String,
}

impl CascadeConfig {

    pub fn new(project_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            database: "(default)".to_string(),
            emulator_host: None,
            access_token: None,
            timeout: 30,
            max_retries: 3,

            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            page_size: None,
            commit_concurrency: 1,
            recursive: false,

            trigger_pattern: crate::DEFAULT_TRIGGER_PATTERN.to_string(),
        }
    }


    /// Defaults, then an optional file, then `CASCADE_*` environment
    /// variables. `FIRESTORE_EMULATOR_HOST` wins over any configured host.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            .add_source(Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let mut config: Self = builder
            .add_source(Environment::with_prefix("CASCADE").try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.apply_platform_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Platform variables layered over the `CASCADE_*` ones.
    /// `GOOGLE_CLOUD_PROJECT` only fills a project id nothing else set.
    fn apply_platform_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if lookup("CASCADE_PROJECT_ID").is_none() && self.project_id == DEFAULT_PROJECT_ID {
            if let Some(project) = lookup("GOOGLE_CLOUD_PROJECT") {
                self.project_id = project;
            }
        }
        if let Some(host) = lookup("FIRESTORE_EMULATOR_HOST") {
            self.emulator_host = Some(host);
        }
    }


    pub fn validate(&self) -> Result<()> {
        if self.project_id.trim().is_empty() {
            return Err(CascadeError::Config("project_id must not be empty".to_string()));
        }
        if self.max_batch_size == 0 {
            return Err(CascadeError::Config("max_batch_size must be at least 1".to_string()));
        }
        if self.commit_concurrency == 0 {
            return Err(CascadeError::Config("commit_concurrency must be at least 1".to_string()));
        }
        if self.page_size == Some(0) {
            return Err(CascadeError::Config("page_size must be at least 1".to_string()));
        }
        PathPattern::parse(&self.trigger_pattern)
            .map_err(|e| CascadeError::Config(format!("trigger_pattern: {}", e)))?;
        Ok(())
    }
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PROJECT_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = CascadeConfig::default();
        assert_eq!(config.max_batch_size, 500);
        assert_eq!(config.commit_concurrency, 1);
        assert!(!config.recursive);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = CascadeConfig::default();
        config.max_batch_size = 0;
        assert!(matches!(config.validate(), Err(CascadeError::Config(_))));

        let mut config = CascadeConfig::default();
        config.page_size = Some(0);
        assert!(config.validate().is_err());

        let mut config = CascadeConfig::default();
        config.trigger_pattern = "projects/{".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_platform_env_fallbacks() {
        let vars: HashMap<&str, &str> = [
            ("GOOGLE_CLOUD_PROJECT", "gcp-proj"),
            ("FIRESTORE_EMULATOR_HOST", "localhost:8080"),
        ]
        .into_iter()
        .collect();
        let mut config = CascadeConfig::default();
        config.apply_platform_env(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.project_id, "gcp-proj");
        assert_eq!(config.emulator_host.as_deref(), Some("localhost:8080"));

        let vars: HashMap<&str, &str> = [
            ("CASCADE_PROJECT_ID", "acme"),
            ("GOOGLE_CLOUD_PROJECT", "gcp-proj"),
        ]
        .into_iter()
        .collect();
        let mut config = CascadeConfig::new("acme");
        config.apply_platform_env(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.project_id, "acme");
        assert_eq!(config.emulator_host, None);

        let vars: HashMap<&str, &str> = [("GOOGLE_CLOUD_PROJECT", "gcp-proj")].into_iter().collect();
        let mut config = CascadeConfig::new("from-file");
        config.apply_platform_env(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.project_id, "from-file");
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("cascade-{}.toml", uuid::Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "project_id = \"acme\"").unwrap();
        writeln!(file, "max_batch_size = 100").unwrap();
        writeln!(file, "recursive = true").unwrap();
        drop(file);

        let config = CascadeConfig::load(Some(path.as_path())).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.project_id, "acme");
        assert_eq!(config.max_batch_size, 100);
        assert!(config.recursive);
        assert_eq!(config.database, "(default)");
    }
}
