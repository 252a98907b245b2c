//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use crate::transfer::TransferConfig;
use crate::verify::ValidatorConfig;
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl TargetConfig {
    /// `host:port/database`, safe to log.
    pub fn address(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}

impl MigrationConfig {
    pub fn transfer_config(&self) -> TransferConfig {
        TransferConfig {
            batch_size: self.batch_size,
            epoch_millis_columns: self.epoch_millis_columns.clone(),
        }
    }

    pub fn validator_config(&self) -> ValidatorConfig {
        ValidatorConfig {
            fail_fast: self.fail_fast_validation,
            compare_data: self.transfer_data,
            max_row_diffs: self.max_row_diffs,
            epoch_millis_columns: self.epoch_millis_columns.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
source:
  path: ./data.db
target:
  host: localhost
  database: strapi
  user: strapi
  password: secret
"#;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.target.port, 3306);
        assert_eq!(config.target.ssl_mode, "disable");
        assert_eq!(config.source.max_connections, 1);
        assert!(config.migration.reconcile_types);
        assert!(config.migration.validate);
        assert_eq!(config.migration.batch_size, 1000);
        assert_eq!(
            config.migration.epoch_millis_columns,
            vec!["created_at", "updated_at", "published_at"]
        );
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.delay_ms, 2000);
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
source:
  path: /var/lib/app/data.db
target:
  host: db.internal
  port: 3307
  database: app
  user: app
  password: secret
  ssl_mode: require
migration:
  reconcile_types: false
  transfer_data: false
  fail_fast_validation: true
  batch_size: 500
  epoch_millis_columns: []
retry:
  max_attempts: 5
  delay_ms: 100
  backoff: 2.0
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.target.address(), "db.internal:3307/app");
        assert!(!config.migration.reconcile_types);
        assert!(config.migration.create_foreign_keys);
        assert_eq!(config.retry.backoff, 2.0);

        let validator = config.migration.validator_config();
        assert!(validator.fail_fast);
        assert!(!validator.compare_data);
        assert_eq!(config.migration.transfer_config().batch_size, 500);
    }

    #[test]
    fn test_missing_section_is_an_error() {
        let err = Config::from_yaml("source:\n  path: ./data.db\n").unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, MINIMAL).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.target.database, "strapi");
    }
}
