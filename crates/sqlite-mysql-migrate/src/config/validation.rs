//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};

const SSL_MODES: &[&str] = &["disable", "prefer", "require", "verify-ca", "verify-full"];

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.path.as_os_str().is_empty() {
        return Err(MigrateError::Config("source.path is required".into()));
    }
    if config.source.max_connections == 0 {
        return Err(MigrateError::Config(
            "source.max_connections must be at least 1".into(),
        ));
    }

    // Target validation
    if config.target.host.is_empty() {
        return Err(MigrateError::Config("target.host is required".into()));
    }
    if config.target.database.is_empty() {
        return Err(MigrateError::Config("target.database is required".into()));
    }
    if config.target.user.is_empty() {
        return Err(MigrateError::Config("target.user is required".into()));
    }
    if !SSL_MODES.contains(&config.target.ssl_mode.as_str()) {
        return Err(MigrateError::Config(format!(
            "target.ssl_mode must be one of {}, got '{}'",
            SSL_MODES.join(", "),
            config.target.ssl_mode
        )));
    }
    if config.target.max_connections == 0 {
        return Err(MigrateError::Config(
            "target.max_connections must be at least 1".into(),
        ));
    }

    // Migration config validation
    if config.migration.batch_size == 0 {
        return Err(MigrateError::Config(
            "migration.batch_size must be at least 1".into(),
        ));
    }

    if config.retry.max_attempts == 0 {
        return Err(MigrateError::Config(
            "retry.max_attempts must be at least 1".into(),
        ));
    }
    if config.retry.backoff < 1.0 {
        return Err(MigrateError::Config(format!(
            "retry.backoff must be >= 1.0, got {}",
            config.retry.backoff
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MigrationConfig, SourceConfig, TargetConfig};
    use crate::retry::RetryPolicy;
    use std::path::PathBuf;

    fn valid_config() -> Config {
        Config {
            source: SourceConfig {
                path: PathBuf::from("./data.db"),
                max_connections: 1,
            },
            target: TargetConfig {
                host: "localhost".to_string(),
                port: 3306,
                database: "target_db".to_string(),
                user: "root".to_string(),
                password: "password".to_string(),
                ssl_mode: "disable".to_string(),
                max_connections: 4,
            },
            migration: MigrationConfig::default(),
            retry: RetryPolicy::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = valid_config();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_missing_source_path() {
        let mut config = valid_config();
        config.source.path = PathBuf::new();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_missing_target_host() {
        let mut config = valid_config();
        config.target.host = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_unknown_ssl_mode() {
        let mut config = valid_config();
        config.target.ssl_mode = "sometimes".to_string();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("ssl_mode"));
    }

    #[test]
    fn test_zero_batch_size() {
        let mut config = valid_config();
        config.migration.batch_size = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_shrinking_backoff_rejected() {
        let mut config = valid_config();
        config.retry.backoff = 0.5;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_target_config_debug_redacts_password() {
        let mut config = valid_config();
        config.target.password = "super_secret_password_456".to_string();
        let debug_output = format!("{:?}", config.target);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_456"),
            "Debug output should not contain actual password value"
        );
    }
}
