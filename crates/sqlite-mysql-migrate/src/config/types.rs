//! Configuration type definitions.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database configuration (SQLite).
    pub source: SourceConfig,

    /// Target database configuration (MySQL).
    pub target: TargetConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,

    /// Connection retry policy, applied to both sides.
    #[serde(default)]
    pub retry: RetryPolicy,
}

/// Source database (SQLite) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Path to the SQLite database file.
    pub path: PathBuf,

    /// Maximum pooled connections (default: 1).
    #[serde(default = "default_source_connections")]
    pub max_connections: u32,
}

/// Target database (MySQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// SSL mode: disable, prefer, require, verify-ca or verify-full
    /// (default: "disable").
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,

    /// Maximum pooled connections, excluding the DDL connection (default: 4).
    #[serde(default = "default_target_connections")]
    pub max_connections: usize,
}

impl std::fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Align foreign-key column types after table creation (default: true).
    #[serde(default = "default_true")]
    pub reconcile_types: bool,

    /// Add foreign keys in Phase CONSTRAIN (default: true).
    #[serde(default = "default_true")]
    pub create_foreign_keys: bool,

    /// Recreate user-defined source indexes (default: true).
    #[serde(default = "default_true")]
    pub create_indexes: bool,

    /// Copy table data (default: true).
    #[serde(default = "default_true")]
    pub transfer_data: bool,

    /// Validate schema and data after the run (default: true).
    #[serde(default = "default_true")]
    pub validate: bool,

    /// Stop validation at the first mismatching table (default: false).
    #[serde(default)]
    pub fail_fast_validation: bool,

    /// Rows per transfer batch (default: 1000).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Differing rows kept per table in the validation report (default: 10).
    #[serde(default = "default_max_row_diffs")]
    pub max_row_diffs: usize,

    /// Integer columns holding epoch milliseconds, converted to DATETIME.
    #[serde(default = "default_epoch_millis_columns")]
    pub epoch_millis_columns: Vec<String>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            reconcile_types: true,
            create_foreign_keys: true,
            create_indexes: true,
            transfer_data: true,
            validate: true,
            fail_fast_validation: false,
            batch_size: default_batch_size(),
            max_row_diffs: default_max_row_diffs(),
            epoch_millis_columns: default_epoch_millis_columns(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_source_connections() -> u32 {
    1
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_ssl_mode() -> String {
    "disable".to_string()
}

fn default_target_connections() -> usize {
    4
}

fn default_batch_size() -> usize {
    1000
}

fn default_max_row_diffs() -> usize {
    10
}

fn default_epoch_millis_columns() -> Vec<String> {
    ["created_at", "updated_at", "published_at"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
