//! # sqlite-mysql-migrate
//!
//! SQLite to MySQL schema and data migration library.
//!
//! This library moves a SQLite database onto a MySQL/MariaDB server with
//! support for:
//!
//! - **DDL translation** of SQLite `CREATE TABLE` statements into MySQL
//! - **Dependency ordering** of tables by their foreign keys
//! - **Two-phase schema application**: tables first, foreign keys afterwards
//! - **Type reconciliation** of foreign-key columns against their references
//! - **Batched data transfer** with epoch-millisecond timestamp conversion
//! - **Validation** of schema and data after the run
//!
//! ## Example
//!
//! ```rust,no_run
//! use sqlite_mysql_migrate::{Config, Orchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> sqlite_mysql_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::new(config).await?;
//!     let result = orchestrator.run(CancellationToken::new()).await?;
//!     println!("Created {} tables", result.tables_created.len());
//!     Ok(())
//! }
//! ```

pub mod applier;
pub mod config;
pub mod core;
pub mod ddl;
pub mod drivers;
pub mod error;
pub mod orchestrator;
pub mod reconcile;
pub mod resolver;
pub mod retry;
pub mod transfer;
pub mod typemap;
pub mod verify;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenient access
pub use applier::{CreateReport, SchemaApplier, StatementStatus, TableFailure};
pub use config::{Config, MigrationConfig, SourceConfig, TargetConfig};
pub use core::{ForeignKey, Table};
pub use ddl::{translate, ForeignKeyClause, TranslatedTable};
pub use drivers::{MysqlExecutor, SqliteReader};
pub use error::{MigrateError, Result};
pub use orchestrator::{HealthCheckResult, MigrationPlan, MigrationResult, Orchestrator};
pub use reconcile::TypeReconciler;
pub use resolver::{resolve_order, Resolution};
pub use retry::RetryPolicy;
pub use transfer::{TransferConfig, TransferEngine, TransferReport, TransferStats};
pub use typemap::sqlite_to_mysql;
pub use verify::{DataOutcome, ValidationReport, Validator, ValidatorConfig};
