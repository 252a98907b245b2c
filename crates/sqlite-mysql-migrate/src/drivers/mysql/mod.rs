//! MySQL/MariaDB target driver.
//!
//! - [`MysqlDialect`]: SQL syntax strategy and DDL builders
//! - [`MysqlExecutor`]: [`TargetExecutor`](crate::core::traits::TargetExecutor)
//!   over mysql_async
//!
//! # Supported Versions
//!
//! - MySQL 5.7+, 8.0+
//! - MariaDB 10.2+

mod dialect;
mod executor;

pub use dialect::{MysqlDialect, TABLE_OPTIONS};
pub use executor::MysqlExecutor;
