//! Database driver implementations.
//!
//! This module provides database-specific implementations of the core traits:
//!
//! - [`sqlite`]: SQLite source ([`SchemaSource`](crate::core::traits::SchemaSource))
//! - [`mysql`]: MySQL/MariaDB target ([`TargetExecutor`](crate::core::traits::TargetExecutor))
//!
//! Each driver module also carries its `Dialect`, the SQL syntax strategy
//! for that engine.

pub mod mysql;
pub mod sqlite;

// Re-export driver types
pub use mysql::{MysqlDialect, MysqlExecutor};
pub use sqlite::{SqliteDialect, SqliteReader};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::Dialect;

    #[test]
    fn test_dialects_differ_in_quoting() {
        let dialects: Vec<Box<dyn Dialect>> =
            vec![Box::new(SqliteDialect::new()), Box::new(MysqlDialect::new())];

        let quoted: Vec<String> = dialects.iter().map(|d| d.quote_ident("table")).collect();
        assert_eq!(quoted, vec!["\"table\"", "`table`"]);
        assert_eq!(dialects[0].name(), "sqlite");
        assert_eq!(dialects[1].name(), "mysql");
        assert!(dialects.iter().all(|d| d.param_placeholder(1) == "?"));
    }
}
