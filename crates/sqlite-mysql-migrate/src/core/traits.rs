//! Core traits at the engine boundaries.
//!
//! - [`SchemaSource`]: reads table definitions, metadata and rows from the source
//! - [`TargetExecutor`]: executes DDL and moves rows on the target
//! - [`Dialect`]: SQL syntax strategy for each engine
//!
//! The pipeline stages (applier, reconciler, transfer, validator) only depend
//! on these traits, so every stage can be exercised against in-memory mocks.

use async_trait::async_trait;
use tracing::warn;

use crate::error::Result;

use super::schema::{Column, ForeignKey, Index, TargetColumn};
use super::value::Row;

/// A table as stored in the source catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTable {
    /// Table name.
    pub name: String,
    /// Raw `CREATE TABLE` statement.
    pub sql: String,
}

impl SourceTable {
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
        }
    }
}

/// Options for reading rows from a table.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Table name.
    pub table: String,
    /// Columns to read, in output order.
    pub columns: Vec<String>,
    /// Columns to order by. Empty lets the engine pick a stable order
    /// (`rowid` on SQLite).
    pub order_by: Vec<String>,
    /// Number of rows to skip.
    pub offset: u64,
    /// Maximum number of rows to return; `None` reads to the end.
    pub limit: Option<u64>,
}

impl ReadOptions {
    /// Read every row of `columns` from `table`.
    pub fn all(table: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            table: table.into(),
            columns,
            order_by: Vec::new(),
            offset: 0,
            limit: None,
        }
    }

    /// Restrict the read to one page.
    pub fn page(mut self, offset: u64, limit: u64) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }

    /// Set the ordering columns.
    pub fn ordered_by(mut self, columns: Vec<String>) -> Self {
        self.order_by = columns;
        self
    }
}

/// SQL syntax strategy for one engine.
pub trait Dialect: Send + Sync {
    /// Dialect name (e.g., "sqlite", "mysql").
    fn name(&self) -> &str;

    /// Quote an identifier.
    fn quote_ident(&self, name: &str) -> String;

    /// Build a SELECT for the given read options.
    fn build_select_query(&self, opts: &ReadOptions) -> String;

    /// Bind parameter placeholder (1-based index).
    fn param_placeholder(&self, index: usize) -> String;
}

/// Read schema and data from the source database.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    /// List user tables with their raw DDL, in catalog order.
    ///
    /// Internal tables (`sqlite_*`) are excluded.
    async fn list_tables(&self) -> Result<Vec<SourceTable>>;

    /// List the foreign keys declared on a table.
    async fn list_foreign_keys(&self, table: &str) -> Result<Vec<ForeignKey>>;

    /// List user-created indexes on a table.
    async fn list_indexes(&self, table: &str) -> Result<Vec<Index>>;

    /// Describe a table's columns in declaration order.
    async fn describe_columns(&self, table: &str) -> Result<Vec<Column>>;

    /// Count the rows of a table.
    async fn row_count(&self, table: &str) -> Result<i64>;

    /// Read rows from a table.
    async fn read_rows(&self, opts: &ReadOptions) -> Result<Vec<Row>>;

    /// Get the database type identifier (e.g., "sqlite").
    fn db_type(&self) -> &str;

    /// Close the connection pool.
    async fn close(&self);
}

/// Execute statements and move rows on the target database.
#[async_trait]
pub trait TargetExecutor: Send + Sync {
    /// Execute a single statement.
    async fn execute(&self, sql: &str) -> Result<()>;

    /// Begin a transaction on the DDL connection.
    async fn begin(&self) -> Result<()>;

    /// Commit the current transaction.
    async fn commit(&self) -> Result<()>;

    /// Roll back the current transaction.
    async fn rollback(&self) -> Result<()>;

    /// Execute one statement in its own transaction.
    ///
    /// On failure the transaction is rolled back and the statement's error is
    /// returned; a failing rollback is only logged.
    async fn execute_in_transaction(&self, sql: &str) -> Result<()> {
        self.begin().await?;
        match self.execute(sql).await {
            Ok(()) => self.commit().await,
            Err(e) => {
                if let Err(rb) = self.rollback().await {
                    warn!("Rollback failed: {}", rb);
                }
                Err(e)
            }
        }
    }

    /// Describe a table's columns as the target reports them.
    async fn describe_table(&self, table: &str) -> Result<Vec<TargetColumn>>;

    /// List tables in the target database.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Count the rows of a table.
    async fn row_count(&self, table: &str) -> Result<i64>;

    /// Read rows from a table.
    async fn read_rows(&self, opts: &ReadOptions) -> Result<Vec<Row>>;

    /// Insert a batch of rows. Returns the number of rows written.
    async fn write_batch(&self, table: &str, columns: &[String], rows: Vec<Row>) -> Result<u64>;

    /// Get the database type identifier (e.g., "mysql").
    fn db_type(&self) -> &str;

    /// Close the connection pool.
    async fn close(&self);
}
