//! Error types for the migration library.

use thiserror::Error;

/// Main error type for migration operations.
///
/// Per-table and per-constraint variants (`Create`, `Constraint`, `Reconcile`,
/// `Parse`) are caught by the pipeline and recorded in the run result; only
/// connection-level failures abort a run.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source database (SQLite) query error
    #[error("Source database error: {0}")]
    Source(#[from] sqlx::Error),

    /// Target database (MySQL) query error
    #[error("Target database error: {0}")]
    Target(#[from] mysql_async::Error),

    /// Connection could not be established after all retry attempts
    #[error("Connection to {engine} failed: {message}")]
    Connection { engine: String, message: String },

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// A DDL fragment could not be decomposed
    #[error("Could not parse {fragment:?}: {message}")]
    Parse { fragment: String, message: String },

    /// Target rejected a CREATE TABLE statement
    #[error("Create failed for table {table}: {message}")]
    Create { table: String, message: String },

    /// FOREIGN KEY clause unparsable or rejected
    #[error("Constraint failed on table {table}: {message}")]
    Constraint { table: String, message: String },

    /// Type-alignment ALTER failed
    #[error("Type reconciliation failed for {table}.{column}: {message}")]
    Reconcile {
        table: String,
        column: String,
        message: String,
    },

    /// Statement rejected by a target executor
    #[error("Execution failed: {0}")]
    Execution(String),

    /// Data transfer failed for a specific table
    #[error("Transfer failed for table {table}: {message}")]
    Transfer { table: String, message: String },

    /// No table could be created on the target
    #[error("No tables were created on the target")]
    NoTablesCreated,

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Migration was cancelled (SIGINT, etc.)
    #[error("Migration cancelled")]
    Cancelled,
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Connection error
    pub fn connection(engine: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Connection {
            engine: engine.into(),
            message: message.to_string(),
        }
    }

    /// Create a Parse error
    pub fn parse(fragment: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Parse {
            fragment: fragment.into(),
            message: message.into(),
        }
    }

    /// Create a Create error
    pub fn create(table: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Create {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Create a Constraint error
    pub fn constraint(table: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Constraint {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Create a Reconcile error
    pub fn reconcile(
        table: impl Into<String>,
        column: impl Into<String>,
        message: impl ToString,
    ) -> Self {
        MigrateError::Reconcile {
            table: table.into(),
            column: column.into(),
            message: message.to_string(),
        }
    }

    /// Create a Transfer error
    pub fn transfer(table: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Transfer {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Whether the error should abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MigrateError::Connection { .. }
                | MigrateError::Pool { .. }
                | MigrateError::Config(_)
                | MigrateError::Cancelled
        )
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) => 1,
            MigrateError::Connection { .. } | MigrateError::Pool { .. } => 2,
            MigrateError::Source(_)
            | MigrateError::Target(_)
            | MigrateError::Execution(_)
            | MigrateError::Parse { .. }
            | MigrateError::Create { .. }
            | MigrateError::Constraint { .. }
            | MigrateError::Reconcile { .. }
            | MigrateError::Transfer { .. }
            | MigrateError::Json(_) => 3,
            MigrateError::NoTablesCreated => 4,
            MigrateError::Io(_) => 7,
            MigrateError::Cancelled => 130,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
