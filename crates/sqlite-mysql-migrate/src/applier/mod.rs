//! Two-phase schema application.
//!
//! Phase CREATE executes each translated `CREATE TABLE` in dependency order,
//! Phase CONSTRAIN adds the extracted foreign keys once every table exists.
//! Every statement runs in its own transaction and a failure only affects the
//! table, constraint or index it belongs to.

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::schema::Table;
use crate::core::traits::TargetExecutor;
use crate::ddl::{ForeignKeyClause, TranslatedTable};
use crate::drivers::mysql::MysqlDialect;
use crate::error::{MigrateError, Result};

/// A table whose CREATE statement was rejected.
#[derive(Debug, Clone, Serialize)]
pub struct TableFailure {
    pub table: String,
    pub error: String,
    pub statement: String,
}

/// Result of Phase CREATE.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateReport {
    /// Tables created, in creation order.
    pub created: Vec<String>,
    /// Tables whose creation failed.
    pub failed: Vec<TableFailure>,
}

impl CreateReport {
    pub fn is_created(&self, table: &str) -> bool {
        self.created.iter().any(|t| t.eq_ignore_ascii_case(table))
    }

    pub fn failed_tables(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.table.as_str()).collect()
    }
}

/// Status of one statement issued after table creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementStatus {
    /// Executed and committed.
    Applied,
    /// The clause could not be decomposed; nothing was executed.
    Unparsable,
    /// The target rejected the statement.
    Failed,
}

/// Outcome of one foreign-key clause.
#[derive(Debug, Clone, Serialize)]
pub struct ConstraintOutcome {
    pub table: String,
    /// Clause as extracted from the source table.
    pub clause: String,
    /// Rendered ALTER statement, when the clause parsed.
    pub statement: Option<String>,
    pub status: StatementStatus,
    pub error: Option<String>,
}

/// Outcome of one index creation.
#[derive(Debug, Clone, Serialize)]
pub struct IndexOutcome {
    pub table: String,
    pub index: String,
    pub status: StatementStatus,
    pub error: Option<String>,
}

/// Applies translated DDL to the target.
pub struct SchemaApplier<'a> {
    target: &'a dyn TargetExecutor,
    dialect: MysqlDialect,
    cancel: CancellationToken,
}

impl<'a> SchemaApplier<'a> {
    pub fn new(target: &'a dyn TargetExecutor, cancel: CancellationToken) -> Self {
        Self {
            target,
            dialect: MysqlDialect::new(),
            cancel,
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(MigrateError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Phase CREATE: create tables in the given order.
    ///
    /// `order` names tables of `translations`; names without a translation are
    /// ignored. Only cancellation returns an error.
    pub async fn create_tables(
        &self,
        order: &[String],
        translations: &[TranslatedTable],
    ) -> Result<CreateReport> {
        info!("Phase CREATE: creating {} tables", order.len());
        let mut report = CreateReport::default();

        for name in order {
            self.check_cancelled()?;

            let Some(translated) = translations.iter().find(|t| &t.table.name == name) else {
                debug!("No translation for {}, skipping", name);
                continue;
            };

            match self.target.execute_in_transaction(&translated.create_sql).await {
                Ok(()) => {
                    info!("Created table {}", name);
                    report.created.push(name.clone());
                }
                Err(e) => {
                    let err = MigrateError::create(name, e);
                    error!("{}\n  Statement: {}", err, translated.create_sql);
                    report.failed.push(TableFailure {
                        table: name.clone(),
                        error: err.to_string(),
                        statement: translated.create_sql.clone(),
                    });
                }
            }
        }

        info!(
            "Phase CREATE finished: {} created, {} failed",
            report.created.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Phase CONSTRAIN: add every extracted foreign key, failed tables included.
    pub async fn apply_constraints(
        &self,
        clauses: &[ForeignKeyClause],
    ) -> Result<Vec<ConstraintOutcome>> {
        info!("Phase CONSTRAIN: adding {} foreign keys", clauses.len());
        let mut outcomes = Vec::with_capacity(clauses.len());

        for clause in clauses {
            self.check_cancelled()?;

            let fk = match clause.parse() {
                Ok(fk) => fk,
                Err(e) => {
                    let err = MigrateError::constraint(&clause.table, e);
                    warn!("{} (skipped)\n  Clause: {}", err, clause.text);
                    outcomes.push(ConstraintOutcome {
                        table: clause.table.clone(),
                        clause: clause.text.clone(),
                        statement: None,
                        status: StatementStatus::Unparsable,
                        error: Some(err.to_string()),
                    });
                    continue;
                }
            };

            let sql = self.dialect.build_add_foreign_key(&fk);
            let (status, error) = match self.target.execute_in_transaction(&sql).await {
                Ok(()) => {
                    debug!("Added foreign key {}", fk.describe());
                    (StatementStatus::Applied, None)
                }
                Err(e) => {
                    let err = MigrateError::constraint(&clause.table, e);
                    error!("{}\n  Statement: {}", err, sql);
                    (StatementStatus::Failed, Some(err.to_string()))
                }
            };
            outcomes.push(ConstraintOutcome {
                table: clause.table.clone(),
                clause: clause.text.clone(),
                statement: Some(sql),
                status,
                error,
            });
        }

        let applied = outcomes
            .iter()
            .filter(|o| o.status == StatementStatus::Applied)
            .count();
        info!(
            "Phase CONSTRAIN finished: {} applied, {} skipped",
            applied,
            outcomes.len() - applied
        );
        Ok(outcomes)
    }

    /// Recreate source indexes on tables that were created.
    pub async fn create_indexes(
        &self,
        tables: &[Table],
        created: &CreateReport,
    ) -> Result<Vec<IndexOutcome>> {
        let mut outcomes = Vec::new();

        for table in tables.iter().filter(|t| created.is_created(&t.name)) {
            for idx in &table.indexes {
                self.check_cancelled()?;

                let sql = self.dialect.build_create_index(&table.name, idx);
                let (status, error) = match self.target.execute_in_transaction(&sql).await {
                    Ok(()) => (StatementStatus::Applied, None),
                    Err(e) => {
                        error!(
                            "Failed to create index {} on {}: {}\n  Statement: {}",
                            idx.name, table.name, e, sql
                        );
                        (StatementStatus::Failed, Some(e.to_string()))
                    }
                };
                outcomes.push(IndexOutcome {
                    table: table.name.clone(),
                    index: idx.name.clone(),
                    status,
                    error,
                });
            }
        }

        if !outcomes.is_empty() {
            let applied = outcomes
                .iter()
                .filter(|o| o.status == StatementStatus::Applied)
                .count();
            info!("Created {} of {} indexes", applied, outcomes.len());
        }
        Ok(outcomes)
    }
}
