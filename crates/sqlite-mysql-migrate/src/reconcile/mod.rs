//! Foreign-key column type reconciliation.
//!
//! InnoDB refuses a foreign key whose column type differs from the referenced
//! column's type. After Phase CREATE, every foreign-key column is aligned to
//! the type the target actually stored for the referenced column.

use std::collections::HashMap;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::applier::CreateReport;
use crate::core::schema::{ForeignKey, TargetColumn};
use crate::core::traits::TargetExecutor;
use crate::drivers::mysql::MysqlDialect;
use crate::error::{MigrateError, Result};

/// Status of one column reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileStatus {
    /// The column was altered to the referenced type.
    Modified,
    /// One of the two tables was not created.
    Skipped,
    /// Metadata lookup or the ALTER failed.
    Failed,
}

/// Outcome for one foreign-key column whose type needed attention.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileOutcome {
    pub table: String,
    pub column: String,
    pub ref_table: String,
    pub ref_column: String,
    pub from_type: Option<String>,
    pub to_type: Option<String>,
    pub status: ReconcileStatus,
    pub error: Option<String>,
}

impl ReconcileOutcome {
    fn new(fk: &ForeignKey, column: &str, ref_column: &str, status: ReconcileStatus) -> Self {
        Self {
            table: fk.table.clone(),
            column: column.to_string(),
            ref_table: fk.ref_table.clone(),
            ref_column: ref_column.to_string(),
            from_type: None,
            to_type: None,
            status,
            error: None,
        }
    }
}

/// Aligns foreign-key column types on the target.
pub struct TypeReconciler<'a> {
    target: &'a dyn TargetExecutor,
    dialect: MysqlDialect,
    cancel: CancellationToken,
    described: HashMap<String, Vec<TargetColumn>>,
}

impl<'a> TypeReconciler<'a> {
    pub fn new(target: &'a dyn TargetExecutor, cancel: CancellationToken) -> Self {
        Self {
            target,
            dialect: MysqlDialect::new(),
            cancel,
            described: HashMap::new(),
        }
    }

    async fn column(&mut self, table: &str, column: &str) -> Result<TargetColumn> {
        let key = table.to_lowercase();
        if !self.described.contains_key(&key) {
            let columns = self.target.describe_table(table).await?;
            self.described.insert(key.clone(), columns);
        }
        self.described
            .get(&key)
            .and_then(|cols| cols.iter().find(|c| c.name.eq_ignore_ascii_case(column)))
            .cloned()
            .ok_or_else(|| {
                MigrateError::reconcile(table, column, "column not found on target")
            })
    }

    fn remember_type(&mut self, table: &str, column: &str, column_type: &str) {
        if let Some(cols) = self.described.get_mut(&table.to_lowercase()) {
            if let Some(c) = cols.iter_mut().find(|c| c.name.eq_ignore_ascii_case(column)) {
                c.column_type = column_type.to_string();
            }
        }
    }

    /// Align every column pair of `foreign_keys`.
    ///
    /// Pairs that already match are not reported. Only cancellation returns
    /// an error.
    pub async fn reconcile(
        &mut self,
        foreign_keys: &[ForeignKey],
        created: &CreateReport,
    ) -> Result<Vec<ReconcileOutcome>> {
        info!("Reconciling foreign key column types");
        let mut outcomes = Vec::new();

        for fk in foreign_keys {
            for (column, ref_column) in fk.columns.iter().zip(&fk.ref_columns) {
                if self.cancel.is_cancelled() {
                    return Err(MigrateError::Cancelled);
                }

                if !created.is_created(&fk.table) || !created.is_created(&fk.ref_table) {
                    debug!("Skipping {}: table not created", fk.describe());
                    outcomes.push(ReconcileOutcome::new(
                        fk,
                        column,
                        ref_column,
                        ReconcileStatus::Skipped,
                    ));
                    continue;
                }

                if let Some(outcome) = self.reconcile_pair(fk, column, ref_column).await {
                    outcomes.push(outcome);
                }
            }
        }

        let modified = outcomes
            .iter()
            .filter(|o| o.status == ReconcileStatus::Modified)
            .count();
        info!("Reconciled {} column type(s)", modified);
        Ok(outcomes)
    }

    async fn reconcile_pair(
        &mut self,
        fk: &ForeignKey,
        column: &str,
        ref_column: &str,
    ) -> Option<ReconcileOutcome> {
        let mut outcome = ReconcileOutcome::new(fk, column, ref_column, ReconcileStatus::Failed);

        let lookup = async {
            let local = self.column(&fk.table, column).await?;
            let referenced = self.column(&fk.ref_table, ref_column).await?;
            Ok::<_, MigrateError>((local, referenced))
        };
        let (local, referenced) = match lookup.await {
            Ok(pair) => pair,
            Err(e) => {
                error!("Type reconciliation lookup failed for {}: {}", fk.describe(), e);
                outcome.error = Some(e.to_string());
                return Some(outcome);
            }
        };

        if local.column_type.eq_ignore_ascii_case(&referenced.column_type) {
            return None;
        }

        outcome.from_type = Some(local.column_type.clone());
        outcome.to_type = Some(referenced.column_type.clone());

        let sql = self.dialect.build_modify_column(
            &fk.table,
            column,
            &referenced.column_type,
            local.is_nullable,
        );
        match self.target.execute_in_transaction(&sql).await {
            Ok(()) => {
                info!(
                    "{}.{}: {} -> {}",
                    fk.table, column, local.column_type, referenced.column_type
                );
                self.remember_type(&fk.table, column, &referenced.column_type);
                outcome.status = ReconcileStatus::Modified;
            }
            Err(e) => {
                let err = MigrateError::reconcile(&fk.table, column, e);
                error!("{}\n  Statement: {}", err, sql);
                outcome.error = Some(err.to_string());
            }
        }
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::ReferentialAction;
    use crate::testing::{target_column, MockTarget};

    fn fk(table: &str, column: &str, ref_table: &str) -> ForeignKey {
        ForeignKey {
            name: None,
            table: table.to_string(),
            columns: vec![column.to_string()],
            ref_table: ref_table.to_string(),
            ref_columns: vec!["id".to_string()],
            on_delete: ReferentialAction::Restrict,
            on_update: ReferentialAction::Restrict,
        }
    }

    fn created(tables: &[&str]) -> CreateReport {
        CreateReport {
            created: tables.iter().map(|t| t.to_string()).collect(),
            failed: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_mismatched_type_is_modified() {
        let target = MockTarget::new()
            .with_table("users", vec![target_column("id", "int unsigned", false)], vec![])
            .with_table(
                "orders",
                vec![
                    target_column("id", "bigint", false),
                    target_column("user_id", "bigint", false),
                ],
                vec![],
            );
        let mut reconciler = TypeReconciler::new(&target, CancellationToken::new());

        let outcomes = reconciler
            .reconcile(&[fk("orders", "user_id", "users")], &created(&["users", "orders"]))
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].status, ReconcileStatus::Modified);
        assert_eq!(outcomes[0].from_type.as_deref(), Some("bigint"));
        assert_eq!(
            target.executed(),
            vec!["ALTER TABLE `orders` MODIFY COLUMN `user_id` int unsigned NOT NULL".to_string()]
        );
        assert_eq!(
            target.column_type("orders", "user_id").as_deref(),
            Some("int unsigned")
        );
    }

    #[tokio::test]
    async fn test_matching_types_are_left_alone() {
        let target = MockTarget::new()
            .with_table("users", vec![target_column("id", "BIGINT", false)], vec![])
            .with_table("orders", vec![target_column("user_id", "bigint", true)], vec![]);
        let mut reconciler = TypeReconciler::new(&target, CancellationToken::new());

        let outcomes = reconciler
            .reconcile(&[fk("orders", "user_id", "users")], &created(&["users", "orders"]))
            .await
            .unwrap();
        assert!(outcomes.is_empty());
        assert!(target.executed().is_empty());
    }

    #[tokio::test]
    async fn test_failures_are_isolated_per_column() {
        let target = MockTarget::new()
            .fail_on("`a_id`")
            .with_table("users", vec![target_column("id", "int", false)], vec![])
            .with_table(
                "orders",
                vec![
                    target_column("a_id", "bigint", true),
                    target_column("b_id", "bigint", true),
                ],
                vec![],
            );
        let mut reconciler = TypeReconciler::new(&target, CancellationToken::new());

        let outcomes = reconciler
            .reconcile(
                &[fk("orders", "a_id", "users"), fk("orders", "b_id", "users")],
                &created(&["users", "orders"]),
            )
            .await
            .unwrap();

        assert_eq!(outcomes[0].status, ReconcileStatus::Failed);
        assert_eq!(outcomes[1].status, ReconcileStatus::Modified);
        assert_eq!(
            target.executed()[1],
            "ALTER TABLE `orders` MODIFY COLUMN `b_id` int"
        );
    }

    #[tokio::test]
    async fn test_pairs_with_missing_tables_are_skipped() {
        let target = MockTarget::new();
        let mut reconciler = TypeReconciler::new(&target, CancellationToken::new());

        let outcomes = reconciler
            .reconcile(&[fk("orders", "user_id", "users")], &created(&["orders"]))
            .await
            .unwrap();
        assert_eq!(outcomes[0].status, ReconcileStatus::Skipped);
        assert!(target.executed().is_empty());
    }
}
