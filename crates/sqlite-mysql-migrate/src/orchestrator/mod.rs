//! Migration orchestrator - main workflow coordinator.
//!
//! A run goes through these phases, each logged as it starts:
//!
//! 1. Extract and translate the source schema
//! 2. Resolve the creation order
//! 3. Phase CREATE
//! 4. Type reconciliation (optional)
//! 5. Data transfer (optional)
//! 6. Phase CONSTRAIN (optional)
//! 7. Index creation (optional)
//! 8. Validation (optional)
//!
//! Only connection failures and cancellation abort a run; everything else is
//! recorded in the [`MigrationResult`].

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::applier::{
    ConstraintOutcome, CreateReport, IndexOutcome, SchemaApplier, StatementStatus, TableFailure,
};
use crate::config::Config;
use crate::core::schema::{Column, ForeignKey, Table};
use crate::core::traits::{SchemaSource, SourceTable, TargetExecutor};
use crate::ddl::{translate, ForeignKeyClause, TranslatedTable};
use crate::drivers::{MysqlExecutor, SqliteReader};
use crate::error::{MigrateError, Result};
use crate::reconcile::{ReconcileOutcome, ReconcileStatus, TypeReconciler};
use crate::resolver::{resolve_order, Resolution};
use crate::transfer::{TransferEngine, TransferReport};
use crate::verify::{ValidationReport, Validator};

/// Migration orchestrator.
pub struct Orchestrator {
    config: Config,
    source: Arc<dyn SchemaSource>,
    target: Arc<dyn TargetExecutor>,
    rows_transferred: Arc<AtomicI64>,
}

/// Source schema after extraction and translation.
#[derive(Debug, Clone, Default)]
pub struct SchemaSnapshot {
    /// Every source table, translated or not.
    pub tables: Vec<Table>,
    /// Translations of the tables that parsed.
    pub translations: Vec<TranslatedTable>,
    /// Tables whose DDL could not be translated.
    pub untranslated: Vec<TableFailure>,
}

impl SchemaSnapshot {
    /// Every extracted foreign-key clause, in table order.
    pub fn clauses(&self) -> Vec<ForeignKeyClause> {
        self.translations
            .iter()
            .flat_map(|t| t.foreign_keys.iter().cloned())
            .collect()
    }
}

/// One table in a migration plan.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedTable {
    pub name: String,
    pub create_sql: String,
    pub foreign_keys: Vec<String>,
    pub warnings: Vec<String>,
}

/// What a run would do, computed without touching the target.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationPlan {
    /// Tables in creation order.
    pub tables: Vec<PlannedTable>,
    pub cyclic_tables: Vec<String>,
    pub dangling_references: Vec<String>,
    pub untranslated: Vec<TableFailure>,
}

impl MigrationPlan {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status: completed, completed_with_errors or failed.
    pub status: String,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Total tables extracted from the source.
    pub tables_total: usize,

    /// Tables created on the target, in creation order.
    pub tables_created: Vec<String>,

    /// Tables that could not be translated or created.
    pub tables_failed: Vec<TableFailure>,

    /// Creation order computed by the resolver.
    pub creation_order: Vec<String>,

    /// Tables caught in a foreign-key cycle.
    pub cyclic_tables: Vec<String>,

    /// Foreign keys referencing tables missing from the source.
    pub dangling_references: Vec<ForeignKey>,

    /// Extracted foreign-key clauses per table, failed tables included.
    pub foreign_keys: BTreeMap<String, Vec<String>>,

    /// Phase CONSTRAIN outcomes.
    pub constraints: Vec<ConstraintOutcome>,

    /// Foreign-key column type changes.
    pub reconciliations: Vec<ReconcileOutcome>,

    /// Index creation outcomes.
    pub indexes: Vec<IndexOutcome>,

    /// Data transfer statistics.
    pub transfer: Option<TransferReport>,

    /// Total rows transferred.
    pub rows_transferred: u64,

    /// Validation report, when validation ran.
    pub validation: Option<ValidationReport>,

    /// Why validation could not run to completion.
    pub validation_error: Option<String>,
}

impl MigrationResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// A run succeeds when Phase CREATE created at least one table.
    pub fn is_success(&self) -> bool {
        !self.tables_created.is_empty()
    }

    pub fn constraints_applied(&self) -> usize {
        self.constraints
            .iter()
            .filter(|c| c.status == StatementStatus::Applied)
            .count()
    }

    fn has_errors(&self) -> bool {
        !self.tables_failed.is_empty()
            || self.constraints.iter().any(|c| c.status != StatementStatus::Applied)
            || self.indexes.iter().any(|i| i.status != StatementStatus::Applied)
            || self
                .reconciliations
                .iter()
                .any(|r| r.status == ReconcileStatus::Failed)
            || self
                .transfer
                .as_ref()
                .map_or(false, |t| t.failed().next().is_some())
            || self.validation_error.is_some()
            || self.validation.as_ref().map_or(false, |v| !v.is_valid())
    }
}

/// Connectivity of both sides.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    pub source_connected: bool,
    pub source_latency_ms: u64,
    pub source_error: Option<String>,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    pub target_error: Option<String>,
    pub healthy: bool,
}

/// Merge pragma-reported columns with the fragments of the translation.
fn merge_columns(described: Vec<Column>, translated: &Table) -> Vec<Column> {
    described
        .into_iter()
        .map(|mut col| {
            if let Some(t) = translated.column(&col.name) {
                col.target_type = t.target_type.clone();
                col.constraints = t.constraints.clone();
            }
            col
        })
        .collect()
}

/// Carry constraint names from the DDL onto the catalog's foreign keys.
fn name_foreign_keys(foreign_keys: &mut [ForeignKey], translated: &Table) {
    for fk in foreign_keys.iter_mut() {
        let named = translated.foreign_keys.iter().find(|t| {
            t.ref_table.eq_ignore_ascii_case(&fk.ref_table)
                && t.columns.len() == fk.columns.len()
                && t.columns
                    .iter()
                    .zip(&fk.columns)
                    .all(|(a, b)| a.eq_ignore_ascii_case(b))
        });
        if let Some(named) = named {
            fk.name = named.name.clone();
        }
    }
}

/// Point references that omit their column list at the parent's primary key.
fn fill_reference_columns(snapshot: &mut SchemaSnapshot) {
    let primary_keys: HashMap<String, Vec<String>> = snapshot
        .tables
        .iter()
        .map(|t| (t.name.to_lowercase(), t.primary_key.clone()))
        .collect();
    let lookup = |table: &str| {
        primary_keys
            .get(&table.to_lowercase())
            .filter(|pk| !pk.is_empty())
            .cloned()
    };

    for translated in &mut snapshot.translations {
        for clause in &mut translated.foreign_keys {
            if let Some(filled) = clause.with_default_ref_columns(&lookup) {
                debug!("{}: {} -> {}", clause.table, clause.text, filled.text);
                *clause = filled;
            }
        }
    }

    let tables = snapshot
        .tables
        .iter_mut()
        .chain(snapshot.translations.iter_mut().map(|t| &mut t.table));
    for table in tables {
        for fk in table.foreign_keys.iter_mut().filter(|fk| fk.ref_columns.is_empty()) {
            if let Some(pk) = lookup(&fk.ref_table) {
                fk.ref_columns = pk;
            }
        }
    }
}

impl Orchestrator {
    /// Create a new orchestrator, connecting to both databases.
    pub async fn new(config: Config) -> Result<Self> {
        let source = SqliteReader::connect(&config.source, &config.retry).await?;
        let target = MysqlExecutor::connect(&config.target, &config.retry).await?;
        Ok(Self::with_engines(config, Arc::new(source), Arc::new(target)))
    }

    /// Create an orchestrator over existing engines.
    pub fn with_engines(
        config: Config,
        source: Arc<dyn SchemaSource>,
        target: Arc<dyn TargetExecutor>,
    ) -> Self {
        Self {
            config,
            source,
            target,
            rows_transferred: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Counter of rows written so far, updated during the transfer phase.
    pub fn progress_counter(&self) -> Arc<AtomicI64> {
        self.rows_transferred.clone()
    }

    /// Extract every source table and translate its DDL.
    pub async fn extract_schema(&self) -> Result<SchemaSnapshot> {
        let source_tables = self.source.list_tables().await?;
        let mut snapshot = SchemaSnapshot::default();

        for SourceTable { name, sql } in source_tables {
            let mut foreign_keys = self.source.list_foreign_keys(&name).await?;
            let indexes = if self.config.migration.create_indexes {
                self.source.list_indexes(&name).await?
            } else {
                Vec::new()
            };
            let described = self.source.describe_columns(&name).await?;

            match translate(&sql) {
                Ok(mut translated) => {
                    name_foreign_keys(&mut foreign_keys, &translated.table);
                    let mut table = Table::new(&name, &sql);
                    table.columns = merge_columns(described, &translated.table);
                    table.primary_key = if translated.table.primary_key.is_empty() {
                        table
                            .columns
                            .iter()
                            .filter(|c| c.is_primary_key)
                            .map(|c| c.name.clone())
                            .collect()
                    } else {
                        translated.table.primary_key.clone()
                    };
                    table.foreign_keys = foreign_keys;
                    table.indexes = indexes;

                    translated.table = table.clone();
                    snapshot.tables.push(table);
                    snapshot.translations.push(translated);
                }
                Err(e) => {
                    error!("Could not translate table {}: {}\n  Statement: {}", name, e, sql);
                    let mut table = Table::new(&name, &sql);
                    table.columns = described;
                    table.foreign_keys = foreign_keys;
                    snapshot.tables.push(table);
                    snapshot.untranslated.push(TableFailure {
                        table: name,
                        error: e.to_string(),
                        statement: sql,
                    });
                }
            }
        }

        fill_reference_columns(&mut snapshot);
        Ok(snapshot)
    }

    /// Build the migration plan without touching the target.
    pub async fn plan(&self) -> Result<MigrationPlan> {
        let snapshot = self.extract_schema().await?;
        let resolution = resolve_order(&snapshot.tables);

        let tables = resolution
            .order
            .iter()
            .filter_map(|name| snapshot.translations.iter().find(|t| &t.table.name == name))
            .map(|t| PlannedTable {
                name: t.table.name.clone(),
                create_sql: t.create_sql.clone(),
                foreign_keys: t.foreign_keys.iter().map(|c| c.text.clone()).collect(),
                warnings: t.warnings.iter().map(|w| w.to_string()).collect(),
            })
            .collect();

        Ok(MigrationPlan {
            tables,
            cyclic_tables: resolution.cyclic,
            dangling_references: resolution.dangling.iter().map(ForeignKey::describe).collect(),
            untranslated: snapshot.untranslated,
        })
    }

    /// Run the migration.
    pub async fn run(self, cancel: CancellationToken) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let timer = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let source = self.source.as_ref();
        let target = self.target.as_ref();

        info!("Starting migration run: {}", run_id);

        info!("Phase 1: Extracting schema from source");
        let snapshot = self.extract_schema().await?;
        info!("Found {} tables to migrate", snapshot.tables.len());

        info!("Phase 2: Resolving creation order");
        let Resolution {
            order,
            cyclic,
            dangling,
        } = resolve_order(&snapshot.tables);

        info!("Phase 3: Creating tables");
        let applier = SchemaApplier::new(target, cancel.clone());
        let mut created = applier.create_tables(&order, &snapshot.translations).await?;
        created.failed.extend(snapshot.untranslated.iter().cloned());

        let clauses = snapshot.clauses();
        let mut result = MigrationResult {
            run_id,
            status: String::new(),
            duration_seconds: 0.0,
            started_at,
            completed_at: started_at,
            tables_total: snapshot.tables.len(),
            tables_created: created.created.clone(),
            tables_failed: created.failed.clone(),
            creation_order: order.clone(),
            cyclic_tables: cyclic,
            dangling_references: dangling,
            foreign_keys: BTreeMap::new(),
            constraints: Vec::new(),
            reconciliations: Vec::new(),
            indexes: Vec::new(),
            transfer: None,
            rows_transferred: 0,
            validation: None,
            validation_error: None,
        };
        for clause in &clauses {
            result
                .foreign_keys
                .entry(clause.table.clone())
                .or_default()
                .push(clause.text.clone());
        }

        if created.created.is_empty() {
            error!("No tables were created; skipping remaining phases");
        } else {
            self.after_create(&snapshot, &order, &created, &clauses, &mut result, &cancel)
                .await?;
        }

        result.completed_at = Utc::now();
        result.duration_seconds = timer.elapsed().as_secs_f64();
        result.status = if !result.is_success() {
            "failed"
        } else if result.has_errors() {
            "completed_with_errors"
        } else {
            "completed"
        }
        .to_string();

        info!(
            "Migration {}: {}/{} tables created, {}/{} foreign keys, {} rows in {:.1}s",
            result.status,
            result.tables_created.len(),
            result.tables_total,
            result.constraints_applied(),
            result.constraints.len(),
            result.rows_transferred,
            result.duration_seconds
        );

        source.close().await;
        target.close().await;
        Ok(result)
    }

    async fn after_create(
        &self,
        snapshot: &SchemaSnapshot,
        order: &[String],
        created: &CreateReport,
        clauses: &[ForeignKeyClause],
        result: &mut MigrationResult,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let migration = &self.config.migration;
        let source = self.source.as_ref();
        let target = self.target.as_ref();
        let applier = SchemaApplier::new(target, cancel.clone());

        if migration.reconcile_types {
            info!("Phase 4: Reconciling foreign key column types");
            let parsed: Vec<ForeignKey> = clauses.iter().filter_map(|c| c.parse().ok()).collect();
            let mut reconciler = TypeReconciler::new(target, cancel.clone());
            result.reconciliations = reconciler.reconcile(&parsed, created).await?;
        }

        if migration.transfer_data {
            info!("Phase 5: Transferring data");
            let engine =
                TransferEngine::new(source, target, migration.transfer_config(), cancel.clone())
                    .with_progress_counter(self.rows_transferred.clone());
            let report = engine.transfer_all(order, &snapshot.tables, created).await?;
            result.rows_transferred = report.total_rows;
            result.transfer = Some(report);
        }

        if migration.create_foreign_keys {
            info!("Phase 6: Adding foreign key constraints");
            result.constraints = applier.apply_constraints(clauses).await?;
        }

        if migration.create_indexes {
            info!("Phase 7: Creating indexes");
            result.indexes = applier.create_indexes(&snapshot.tables, created).await?;
        }

        if migration.validate {
            info!("Phase 8: Validating");
            let validator =
                Validator::new(source, target, migration.validator_config(), cancel.clone());
            match validator.validate(&snapshot.tables).await {
                Ok(report) => result.validation = Some(report),
                Err(MigrateError::Cancelled) => return Err(MigrateError::Cancelled),
                Err(e) => {
                    warn!("Validation could not complete: {}", e);
                    result.validation_error = Some(e.to_string());
                }
            }
        }

        Ok(())
    }

    /// Validate the current target against the source.
    pub async fn validate(&self, cancel: CancellationToken) -> Result<ValidationReport> {
        let snapshot = self.extract_schema().await?;
        let validator = Validator::new(
            self.source.as_ref(),
            self.target.as_ref(),
            self.config.migration.validator_config(),
            cancel,
        );
        validator.validate(&snapshot.tables).await
    }

    /// Check connectivity and latency of both sides.
    pub async fn health_check(&self) -> Result<HealthCheckResult> {
        let start = Instant::now();
        let source = self.source.list_tables().await;
        let source_latency_ms = start.elapsed().as_millis() as u64;

        let start = Instant::now();
        let target = self.target.list_tables().await;
        let target_latency_ms = start.elapsed().as_millis() as u64;

        let result = HealthCheckResult {
            source_connected: source.is_ok(),
            source_latency_ms,
            source_error: source.err().map(|e| e.to_string()),
            target_connected: target.is_ok(),
            target_latency_ms,
            target_error: target.err().map(|e| e.to_string()),
            healthy: false,
        };
        Ok(HealthCheckResult {
            healthy: result.source_connected && result.target_connected,
            ..result
        })
    }

    /// Rows transferred so far.
    pub fn rows_transferred(&self) -> i64 {
        self.rows_transferred.load(Ordering::Relaxed)
    }

    /// Close both connections.
    pub async fn close(&self) {
        self.source.close().await;
        self.target.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MigrationConfig, SourceConfig, TargetConfig};
    use crate::core::schema::Index;
    use crate::core::value::SqlValue;
    use crate::retry::RetryPolicy;
    use crate::testing::{MockSource, MockTarget};
    use crate::verify::DataOutcome;
    use std::path::PathBuf;

    const USERS: &str = "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, email TEXT NOT NULL)";
    const ORDERS: &str = "CREATE TABLE orders (id INTEGER PRIMARY KEY, user_id INTEGER, total REAL, CONSTRAINT fk_user FOREIGN KEY (user_id) REFERENCES users(id))";
    const CATEGORIES: &str = "CREATE TABLE categories (id INTEGER PRIMARY KEY, parent_id INTEGER REFERENCES categories(id))";

    fn config() -> Config {
        Config {
            source: SourceConfig {
                path: PathBuf::from("unused.db"),
                max_connections: 1,
            },
            target: TargetConfig {
                host: "localhost".into(),
                port: 3306,
                database: "app".into(),
                user: "app".into(),
                password: String::new(),
                ssl_mode: "disable".into(),
                max_connections: 1,
            },
            migration: MigrationConfig {
                epoch_millis_columns: Vec::new(),
                ..Default::default()
            },
            retry: RetryPolicy::none(),
        }
    }

    fn source() -> MockSource {
        MockSource::new()
            .with_table(
                ORDERS,
                vec![
                    vec![SqlValue::Integer(1), SqlValue::Integer(1), SqlValue::Real(9.5)],
                    vec![SqlValue::Integer(2), SqlValue::Integer(2), SqlValue::Null],
                ],
            )
            .with_table(
                USERS,
                vec![
                    vec![SqlValue::Integer(1), SqlValue::Text("a@example.com".into())],
                    vec![SqlValue::Integer(2), SqlValue::Text("b@example.com".into())],
                ],
            )
            .with_table(CATEGORIES, vec![])
            .with_index(
                "users",
                Index {
                    name: "idx_users_email".into(),
                    columns: vec!["email".into()],
                    is_unique: true,
                },
            )
    }

    fn orchestrator(config: Config, source: MockSource, target: Arc<MockTarget>) -> Orchestrator {
        Orchestrator::with_engines(config, Arc::new(source), target)
    }

    #[tokio::test]
    async fn test_full_run() {
        let target = Arc::new(MockTarget::new());
        let orch = orchestrator(config(), source(), target.clone());
        let counter = orch.progress_counter();

        let result = orch.run(CancellationToken::new()).await.unwrap();

        assert_eq!(result.status, "completed", "{}", result.to_json().unwrap());
        assert_eq!(result.creation_order, vec!["users", "categories", "orders"]);
        assert_eq!(result.tables_created, result.creation_order);
        assert!(result.tables_failed.is_empty());
        assert_eq!(result.constraints.len(), 2);
        assert_eq!(result.constraints_applied(), 2);
        assert_eq!(result.indexes.len(), 1);
        assert_eq!(result.rows_transferred, 4);
        assert_eq!(counter.load(Ordering::Relaxed), 4);
        assert!(result.validation.as_ref().unwrap().is_valid());
        assert_eq!(
            result.foreign_keys["orders"],
            vec!["CONSTRAINT `fk_user` FOREIGN KEY (`user_id`) REFERENCES `users` (`id`)"]
        );

        // every CREATE precedes every ALTER
        let executed = target.executed();
        let last_create = executed.iter().rposition(|s| s.starts_with("CREATE TABLE")).unwrap();
        let first_alter = executed.iter().position(|s| s.starts_with("ALTER TABLE")).unwrap();
        assert!(last_create < first_alter);
        assert_eq!(target.rows("orders").len(), 2);
    }

    #[tokio::test]
    async fn test_reference_without_columns_targets_primary_key() {
        let posts = "CREATE TABLE posts (id INTEGER PRIMARY KEY, author_id INTEGER REFERENCES users)";
        let source = MockSource::new()
            .with_table(posts, vec![])
            .with_table(USERS, vec![]);
        let target = Arc::new(MockTarget::new());
        let orch = orchestrator(config(), source, target.clone());

        let result = orch.run(CancellationToken::new()).await.unwrap();

        assert_eq!(result.constraints.len(), 1);
        assert_eq!(result.constraints[0].status, StatementStatus::Applied);
        assert_eq!(
            result.foreign_keys["posts"],
            vec!["FOREIGN KEY (`author_id`) REFERENCES `users` (`id`)"]
        );
        assert!(target
            .executed()
            .iter()
            .any(|s| s.starts_with("ALTER TABLE `posts`") && s.contains("REFERENCES `users` (`id`)")));
    }

    #[tokio::test]
    async fn test_create_failure_is_isolated() {
        let target = Arc::new(MockTarget::new().fail_on("CREATE TABLE `orders`"));
        let orch = orchestrator(config(), source(), target.clone());

        let result = orch.run(CancellationToken::new()).await.unwrap();

        assert!(result.is_success());
        assert_eq!(result.status, "completed_with_errors");
        let failed: Vec<&str> = result.tables_failed.iter().map(|f| f.table.as_str()).collect();
        assert_eq!(failed, vec!["orders"]);
        assert_eq!(result.tables_created, vec!["users", "categories"]);
        // the failed table's foreign key is still recorded and attempted
        assert!(result.foreign_keys.contains_key("orders"));
        assert!(result.constraints.iter().any(|c| c.table == "orders"));
        let validation = result.validation.unwrap();
        assert_eq!(validation.missing_in_target, vec!["orders".to_string()]);
    }

    #[tokio::test]
    async fn test_untranslatable_table_is_recorded_as_failed() {
        let source = MockSource::new()
            .with_table(USERS, vec![])
            .with_raw_table("snapshot", "CREATE TABLE snapshot AS SELECT * FROM users");
        let target = Arc::new(MockTarget::new());
        let orch = orchestrator(config(), source, target.clone());

        let result = orch.run(CancellationToken::new()).await.unwrap();
        assert_eq!(result.tables_created, vec!["users"]);
        assert_eq!(result.tables_failed.len(), 1);
        assert_eq!(result.tables_failed[0].table, "snapshot");
        assert!(!target.executed().iter().any(|s| s.contains("snapshot")));
    }

    #[tokio::test]
    async fn test_no_tables_created_fails_the_run() {
        let target = Arc::new(MockTarget::new().fail_on("CREATE TABLE"));
        let orch = orchestrator(config(), source(), target.clone());

        let result = orch.run(CancellationToken::new()).await.unwrap();
        assert!(!result.is_success());
        assert_eq!(result.status, "failed");
        assert_eq!(result.tables_failed.len(), 3);
        assert!(result.constraints.is_empty());
        assert!(result.validation.is_none());
    }

    #[tokio::test]
    async fn test_optional_stages_can_be_disabled() {
        let mut config = config();
        config.migration.transfer_data = false;
        config.migration.validate = false;
        config.migration.create_foreign_keys = false;
        config.migration.create_indexes = false;
        config.migration.reconcile_types = false;
        let target = Arc::new(MockTarget::new());
        let orch = orchestrator(config, source(), target.clone());

        let result = orch.run(CancellationToken::new()).await.unwrap();
        assert_eq!(result.status, "completed");
        assert!(result.transfer.is_none());
        assert!(result.constraints.is_empty());
        assert_eq!(target.executed().len(), 3);
    }

    #[tokio::test]
    async fn test_plan_does_not_touch_target() {
        let target = Arc::new(MockTarget::new());
        let orch = orchestrator(config(), source(), target.clone());

        let plan = orch.plan().await.unwrap();
        let names: Vec<&str> = plan.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["users", "categories", "orders"]);
        assert!(plan.tables[0]
            .create_sql
            .starts_with("CREATE TABLE `users` (`id` BIGINT PRIMARY KEY AUTO_INCREMENT"));
        assert!(target.executed().is_empty());
        assert!(plan.to_json().unwrap().contains("fk_user"));
    }

    #[tokio::test]
    async fn test_cancelled_run_returns_cancelled() {
        let target = Arc::new(MockTarget::new());
        let orch = orchestrator(config(), source(), target.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = orch.run(cancel).await.unwrap_err();
        assert!(matches!(err, MigrateError::Cancelled));
        assert!(target.executed().is_empty());
    }

    #[tokio::test]
    async fn test_standalone_validation_reports_count_mismatch() {
        let target = Arc::new(MockTarget::new());
        let mut cfg = config();
        cfg.migration.validate = false;
        orchestrator(cfg.clone(), source(), target.clone())
            .run(CancellationToken::new())
            .await
            .unwrap();

        // the source gained a row after the run
        let grown = source().with_table(
            "CREATE TABLE audit (id INTEGER)",
            vec![vec![SqlValue::Integer(1)]],
        );
        let report = orchestrator(cfg, grown, target)
            .validate(CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.missing_in_target, vec!["audit".to_string()]);
        let users = report.tables.iter().find(|t| t.table == "users").unwrap();
        assert_eq!(users.data, Some(DataOutcome::Match { rows: 2 }));
    }

    #[tokio::test]
    async fn test_health_check() {
        let orch = orchestrator(config(), source(), Arc::new(MockTarget::new()));
        let health = orch.health_check().await.unwrap();
        assert!(health.healthy);
        assert!(health.source_error.is_none());
    }
}
