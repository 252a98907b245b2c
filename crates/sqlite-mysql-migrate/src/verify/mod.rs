//! Post-migration validation.
//!
//! Two comparisons are made for every table:
//!
//! - **Schema**: table-name sets, then for tables on both sides the sets of
//!   `(column name, normalized type)` signatures.
//! - **Data**: over the columns both sides share, row counts first; only when
//!   they agree are all rows fetched, rendered to engine-independent text,
//!   sorted in process and compared position by position.
//!
//! Sorting in process gives both sides the same order regardless of engine
//! collations, at the cost of holding each table in memory twice.

pub mod types;

pub use types::{
    ColumnSignature, DataOutcome, RowDiff, TableSchemaDiff, TableValidation, ValidationReport,
};

use std::collections::BTreeSet;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::schema::{Column, Table, TargetColumn};
use crate::core::traits::{ReadOptions, SchemaSource, TargetExecutor};
use crate::core::value::{Row, ValueShape};
use crate::error::{MigrateError, Result};
use crate::transfer::{common_columns, convert_epoch_millis, epoch_millis_mask};
use crate::typemap::{normalize_type, sqlite_to_mysql};

/// Validator configuration.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Stop after the first table whose schema or data differ.
    pub fail_fast: bool,
    /// Compare rows in addition to schemas.
    pub compare_data: bool,
    /// Maximum number of differing rows kept as samples per table.
    pub max_row_diffs: usize,
    /// Columns converted from epoch milliseconds during transfer.
    pub epoch_millis_columns: Vec<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            fail_fast: false,
            compare_data: true,
            max_row_diffs: 10,
            epoch_millis_columns: Vec::new(),
        }
    }
}

type NormalizedRow = Vec<Option<String>>;

/// Compare source and target column sets by normalized type.
pub fn diff_columns(table: &str, source: &[Column], target: &[TargetColumn]) -> TableSchemaDiff {
    // Typeless source columns were created as TEXT.
    let source_set: BTreeSet<ColumnSignature> = source
        .iter()
        .map(|c| ColumnSignature::new(&c.name, normalize_type(&sqlite_to_mysql(&c.source_type))))
        .collect();
    let target_set: BTreeSet<ColumnSignature> = target
        .iter()
        .map(|c| ColumnSignature::new(&c.name, normalize_type(&c.column_type)))
        .collect();

    TableSchemaDiff {
        table: table.to_string(),
        matched: source_set.intersection(&target_set).cloned().collect(),
        missing_in_target: source_set.difference(&target_set).cloned().collect(),
        missing_in_source: target_set.difference(&source_set).cloned().collect(),
    }
}

/// Shape of each of `columns` on the target; unknown columns compare plainly.
fn column_shapes(columns: &[String], target_columns: &[TargetColumn]) -> Vec<ValueShape> {
    columns
        .iter()
        .map(|name| {
            target_columns
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(name))
                .map_or(ValueShape::Plain, |c| ValueShape::from_column_type(&c.column_type))
        })
        .collect()
}

fn normalize_rows(rows: Vec<Row>, shapes: &[ValueShape]) -> Vec<NormalizedRow> {
    let mut normalized: Vec<NormalizedRow> = rows
        .iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .map(|(i, v)| v.normalized_as(shapes.get(i).copied().unwrap_or(ValueShape::Plain)))
                .collect()
        })
        .collect();
    normalized.sort();
    normalized
}

/// Compare two sorted row sequences position by position.
///
/// Returns the number of differing positions and up to `max_samples` of them.
fn compare_sorted(
    columns: &[String],
    source: &[NormalizedRow],
    target: &[NormalizedRow],
    max_samples: usize,
) -> (u64, Vec<RowDiff>) {
    let mut differing = 0u64;
    let mut samples = Vec::new();

    for position in 0..source.len().max(target.len()) {
        let (s, t) = (source.get(position), target.get(position));
        if s == t {
            continue;
        }
        differing += 1;
        if samples.len() >= max_samples {
            continue;
        }

        let s = s.cloned().unwrap_or_default();
        let t = t.cloned().unwrap_or_default();
        let differing_columns = columns
            .iter()
            .enumerate()
            .filter(|(i, _)| s.get(*i) != t.get(*i))
            .map(|(_, name)| name.clone())
            .collect();
        samples.push(RowDiff {
            position,
            columns: differing_columns,
            source: s,
            target: t,
        });
    }

    (differing, samples)
}

/// Compares the migrated target against the source.
pub struct Validator<'a> {
    source: &'a dyn SchemaSource,
    target: &'a dyn TargetExecutor,
    config: ValidatorConfig,
    cancel: CancellationToken,
}

impl<'a> Validator<'a> {
    pub fn new(
        source: &'a dyn SchemaSource,
        target: &'a dyn TargetExecutor,
        config: ValidatorConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            target,
            config,
            cancel,
        }
    }

    /// Validate every source table against the target.
    ///
    /// Metadata failures return an error; a table whose rows cannot be read
    /// is recorded as [`DataOutcome::Failed`].
    pub async fn validate(&self, tables: &[Table]) -> Result<ValidationReport> {
        info!("Validating {} tables", tables.len());
        let target_tables = self.target.list_tables().await?;
        let mut report = ValidationReport::default();

        for table in tables {
            if target_tables.iter().any(|t| t.eq_ignore_ascii_case(&table.name)) {
                report.matched_tables.push(table.name.clone());
            } else {
                report.missing_in_target.push(table.name.clone());
            }
        }
        report.missing_in_source = target_tables
            .iter()
            .filter(|t| !tables.iter().any(|s| s.name.eq_ignore_ascii_case(t)))
            .cloned()
            .collect();
        report.missing_in_source.sort();

        for name in &report.missing_in_target {
            warn!("Table {} is missing from the target", name);
        }
        for name in &report.missing_in_source {
            warn!("Table {} exists only on the target", name);
        }

        for table in tables.iter().filter(|t| report.matched_tables.contains(&t.name)) {
            if self.cancel.is_cancelled() {
                return Err(MigrateError::Cancelled);
            }

            let validation = self.validate_table(table).await?;
            let is_match = validation.is_match();
            report.tables.push(validation);

            if !is_match && self.config.fail_fast {
                warn!("Stopping validation at first mismatching table {}", table.name);
                report.stopped_early = true;
                break;
            }
        }

        if report.is_valid() {
            info!("Validation passed for {} tables", report.tables.len());
        } else {
            warn!(
                "Validation found mismatches: {} missing on target, {} extra on target, mismatched tables: [{}]",
                report.missing_in_target.len(),
                report.missing_in_source.len(),
                report.mismatched_tables().join(", ")
            );
        }
        Ok(report)
    }

    async fn validate_table(&self, table: &Table) -> Result<TableValidation> {
        let target_columns = self.target.describe_table(&table.name).await?;
        let schema = diff_columns(&table.name, &table.columns, &target_columns);
        for sig in &schema.missing_in_target {
            warn!("{}: column {} missing on target", table.name, sig);
        }
        for sig in &schema.missing_in_source {
            warn!("{}: column {} missing on source", table.name, sig);
        }

        let data = if self.config.compare_data {
            let outcome = match self.diff_data(table, &target_columns).await {
                Ok(outcome) => outcome,
                Err(MigrateError::Cancelled) => return Err(MigrateError::Cancelled),
                Err(e) => DataOutcome::Failed {
                    error: e.to_string(),
                },
            };
            if outcome.is_match() {
                debug!("{}: data {}", table.name, outcome);
            } else {
                warn!("{}: data {}", table.name, outcome);
            }
            Some(outcome)
        } else {
            None
        };

        Ok(TableValidation {
            table: table.name.clone(),
            schema,
            data,
        })
    }

    /// Compare the data of one table over the columns both sides share.
    pub async fn diff_data(
        &self,
        table: &Table,
        target_columns: &[TargetColumn],
    ) -> Result<DataOutcome> {
        let columns = common_columns(table, target_columns);
        if columns.is_empty() {
            return Ok(DataOutcome::Skipped {
                reason: "no common columns".to_string(),
            });
        }

        let source_count = self.source.row_count(&table.name).await?;
        let target_count = self.target.row_count(&table.name).await?;
        if source_count != target_count {
            return Ok(DataOutcome::RowCountMismatch {
                source: source_count,
                target: target_count,
            });
        }

        let opts = ReadOptions::all(&table.name, columns.clone());
        let mut source_rows = self.source.read_rows(&opts).await?;
        let mask = epoch_millis_mask(&columns, target_columns, &self.config.epoch_millis_columns);
        convert_epoch_millis(&mut source_rows, &mask);
        let target_rows = self.target.read_rows(&opts).await?;

        let rows = source_rows.len() as u64;
        let shapes = column_shapes(&columns, target_columns);
        let source_rows = normalize_rows(source_rows, &shapes);
        let target_rows = normalize_rows(target_rows, &shapes);

        let (differing, samples) = compare_sorted(
            &columns,
            &source_rows,
            &target_rows,
            self.config.max_row_diffs,
        );
        if differing == 0 {
            Ok(DataOutcome::Match { rows })
        } else {
            Ok(DataOutcome::RowsDiffer {
                rows,
                differing,
                samples,
            })
        }
    }
}
