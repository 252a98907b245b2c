//! Data transfer with a read-ahead pipeline.
//!
//! Each table is copied in batches over the intersection of source and target
//! columns. A reader future pages through the source while a writer future
//! inserts the previous batch, connected by a bounded channel so that reads
//! overlap writes without unbounded buffering.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::applier::CreateReport;
use crate::core::schema::{Table, TargetColumn};
use crate::core::traits::{ReadOptions, SchemaSource, TargetExecutor};
use crate::core::value::{Row, SqlValue};
use crate::error::{MigrateError, Result};

/// Number of batches read ahead of the writer.
const READ_AHEAD: usize = 2;

/// Transfer engine configuration.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Rows per batch.
    pub batch_size: usize,

    /// Integer columns holding epoch milliseconds, converted to DATETIME when
    /// the target column is temporal.
    pub epoch_millis_columns: Vec<String>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            epoch_millis_columns: Vec::new(),
        }
    }
}

/// Statistics for one table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransferStats {
    pub table: String,
    /// Rows written to the target.
    pub rows: u64,
    pub duration_ms: u64,
    /// Columns present on both sides.
    pub columns: Vec<String>,
    pub error: Option<String>,
}

/// Statistics for the whole transfer stage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransferReport {
    pub tables: Vec<TransferStats>,
    pub total_rows: u64,
}

impl TransferReport {
    pub fn failed(&self) -> impl Iterator<Item = &TransferStats> {
        self.tables.iter().filter(|t| t.error.is_some())
    }
}

/// Which of `columns` get the epoch-milliseconds conversion.
///
/// A column qualifies when it is configured (case-insensitive) and the target
/// stores it as DATETIME, TIMESTAMP or DATE.
pub fn epoch_millis_mask(
    columns: &[String],
    target_columns: &[TargetColumn],
    configured: &[String],
) -> Vec<bool> {
    columns
        .iter()
        .map(|name| {
            let is_configured = configured.iter().any(|c| c.eq_ignore_ascii_case(name));
            let is_temporal = target_columns
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(name))
                .map(|c| {
                    let ty = c.column_type.to_lowercase();
                    ty.starts_with("datetime") || ty.starts_with("timestamp") || ty == "date"
                })
                .unwrap_or(false);
            is_configured && is_temporal
        })
        .collect()
}

/// Apply the epoch-milliseconds conversion to masked cells.
pub fn convert_epoch_millis(rows: &mut [Row], mask: &[bool]) {
    if !mask.iter().any(|m| *m) {
        return;
    }
    for row in rows.iter_mut() {
        for (value, convert) in row.iter_mut().zip(mask) {
            if *convert {
                *value = std::mem::replace(value, SqlValue::Null).epoch_millis_to_datetime();
            }
        }
    }
}

/// Columns of `table` that also exist on the target, in source order.
pub fn common_columns(table: &Table, target_columns: &[TargetColumn]) -> Vec<String> {
    table
        .columns
        .iter()
        .filter(|c| {
            target_columns
                .iter()
                .any(|t| t.name.eq_ignore_ascii_case(&c.name))
        })
        .map(|c| c.name.clone())
        .collect()
}

/// Copies table data from source to target.
pub struct TransferEngine<'a> {
    source: &'a dyn SchemaSource,
    target: &'a dyn TargetExecutor,
    config: TransferConfig,
    cancel: CancellationToken,
    rows_transferred: Arc<AtomicI64>,
}

impl<'a> TransferEngine<'a> {
    pub fn new(
        source: &'a dyn SchemaSource,
        target: &'a dyn TargetExecutor,
        config: TransferConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            target,
            config,
            cancel,
            rows_transferred: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Share a progress counter with the caller.
    pub fn with_progress_counter(mut self, counter: Arc<AtomicI64>) -> Self {
        self.rows_transferred = counter;
        self
    }

    /// Rows written so far across all tables.
    pub fn rows_transferred(&self) -> i64 {
        self.rows_transferred.load(Ordering::Relaxed)
    }

    /// Copy every created table in dependency order.
    ///
    /// A failing table is recorded and the next one is processed; only
    /// cancellation returns an error.
    pub async fn transfer_all(
        &self,
        order: &[String],
        tables: &[Table],
        created: &CreateReport,
    ) -> Result<TransferReport> {
        info!("Transferring data for {} tables", created.created.len());
        let mut report = TransferReport::default();

        for name in order.iter().filter(|n| created.is_created(n)) {
            if self.cancel.is_cancelled() {
                return Err(MigrateError::Cancelled);
            }
            let Some(table) = tables.iter().find(|t| &t.name == name) else {
                continue;
            };

            let stats = match self.transfer_table(table).await {
                Ok(stats) => stats,
                Err(MigrateError::Cancelled) => return Err(MigrateError::Cancelled),
                Err(e) => {
                    let err = MigrateError::transfer(name, e);
                    error!("{}", err);
                    TransferStats {
                        table: name.clone(),
                        error: Some(err.to_string()),
                        ..Default::default()
                    }
                }
            };
            report.total_rows += stats.rows;
            report.tables.push(stats);
        }

        info!("Transferred {} rows", report.total_rows);
        Ok(report)
    }

    /// Copy one table.
    ///
    /// Batches are committed as they are written, so a write failure after
    /// the first batch is returned as stats carrying both the error and the
    /// rows already on the target. Only failures before any copying starts
    /// and cancellation are returned as `Err`.
    pub async fn transfer_table(&self, table: &Table) -> Result<TransferStats> {
        let start = Instant::now();
        let target_columns = self.target.describe_table(&table.name).await?;
        let columns = common_columns(table, &target_columns);
        if columns.is_empty() {
            warn!("{}: no columns in common with the target, skipping", table.name);
            return Ok(TransferStats {
                table: table.name.clone(),
                ..Default::default()
            });
        }

        let mask = epoch_millis_mask(&columns, &target_columns, &self.config.epoch_millis_columns);
        let batch_size = self.config.batch_size.max(1) as u64;
        let read_opts = ReadOptions::all(&table.name, columns.clone())
            .ordered_by(table.primary_key.clone());

        let (tx, mut rx) = mpsc::channel::<Result<Vec<Row>>>(READ_AHEAD);

        let source = self.source;
        let cancel = self.cancel.clone();
        let reader = async move {
            let mut offset = 0u64;
            loop {
                if cancel.is_cancelled() {
                    let _ = tx.send(Err(MigrateError::Cancelled)).await;
                    break;
                }
                let page = read_opts.clone().page(offset, batch_size);
                let result = source.read_rows(&page).await;
                let done = match &result {
                    Ok(rows) => (rows.len() as u64) < batch_size,
                    Err(_) => true,
                };
                if tx.send(result).await.is_err() || done {
                    break;
                }
                offset += batch_size;
            }
        };

        let target = self.target;
        let counter = self.rows_transferred.clone();
        let table_name = table.name.as_str();
        let write_columns = columns.as_slice();
        let writer = async move {
            let mut written = 0u64;
            while let Some(chunk) = rx.recv().await {
                let mut rows = match chunk {
                    Ok(rows) => rows,
                    Err(e) => return (written, Err(e)),
                };
                if rows.is_empty() {
                    continue;
                }
                convert_epoch_millis(&mut rows, &mask);
                let n = match target.write_batch(table_name, write_columns, rows).await {
                    Ok(n) => n,
                    Err(e) => return (written, Err(e)),
                };
                written += n;
                counter.fetch_add(n as i64, Ordering::Relaxed);
                debug!("{}: {} rows written", table_name, written);
            }
            (written, Ok(()))
        };

        let ((), (rows, outcome)) = futures::join!(reader, writer);
        let duration_ms = start.elapsed().as_millis() as u64;

        let error = match outcome {
            Ok(()) => {
                info!("{}: {} rows in {}ms", table.name, rows, duration_ms);
                None
            }
            Err(MigrateError::Cancelled) => return Err(MigrateError::Cancelled),
            Err(e) => {
                let err = MigrateError::transfer(&table.name, e);
                error!("{} after {} rows", err, rows);
                Some(err.to_string())
            }
        };
        Ok(TransferStats {
            table: table.name.clone(),
            rows,
            duration_ms,
            columns,
            error,
        })
    }
}
