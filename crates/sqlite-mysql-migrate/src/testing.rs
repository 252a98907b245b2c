//! In-memory source and target used by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::schema::{Column, ForeignKey, Index, TargetColumn};
use crate::core::traits::{ReadOptions, SchemaSource, SourceTable, TargetExecutor};
use crate::core::value::{Row, SqlValue};
use crate::ddl::translate;
use crate::error::{MigrateError, Result};

fn project(columns: &[String], available: &[String], row: &Row) -> Row {
    columns
        .iter()
        .map(|c| {
            available
                .iter()
                .position(|a| a.eq_ignore_ascii_case(c))
                .and_then(|i| row.get(i).cloned())
                .unwrap_or(SqlValue::Null)
        })
        .collect()
}

fn page(rows: Vec<Row>, opts: &ReadOptions) -> Vec<Row> {
    let rows = rows.into_iter().skip(opts.offset as usize);
    match opts.limit {
        Some(limit) => rows.take(limit as usize).collect(),
        None => rows.collect(),
    }
}

pub fn target_column(name: &str, column_type: &str, is_nullable: bool) -> TargetColumn {
    TargetColumn {
        name: name.to_string(),
        column_type: column_type.to_string(),
        is_nullable,
    }
}

#[derive(Debug, Clone)]
struct MockTable {
    name: String,
    columns: Vec<TargetColumn>,
    rows: Vec<Row>,
}

impl MockTable {
    fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

#[derive(Debug, Default)]
struct TargetState {
    executed: Vec<String>,
    committed: Vec<String>,
    pending: Vec<String>,
    rollbacks: usize,
    reads: usize,
    batches_written: usize,
    tables: Vec<MockTable>,
}

impl TargetState {
    fn table(&self, name: &str) -> Result<&MockTable> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| MigrateError::Execution(format!("Table '{}' doesn't exist", name)))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut MockTable> {
        self.tables
            .iter_mut()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| MigrateError::Execution(format!("Table '{}' doesn't exist", name)))
    }
}

/// Split `s` on commas outside parentheses and quotes.
fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let (mut depth, mut quote, mut start) = (0i32, None, 0);
    for (i, c) in s.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '`' | '"') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth -= 1,
            (None, ',') if depth == 0 => {
                parts.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(s[start..].trim());
    parts
}

/// Columns of a rendered MySQL `CREATE TABLE`, with types lower-cased the way
/// INFORMATION_SCHEMA reports them.
fn columns_from_create(sql: &str) -> Vec<TargetColumn> {
    let (Some(open), Some(close)) = (sql.find('('), sql.rfind(')')) else {
        return Vec::new();
    };
    split_top_level(&sql[open + 1..close])
        .into_iter()
        .filter_map(|element| {
            let (name, rest) = quoted_after(element, "`")?;
            let rest = rest.trim_start();
            let mut depth = 0;
            let end = rest
                .char_indices()
                .find(|&(_, c)| {
                    match c {
                        '(' => depth += 1,
                        ')' => depth -= 1,
                        _ => {}
                    }
                    c == ' ' && depth == 0
                })
                .map(|(i, _)| i)
                .unwrap_or(rest.len());
            let upper = rest.to_uppercase();
            Some(target_column(
                name,
                &rest[..end].to_lowercase(),
                !(upper.contains("NOT NULL") || upper.contains("PRIMARY KEY")),
            ))
        })
        .collect()
}

/// Backtick-quoted name following `prefix`.
fn quoted_after<'s>(sql: &'s str, prefix: &str) -> Option<(&'s str, &'s str)> {
    let rest = sql.strip_prefix(prefix)?;
    let end = rest.find('`')?;
    Some((&rest[..end], &rest[end + 1..]))
}

/// Target that records statements and keeps tables in memory.
#[derive(Debug, Default)]
pub struct MockTarget {
    fail_patterns: Vec<String>,
    /// Table and number of batches accepted before inserts start failing.
    batch_limit: Option<(String, usize)>,
    state: Mutex<TargetState>,
}

impl MockTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every statement containing `pattern`.
    pub fn fail_on(mut self, pattern: &str) -> Self {
        self.fail_patterns.push(pattern.to_string());
        self
    }

    /// Accept `batches` inserts into `table`, then reject the rest.
    pub fn fail_after_batches(mut self, table: &str, batches: usize) -> Self {
        self.batch_limit = Some((table.to_string(), batches));
        self
    }

    /// Pre-create a table.
    pub fn with_table(self, name: &str, columns: Vec<TargetColumn>, rows: Vec<Row>) -> Self {
        self.state.lock().unwrap().tables.push(MockTable {
            name: name.to_string(),
            columns,
            rows,
        });
        self
    }

    /// Every statement passed to `execute`, including rejected ones.
    pub fn executed(&self) -> Vec<String> {
        self.state.lock().unwrap().executed.clone()
    }

    pub fn committed(&self) -> Vec<String> {
        self.state.lock().unwrap().committed.clone()
    }

    pub fn rollbacks(&self) -> usize {
        self.state.lock().unwrap().rollbacks
    }

    /// Number of `read_rows` calls.
    pub fn reads(&self) -> usize {
        self.state.lock().unwrap().reads
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.state
            .lock()
            .unwrap()
            .table(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    pub fn column_type(&self, table: &str, column: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        let table = state.table(table).ok()?;
        table
            .columns
            .iter()
            .find(|c| c.name == column)
            .map(|c| c.column_type.clone())
    }

    fn apply(state: &mut TargetState, sql: &str) {
        if let Some((name, _)) = quoted_after(sql, "CREATE TABLE `") {
            if state.table(name).is_err() {
                state.tables.push(MockTable {
                    name: name.to_string(),
                    columns: columns_from_create(sql),
                    rows: Vec::new(),
                });
            }
        } else if let Some((table, rest)) = quoted_after(sql, "ALTER TABLE `") {
            let Some((column, column_type)) = quoted_after(rest, " MODIFY COLUMN `") else {
                return;
            };
            let column_type = column_type.trim();
            let (column_type, is_nullable) = match column_type.strip_suffix(" NOT NULL") {
                Some(t) => (t, false),
                None => (column_type, true),
            };
            if let Ok(t) = state.table_mut(table) {
                if let Some(c) = t.columns.iter_mut().find(|c| c.name == column) {
                    c.column_type = column_type.to_string();
                    c.is_nullable = is_nullable;
                }
            }
        }
    }
}

#[async_trait]
impl TargetExecutor for MockTarget {
    async fn execute(&self, sql: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.executed.push(sql.to_string());
        if self.fail_patterns.iter().any(|p| sql.contains(p)) {
            return Err(MigrateError::Execution(format!("rejected: {}", sql)));
        }
        state.pending.push(sql.to_string());
        Self::apply(&mut state, sql);
        Ok(())
    }

    async fn begin(&self) -> Result<()> {
        self.state.lock().unwrap().pending.clear();
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let pending = std::mem::take(&mut state.pending);
        state.committed.extend(pending);
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.pending.clear();
        state.rollbacks += 1;
        Ok(())
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<TargetColumn>> {
        Ok(self.state.lock().unwrap().table(table)?.columns.clone())
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .tables
            .iter()
            .map(|t| t.name.clone())
            .collect())
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        Ok(self.state.lock().unwrap().table(table)?.rows.len() as i64)
    }

    async fn read_rows(&self, opts: &ReadOptions) -> Result<Vec<Row>> {
        let mut state = self.state.lock().unwrap();
        state.reads += 1;
        let table = state.table(&opts.table)?;
        let available = table.column_names();
        let rows = table
            .rows
            .iter()
            .map(|r| project(&opts.columns, &available, r))
            .collect();
        Ok(page(rows, opts))
    }

    async fn write_batch(&self, table: &str, columns: &[String], rows: Vec<Row>) -> Result<u64> {
        if self.fail_patterns.iter().any(|p| p == table) {
            return Err(MigrateError::Execution(format!("insert into {} rejected", table)));
        }
        let mut state = self.state.lock().unwrap();
        if let Some((limited, batches)) = &self.batch_limit {
            if limited == table {
                if state.batches_written >= *batches {
                    return Err(MigrateError::Execution(format!("insert into {} rejected", table)));
                }
                state.batches_written += 1;
            }
        }
        let t = state.table_mut(table)?;
        let target_columns = t.column_names();
        let count = rows.len() as u64;
        t.rows
            .extend(rows.iter().map(|r| project(&target_columns, columns, r)));
        Ok(count)
    }

    fn db_type(&self) -> &str {
        "mock"
    }

    async fn close(&self) {}
}

#[derive(Debug, Clone)]
struct MockSourceTable {
    sql: String,
    name: String,
    columns: Vec<Column>,
    foreign_keys: Vec<ForeignKey>,
    indexes: Vec<Index>,
    rows: Vec<Row>,
}

/// Source whose schema comes from literal `CREATE TABLE` statements.
#[derive(Debug, Default)]
pub struct MockSource {
    tables: Vec<MockSourceTable>,
    reads: AtomicUsize,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table; columns and foreign keys are taken from the statement.
    pub fn with_table(mut self, sql: &str, rows: Vec<Row>) -> Self {
        let translated = translate(sql).unwrap();
        self.tables.push(MockSourceTable {
            sql: sql.to_string(),
            name: translated.table.name.clone(),
            columns: translated.table.columns.clone(),
            foreign_keys: translated.table.foreign_keys.clone(),
            indexes: Vec::new(),
            rows,
        });
        self
    }

    /// Add a table without interpreting its statement.
    pub fn with_raw_table(mut self, name: &str, sql: &str) -> Self {
        self.tables.push(MockSourceTable {
            sql: sql.to_string(),
            name: name.to_string(),
            columns: Vec::new(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
            rows: Vec::new(),
        });
        self
    }

    pub fn with_index(mut self, table: &str, index: Index) -> Self {
        if let Some(t) = self.tables.iter_mut().find(|t| t.name == table) {
            t.indexes.push(index);
        }
        self
    }

    /// Number of `read_rows` calls.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn table(&self, name: &str) -> Result<&MockSourceTable> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| MigrateError::Execution(format!("no such table: {}", name)))
    }
}

#[async_trait]
impl SchemaSource for MockSource {
    async fn list_tables(&self) -> Result<Vec<SourceTable>> {
        Ok(self
            .tables
            .iter()
            .map(|t| SourceTable::new(&t.name, &t.sql))
            .collect())
    }

    async fn list_foreign_keys(&self, table: &str) -> Result<Vec<ForeignKey>> {
        Ok(self.table(table)?.foreign_keys.clone())
    }

    async fn list_indexes(&self, table: &str) -> Result<Vec<Index>> {
        Ok(self.table(table)?.indexes.clone())
    }

    async fn describe_columns(&self, table: &str) -> Result<Vec<Column>> {
        Ok(self.table(table)?.columns.clone())
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        Ok(self.table(table)?.rows.len() as i64)
    }

    async fn read_rows(&self, opts: &ReadOptions) -> Result<Vec<Row>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let table = self.table(&opts.table)?;
        let available: Vec<String> = table.columns.iter().map(|c| c.name.clone()).collect();
        let rows = table
            .rows
            .iter()
            .map(|r| project(&opts.columns, &available, r))
            .collect();
        Ok(page(rows, opts))
    }

    fn db_type(&self) -> &str {
        "mock"
    }

    async fn close(&self) {}
}
