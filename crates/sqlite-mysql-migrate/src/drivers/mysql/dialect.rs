//! MySQL/MariaDB SQL dialect (Strategy pattern).
//!
//! Identifier quoting, query building and the DDL statements issued after
//! table creation (foreign keys, column type changes, indexes).

use crate::core::schema::{ForeignKey, Index};
use crate::core::traits::{Dialect, ReadOptions};

/// Table options appended to every generated `CREATE TABLE`.
pub const TABLE_OPTIONS: &str = "ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci";

/// Largest row count MySQL accepts in LIMIT, used for OFFSET without LIMIT.
const MAX_LIMIT: u64 = u64::MAX;

/// MySQL/MariaDB dialect implementation.
///
/// Compatible with MySQL 5.7+, 8.0+, and MariaDB 10.2+.
#[derive(Debug, Clone, Default)]
pub struct MysqlDialect;

impl MysqlDialect {
    /// Create a new MySQL dialect instance.
    pub fn new() -> Self {
        Self
    }

    fn quote_list(&self, names: &[String]) -> String {
        names
            .iter()
            .map(|n| self.quote_ident(n))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Multi-row INSERT with `?` placeholders.
    pub fn build_insert(&self, table: &str, columns: &[String], row_count: usize) -> String {
        let row = format!("({})", vec!["?"; columns.len()].join(", "));
        format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.quote_ident(table),
            self.quote_list(columns),
            vec![row; row_count].join(", ")
        )
    }

    /// `ALTER TABLE ... ADD [CONSTRAINT name] FOREIGN KEY ...` with both
    /// actions spelled out.
    pub fn build_add_foreign_key(&self, fk: &ForeignKey) -> String {
        let constraint = match &fk.name {
            Some(name) => format!("CONSTRAINT {} ", self.quote_ident(name)),
            None => String::new(),
        };
        format!(
            "ALTER TABLE {} ADD {}FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
            self.quote_ident(&fk.table),
            constraint,
            self.quote_list(&fk.columns),
            self.quote_ident(&fk.ref_table),
            self.quote_list(&fk.ref_columns),
            fk.on_delete,
            fk.on_update
        )
    }

    /// `ALTER TABLE ... MODIFY COLUMN` to a new type, keeping nullability.
    pub fn build_modify_column(
        &self,
        table: &str,
        column: &str,
        column_type: &str,
        is_nullable: bool,
    ) -> String {
        let mut sql = format!(
            "ALTER TABLE {} MODIFY COLUMN {} {}",
            self.quote_ident(table),
            self.quote_ident(column),
            column_type
        );
        if !is_nullable {
            sql.push_str(" NOT NULL");
        }
        sql
    }

    /// `CREATE [UNIQUE] INDEX`.
    pub fn build_create_index(&self, table: &str, idx: &Index) -> String {
        format!(
            "CREATE {}INDEX {} ON {} ({})",
            if idx.is_unique { "UNIQUE " } else { "" },
            self.quote_ident(&idx.name),
            self.quote_ident(table),
            self.quote_list(&idx.columns)
        )
    }
}

impl Dialect for MysqlDialect {
    fn name(&self) -> &str {
        "mysql"
    }

    fn quote_ident(&self, name: &str) -> String {
        // Embedded backticks are doubled
        format!("`{}`", name.replace('`', "``"))
    }

    fn build_select_query(&self, opts: &ReadOptions) -> String {
        let cols = if opts.columns.is_empty() {
            "*".to_string()
        } else {
            self.quote_list(&opts.columns)
        };

        let mut sql = format!("SELECT {} FROM {}", cols, self.quote_ident(&opts.table));

        if !opts.order_by.is_empty() {
            sql.push_str(&format!(" ORDER BY {}", self.quote_list(&opts.order_by)));
        }

        match (opts.limit, opts.offset) {
            (Some(limit), 0) => sql.push_str(&format!(" LIMIT {}", limit)),
            (Some(limit), offset) => {
                sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset))
            }
            (None, 0) => {}
            (None, offset) => sql.push_str(&format!(" LIMIT {} OFFSET {}", MAX_LIMIT, offset)),
        }

        sql
    }

    fn param_placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }
}
