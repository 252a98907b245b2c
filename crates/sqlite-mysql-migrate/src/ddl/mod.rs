//! SQLite to MySQL DDL translation.
//!
//! [`translate`] turns one SQLite `CREATE TABLE` statement into a MySQL
//! statement without foreign keys, plus the extracted foreign-key clauses that
//! are applied once every table exists. Translation is pure: it executes
//! nothing and can be tested on literal statements.

mod parser;
mod render;
mod tokenizer;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::schema::{Column, ForeignKey, Table};
use crate::error::{MigrateError, Result};
use crate::typemap::sqlite_to_mysql;

use parser::{parse_create_table, parse_foreign_key_clause, TableElement};

pub use parser::ParseWarning;
use render::{render_column_constraints, render_create_table, render_foreign_key, render_tokens};

/// A foreign-key clause extracted from a table body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyClause {
    /// Owning table.
    pub table: String,
    /// Clause text in MySQL quoting, e.g.
    /// ``CONSTRAINT `fk` FOREIGN KEY (`a`) REFERENCES `t` (`id`)``.
    pub text: String,
}

impl ForeignKeyClause {
    pub fn new(table: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            text: text.into(),
        }
    }

    /// Decompose the clause into constraint metadata.
    ///
    /// Fails when the clause cannot be parsed, when REFERENCES has no column
    /// list, or when the local and referenced column counts differ.
    pub fn parse(&self) -> Result<ForeignKey> {
        let def = parse_foreign_key_clause(&self.text)?;
        if def.ref_columns.is_empty() {
            return Err(MigrateError::parse(
                &self.text,
                "REFERENCES has no column list",
            ));
        }
        if def.ref_columns.len() != def.columns.len() {
            return Err(MigrateError::parse(
                &self.text,
                format!(
                    "{} local column(s) but {} referenced column(s)",
                    def.columns.len(),
                    def.ref_columns.len()
                ),
            ));
        }
        Ok(def.to_foreign_key(&self.table))
    }

    /// Name the referenced columns of a clause that omits them.
    ///
    /// `REFERENCES t` without a column list refers to the primary key of
    /// `t`; `primary_key` looks that key up by table name. Returns `None`
    /// when the clause already lists its columns, does not parse, or the
    /// referenced table has no known primary key.
    pub fn with_default_ref_columns(
        &self,
        primary_key: impl Fn(&str) -> Option<Vec<String>>,
    ) -> Option<ForeignKeyClause> {
        let mut def = parse_foreign_key_clause(&self.text).ok()?;
        if !def.ref_columns.is_empty() {
            return None;
        }
        def.ref_columns = primary_key(&def.ref_table).filter(|pk| !pk.is_empty())?;
        Some(ForeignKeyClause::new(&self.table, render_foreign_key(&def)))
    }
}

/// Result of translating one table.
#[derive(Debug, Clone)]
pub struct TranslatedTable {
    /// Structured table: columns, primary key, parsed foreign keys.
    pub table: Table,
    /// MySQL `CREATE TABLE` statement without foreign keys.
    pub create_sql: String,
    /// Extracted foreign-key clauses, in source order.
    pub foreign_keys: Vec<ForeignKeyClause>,
    /// Fragments that were passed through without being understood.
    pub warnings: Vec<ParseWarning>,
}

/// Translate a SQLite `CREATE TABLE` statement.
///
/// Only a statement that is not a `CREATE TABLE` with a column list is an
/// error; fragments inside the body never fail the translation.
pub fn translate(source_sql: &str) -> Result<TranslatedTable> {
    let def = parse_create_table(source_sql)?;

    for fragment in &def.dropped {
        debug!("{}: dropped {:?} (no MySQL equivalent)", def.name, fragment);
    }
    for warning in &def.warnings {
        warn!("{}: {}", def.name, warning);
    }

    let create_sql = render_create_table(&def);

    let mut table = Table::new(&def.name, source_sql);
    let mut clauses = Vec::new();

    for element in &def.elements {
        match element {
            TableElement::Column(col) => {
                let is_primary_key = col.is_primary_key();
                if is_primary_key {
                    table.primary_key.push(col.name.clone());
                }
                table.columns.push(Column {
                    name: col.name.clone(),
                    source_type: col.type_name.clone(),
                    target_type: sqlite_to_mysql(&col.type_name),
                    is_nullable: !(col.is_not_null() || is_primary_key),
                    constraints: render_column_constraints(&col.constraints),
                    is_primary_key,
                });
                for constraint in &col.constraints {
                    if let parser::ColumnConstraint::References(fk) = constraint {
                        clauses.push(ForeignKeyClause::new(&def.name, render_foreign_key(fk)));
                        table.foreign_keys.push(fk.to_foreign_key(&def.name));
                    }
                }
            }
            TableElement::PrimaryKey { columns, .. } => {
                table.primary_key = columns.clone();
            }
            TableElement::ForeignKey(fk) => {
                clauses.push(ForeignKeyClause::new(&def.name, render_foreign_key(fk)));
                table.foreign_keys.push(fk.to_foreign_key(&def.name));
            }
            TableElement::ForeignKeyText(tokens) => {
                clauses.push(ForeignKeyClause::new(&def.name, render_tokens(tokens)));
            }
            TableElement::Unique { .. } | TableElement::Check { .. } | TableElement::Raw(_) => {}
        }
    }

    // Table-level PRIMARY KEY marks its columns after the fact.
    for column in &mut table.columns {
        if table
            .primary_key
            .iter()
            .any(|pk| pk.eq_ignore_ascii_case(&column.name))
        {
            column.is_primary_key = true;
            column.is_nullable = false;
        }
    }

    Ok(TranslatedTable {
        table,
        create_sql,
        foreign_keys: clauses,
        warnings: def.warnings,
    })
}
