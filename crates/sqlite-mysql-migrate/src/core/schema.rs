//! Schema and metadata types for tables, columns, indexes, and constraints.
//!
//! These types are derived once per run from the source schema and are
//! read-only afterwards.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Table metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    /// Table name.
    pub name: String,

    /// Raw `CREATE TABLE` text as stored by the source.
    pub raw_sql: String,

    /// Column definitions in declaration order.
    pub columns: Vec<Column>,

    /// Primary key column names (composite keys keep declaration order).
    pub primary_key: Vec<String>,

    /// Foreign key constraints.
    pub foreign_keys: Vec<ForeignKey>,

    /// User-created indexes.
    pub indexes: Vec<Index>,
}

impl Table {
    /// Create an empty table with the given name and source DDL.
    pub fn new(name: impl Into<String>, raw_sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw_sql: raw_sql.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Check if the table has a primary key.
    pub fn has_pk(&self) -> bool {
        !self.primary_key.is_empty()
    }

    /// Find a column by name (case-insensitive, as SQLite and MySQL both are).
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Check if any foreign key references this table itself.
    pub fn is_self_referencing(&self) -> bool {
        self.foreign_keys.iter().any(|fk| fk.is_self_reference())
    }
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Declared source type (e.g. "INTEGER", "varchar(255)"). May be empty.
    pub source_type: String,

    /// Resolved target type (e.g. "BIGINT").
    pub target_type: String,

    /// Whether the column allows NULL.
    pub is_nullable: bool,

    /// Constraint/default fragment carried through translation
    /// (e.g. "NOT NULL DEFAULT 0").
    pub constraints: String,

    /// Whether the column is part of the primary key.
    pub is_primary_key: bool,
}

/// Referential action for ON DELETE / ON UPDATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReferentialAction {
    #[default]
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
    NoAction,
}

impl ReferentialAction {
    /// Parse an action as written in DDL or reported by `PRAGMA foreign_key_list`.
    ///
    /// Accepts both "SET NULL" and "SET_NULL" spellings.
    pub fn parse(action: &str) -> Option<Self> {
        let normalized = action
            .trim()
            .to_uppercase()
            .replace('_', " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        match normalized.as_str() {
            "RESTRICT" => Some(ReferentialAction::Restrict),
            "CASCADE" => Some(ReferentialAction::Cascade),
            "SET NULL" => Some(ReferentialAction::SetNull),
            "SET DEFAULT" => Some(ReferentialAction::SetDefault),
            "NO ACTION" => Some(ReferentialAction::NoAction),
            _ => None,
        }
    }

    /// SQL keyword form.
    pub fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
            ReferentialAction::NoAction => "NO ACTION",
        }
    }
}

impl fmt::Display for ReferentialAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Foreign key metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name, when the source declared one.
    pub name: Option<String>,

    /// Owning (dependent) table.
    pub table: String,

    /// Local column names.
    pub columns: Vec<String>,

    /// Referenced table name.
    pub ref_table: String,

    /// Referenced column names.
    pub ref_columns: Vec<String>,

    /// ON DELETE action.
    pub on_delete: ReferentialAction,

    /// ON UPDATE action.
    pub on_update: ReferentialAction,
}

impl ForeignKey {
    /// Whether the key references its own table.
    pub fn is_self_reference(&self) -> bool {
        self.table.eq_ignore_ascii_case(&self.ref_table)
    }

    /// Short description used in logs and reports, e.g. `orders(user_id) -> users(id)`.
    pub fn describe(&self) -> String {
        format!(
            "{}({}) -> {}({})",
            self.table,
            self.columns.join(", "),
            self.ref_table,
            self.ref_columns.join(", ")
        )
    }
}

/// Index metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    /// Index name.
    pub name: String,

    /// Indexed column names.
    pub columns: Vec<String>,

    /// Whether the index is unique.
    pub is_unique: bool,
}

/// Column as reported by the target engine after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetColumn {
    /// Column name.
    pub name: String,

    /// Full column type (e.g. "bigint", "tinyint(1)", "varchar(255)").
    pub column_type: String,

    /// Whether the column allows NULL.
    pub is_nullable: bool,
}
