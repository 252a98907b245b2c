//! Render parsed SQLite structures as MySQL DDL.

use crate::core::traits::Dialect;
use crate::drivers::mysql::{MysqlDialect, TABLE_OPTIONS};
use crate::typemap::sqlite_to_mysql;

use super::parser::{ColumnConstraint, ColumnDef, CreateTable, ForeignKeyDef, TableElement};
use super::tokenizer::{Token, TokenKind};

/// Words upper-cased when they appear in DEFAULT or CHECK expressions.
const EXPRESSION_KEYWORDS: &[&str] = &[
    "AND",
    "BETWEEN",
    "CASE",
    "CURRENT_DATE",
    "CURRENT_TIME",
    "CURRENT_TIMESTAMP",
    "ELSE",
    "END",
    "FALSE",
    "IN",
    "IS",
    "LIKE",
    "NOT",
    "NULL",
    "OR",
    "THEN",
    "TRUE",
    "WHEN",
];

/// Render the target `CREATE TABLE` statement. Foreign keys are left out.
pub fn render_create_table(def: &CreateTable) -> String {
    let dialect = MysqlDialect::new();
    let body: Vec<String> = def
        .elements
        .iter()
        .filter_map(|element| render_element(&dialect, element))
        .collect();

    format!(
        "CREATE TABLE {}{} ({}) {}",
        if def.if_not_exists { "IF NOT EXISTS " } else { "" },
        dialect.quote_ident(&def.name),
        body.join(", "),
        TABLE_OPTIONS
    )
}

fn render_element(dialect: &MysqlDialect, element: &TableElement) -> Option<String> {
    let rendered = match element {
        TableElement::Column(col) => render_column(dialect, col),
        TableElement::PrimaryKey { name, columns } => format!(
            "{}PRIMARY KEY ({})",
            constraint_prefix(dialect, name),
            quote_list(dialect, columns)
        ),
        TableElement::Unique { name, columns } => format!(
            "{}UNIQUE ({})",
            constraint_prefix(dialect, name),
            quote_list(dialect, columns)
        ),
        TableElement::Check { name, expr } => format!(
            "{}CHECK ({})",
            constraint_prefix(dialect, name),
            render_tokens(expr)
        ),
        TableElement::Raw(tokens) => render_tokens(tokens),
        TableElement::ForeignKey(_) | TableElement::ForeignKeyText(_) => return None,
    };
    Some(rendered)
}

fn render_column(dialect: &MysqlDialect, col: &ColumnDef) -> String {
    let mut out = format!(
        "{} {}",
        dialect.quote_ident(&col.name),
        sqlite_to_mysql(&col.type_name)
    );
    let constraints = render_column_constraints(&col.constraints);
    if !constraints.is_empty() {
        out.push(' ');
        out.push_str(&constraints);
    }
    out
}

/// Render a column's constraint fragments in source order, skipping inline
/// REFERENCES (extracted separately).
pub fn render_column_constraints(constraints: &[ColumnConstraint]) -> String {
    constraints
        .iter()
        .filter_map(|c| match c {
            ColumnConstraint::NotNull => Some("NOT NULL".to_string()),
            ColumnConstraint::Null => Some("NULL".to_string()),
            ColumnConstraint::PrimaryKey { autoincrement } => Some(if *autoincrement {
                "PRIMARY KEY AUTO_INCREMENT".to_string()
            } else {
                "PRIMARY KEY".to_string()
            }),
            ColumnConstraint::Unique => Some("UNIQUE".to_string()),
            ColumnConstraint::Default(tokens) => {
                Some(format!("DEFAULT {}", render_default(tokens)))
            }
            ColumnConstraint::Check(expr) => Some(format!("CHECK ({})", render_tokens(expr))),
            ColumnConstraint::Raw(tokens) => Some(render_tokens(tokens)),
            ColumnConstraint::References(_) => None,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render an extracted foreign key as clause text.
///
/// Only the actions present in the source are written.
pub fn render_foreign_key(fk: &ForeignKeyDef) -> String {
    let dialect = MysqlDialect::new();
    let mut out = format!(
        "{}FOREIGN KEY ({}) REFERENCES {}",
        constraint_prefix(&dialect, &fk.name),
        quote_list(&dialect, &fk.columns),
        dialect.quote_ident(&fk.ref_table)
    );
    if !fk.ref_columns.is_empty() {
        out.push_str(&format!(" ({})", quote_list(&dialect, &fk.ref_columns)));
    }
    if let Some(action) = fk.on_delete {
        out.push_str(&format!(" ON DELETE {}", action));
    }
    if let Some(action) = fk.on_update {
        out.push_str(&format!(" ON UPDATE {}", action));
    }
    out
}

fn constraint_prefix(dialect: &MysqlDialect, name: &Option<String>) -> String {
    match name {
        Some(name) => format!("CONSTRAINT {} ", dialect.quote_ident(name)),
        None => String::new(),
    }
}

fn quote_list(dialect: &MysqlDialect, names: &[String]) -> String {
    names
        .iter()
        .map(|n| dialect.quote_ident(n))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A DEFAULT value. A lone double-quoted token is a string in SQLite when
/// it names no column, which is always the case inside DEFAULT.
fn render_default(tokens: &[Token]) -> String {
    match tokens {
        [single] if single.kind == TokenKind::QuotedIdent('"') => mysql_string(&single.text),
        _ => render_tokens(tokens),
    }
}

/// Render tokens as MySQL text, keeping the original spacing.
pub fn render_tokens(tokens: &[Token]) -> String {
    let dialect = MysqlDialect::new();
    let mut out = String::new();
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 && token.space_before {
            out.push(' ');
        }
        match token.kind {
            TokenKind::Word => {
                if EXPRESSION_KEYWORDS.iter().any(|kw| token.is_keyword(kw)) {
                    out.push_str(&token.text.to_uppercase());
                } else {
                    out.push_str(&token.text);
                }
            }
            TokenKind::QuotedIdent(_) => out.push_str(&dialect.quote_ident(&token.text)),
            TokenKind::String => out.push_str(&mysql_string(&token.text)),
            TokenKind::Blob => {
                out.push_str("X'");
                out.push_str(&token.text);
                out.push('\'');
            }
            TokenKind::Number
            | TokenKind::LParen
            | TokenKind::RParen
            | TokenKind::Comma
            | TokenKind::Symbol => out.push_str(&token.text),
        }
    }
    out
}

/// MySQL string literal. Backslash is an escape character in MySQL but not
/// in SQLite, so it is doubled along with single quotes.
fn mysql_string(text: &str) -> String {
    format!("'{}'", text.replace('\\', "\\\\").replace('\'', "''"))
}
