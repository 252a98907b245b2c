//! Structural parser for SQLite `CREATE TABLE` statements.
//!
//! The body is split on top-level commas and each element is decomposed into
//! a column definition or a table constraint. Fragments the grammar does not
//! understand are kept as raw tokens and reported as warnings.

use std::fmt;

use serde::Serialize;

use crate::core::schema::{ForeignKey, ReferentialAction};
use crate::error::{MigrateError, Result};

use super::tokenizer::{tokenize, Token, TokenKind};

/// Words that end a column's type name and start a column constraint.
const COLUMN_CONSTRAINT_STARTS: &[&str] = &[
    "CONSTRAINT",
    "NOT",
    "NULL",
    "PRIMARY",
    "UNIQUE",
    "CHECK",
    "DEFAULT",
    "COLLATE",
    "REFERENCES",
    "GENERATED",
    "AS",
];

/// A fragment that was passed through without being understood.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseWarning {
    pub fragment: String,
    pub message: String,
}

impl From<MigrateError> for ParseWarning {
    fn from(err: MigrateError) -> Self {
        match err {
            MigrateError::Parse { fragment, message } => Self { fragment, message },
            other => Self {
                fragment: String::new(),
                message: other.to_string(),
            },
        }
    }
}

impl From<ParseWarning> for MigrateError {
    fn from(w: ParseWarning) -> Self {
        MigrateError::parse(w.fragment, w.message)
    }
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Could not parse {:?}: {}", self.fragment, self.message)
    }
}

/// A parsed `CREATE TABLE` statement.
#[derive(Debug, Clone)]
pub struct CreateTable {
    pub name: String,
    pub if_not_exists: bool,
    pub elements: Vec<TableElement>,
    /// Fragments with no MySQL meaning that were discarded.
    pub dropped: Vec<String>,
    /// Fragments passed through without being understood.
    pub warnings: Vec<ParseWarning>,
}

/// One comma-separated element of the table body.
#[derive(Debug, Clone)]
pub enum TableElement {
    Column(ColumnDef),
    PrimaryKey {
        name: Option<String>,
        columns: Vec<String>,
    },
    Unique {
        name: Option<String>,
        columns: Vec<String>,
    },
    Check {
        name: Option<String>,
        expr: Vec<Token>,
    },
    ForeignKey(ForeignKeyDef),
    /// A FOREIGN KEY element that could not be decomposed; kept verbatim so
    /// that it is still extracted from the body and reported later.
    ForeignKeyText(Vec<Token>),
    /// Unrecognised element, passed through.
    Raw(Vec<Token>),
}

/// A column definition.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: String,
    /// Declared type as written (may be empty).
    pub type_name: String,
    pub constraints: Vec<ColumnConstraint>,
}

impl ColumnDef {
    pub fn is_primary_key(&self) -> bool {
        self.constraints
            .iter()
            .any(|c| matches!(c, ColumnConstraint::PrimaryKey { .. }))
    }

    pub fn is_not_null(&self) -> bool {
        self.constraints
            .iter()
            .any(|c| matches!(c, ColumnConstraint::NotNull))
    }
}

/// A column-level constraint, in source order.
#[derive(Debug, Clone)]
pub enum ColumnConstraint {
    NotNull,
    Null,
    PrimaryKey { autoincrement: bool },
    Unique,
    /// DEFAULT followed by a literal, signed number or parenthesised expression.
    Default(Vec<Token>),
    /// CHECK expression without the surrounding parentheses.
    Check(Vec<Token>),
    References(ForeignKeyDef),
    Raw(Vec<Token>),
}

/// A decomposed foreign key, inline or table-level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyDef {
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub ref_table: String,
    pub ref_columns: Vec<String>,
    pub on_delete: Option<ReferentialAction>,
    pub on_update: Option<ReferentialAction>,
}

impl ForeignKeyDef {
    /// Convert into schema metadata owned by `table`; unspecified actions
    /// default to RESTRICT.
    pub fn to_foreign_key(&self, table: &str) -> ForeignKey {
        ForeignKey {
            name: self.name.clone(),
            table: table.to_string(),
            columns: self.columns.clone(),
            ref_table: self.ref_table.clone(),
            ref_columns: self.ref_columns.clone(),
            on_delete: self.on_delete.unwrap_or_default(),
            on_update: self.on_update.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Default)]
struct Diagnostics {
    dropped: Vec<String>,
    warnings: Vec<ParseWarning>,
}

struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&'a Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn is_done(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn rest(&self) -> &'a [Token] {
        &self.tokens[self.pos.min(self.tokens.len())..]
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        self.peek().is_some_and(|t| t.is_keyword(keyword))
    }

    fn at_kind(&self, kind: TokenKind) -> bool {
        self.peek().is_some_and(|t| t.kind == kind)
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consume a keyword sequence only if all of it is present.
    fn eat_keywords(&mut self, keywords: &[&str]) -> bool {
        let matches = keywords
            .iter()
            .enumerate()
            .all(|(i, kw)| self.peek_at(i).is_some_and(|t| t.is_keyword(kw)));
        if matches {
            self.pos += keywords.len();
        }
        matches
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(format!("expected {}", keyword)))
        }
    }

    fn expect_name(&mut self) -> Result<String> {
        match self.peek() {
            Some(t) if t.is_name() => {
                self.pos += 1;
                Ok(t.text.clone())
            }
            _ => Err(self.error("expected a name")),
        }
    }

    /// Consume a parenthesised group and return the tokens inside it.
    fn group(&mut self) -> Result<&'a [Token]> {
        if !self.at_kind(TokenKind::LParen) {
            return Err(self.error("expected '('"));
        }
        let start = self.pos + 1;
        let mut depth = 0usize;
        while let Some(token) = self.advance() {
            match token.kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(&self.tokens[start..self.pos - 1]);
                    }
                }
                _ => {}
            }
        }
        Err(MigrateError::parse(
            display_tokens(&self.tokens[start - 1..]),
            "unbalanced parentheses",
        ))
    }

    fn error(&self, message: impl Into<String>) -> MigrateError {
        let fragment = if self.is_done() {
            display_tokens(self.tokens)
        } else {
            display_tokens(self.rest())
        };
        MigrateError::parse(fragment, message)
    }
}

/// Plain-text rendering of tokens for diagnostics.
pub fn display_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 && token.space_before {
            out.push(' ');
        }
        match token.kind {
            TokenKind::String => {
                out.push('\'');
                out.push_str(&token.text.replace('\'', "''"));
                out.push('\'');
            }
            TokenKind::QuotedIdent(_) => {
                out.push('"');
                out.push_str(&token.text);
                out.push('"');
            }
            _ => out.push_str(&token.text),
        }
    }
    out
}

/// Split tokens on commas at parenthesis depth zero.
fn split_top_level(tokens: &[Token]) -> Vec<&[Token]> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => depth -= 1,
            TokenKind::Comma if depth == 0 => {
                parts.push(&tokens[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&tokens[start..]);
    parts
}

/// Parse a full `CREATE TABLE` statement.
pub fn parse_create_table(sql: &str) -> Result<CreateTable> {
    let tokens = tokenize(sql)?;
    let mut cur = Cursor::new(&tokens);

    cur.expect_keyword("CREATE")?;
    let _ = cur.eat_keyword("TEMP") || cur.eat_keyword("TEMPORARY");
    cur.expect_keyword("TABLE")?;
    let if_not_exists = cur.eat_keywords(&["IF", "NOT", "EXISTS"]);

    let mut name = cur.expect_name()?;
    if cur.peek().is_some_and(|t| t.kind == TokenKind::Symbol && t.text == ".") {
        cur.advance();
        name = cur.expect_name()?;
    }

    if cur.at_keyword("AS") {
        return Err(MigrateError::parse(sql, "CREATE TABLE ... AS SELECT has no column list"));
    }

    let body = cur.group()?;
    let mut diag = Diagnostics::default();

    let options = cur.rest();
    if !options.is_empty() {
        diag.dropped.push(display_tokens(options));
    }

    let mut elements = Vec::new();
    for part in split_top_level(body) {
        if part.is_empty() {
            continue;
        }
        elements.push(parse_element(part, &mut diag));
    }

    if !elements
        .iter()
        .any(|e| matches!(e, TableElement::Column(_)))
    {
        return Err(MigrateError::parse(sql, "table defines no columns"));
    }

    Ok(CreateTable {
        name,
        if_not_exists,
        elements,
        dropped: diag.dropped,
        warnings: diag.warnings,
    })
}

fn is_foreign_key_element(tokens: &[Token]) -> bool {
    let mut cur = Cursor::new(tokens);
    if cur.eat_keyword("CONSTRAINT") && cur.expect_name().is_err() {
        return false;
    }
    cur.eat_keywords(&["FOREIGN", "KEY"])
}

fn parse_element(tokens: &[Token], diag: &mut Diagnostics) -> TableElement {
    let is_fk = is_foreign_key_element(tokens);
    match parse_table_element(tokens, diag) {
        Ok(element) => element,
        Err(e) => {
            diag.warnings.push(e.into());
            if is_fk {
                TableElement::ForeignKeyText(tokens.to_vec())
            } else {
                TableElement::Raw(tokens.to_vec())
            }
        }
    }
}

fn parse_table_element(tokens: &[Token], diag: &mut Diagnostics) -> Result<TableElement> {
    let mut cur = Cursor::new(tokens);

    let mut name = None;
    if cur.eat_keyword("CONSTRAINT") {
        name = Some(cur.expect_name()?);
    }

    let next_is_group = cur.peek_at(1).is_some_and(|t| t.kind == TokenKind::LParen);

    let element = if cur.eat_keywords(&["PRIMARY", "KEY"]) {
        let columns = parse_name_list(cur.group()?, diag)?;
        skip_conflict_clause(&mut cur, diag)?;
        TableElement::PrimaryKey { name, columns }
    } else if cur.at_keyword("UNIQUE") && next_is_group {
        cur.advance();
        let columns = parse_name_list(cur.group()?, diag)?;
        skip_conflict_clause(&mut cur, diag)?;
        TableElement::Unique { name, columns }
    } else if cur.at_keyword("CHECK") && next_is_group {
        cur.advance();
        let expr = cur.group()?.to_vec();
        TableElement::Check { name, expr }
    } else if cur.eat_keywords(&["FOREIGN", "KEY"]) {
        let columns = parse_name_list(cur.group()?, diag)?;
        TableElement::ForeignKey(parse_references(&mut cur, name, columns, diag)?)
    } else if name.is_some() {
        return Err(cur.error("unsupported table constraint"));
    } else {
        TableElement::Column(parse_column(&mut cur, diag)?)
    };

    if !cur.is_done() {
        return Err(cur.error("unexpected trailing tokens"));
    }
    Ok(element)
}

fn parse_column(cur: &mut Cursor<'_>, diag: &mut Diagnostics) -> Result<ColumnDef> {
    let name = cur.expect_name()?;
    let type_name = parse_type_name(cur)?;

    let mut constraints = Vec::new();
    let mut pending_name: Option<String> = None;

    while !cur.is_done() {
        if cur.eat_keyword("CONSTRAINT") {
            if let Some(unused) = pending_name.take() {
                diag.dropped.push(format!("CONSTRAINT {}", unused));
            }
            pending_name = Some(cur.expect_name()?);
            continue;
        }

        let start = cur.pos;
        match parse_column_constraint(cur, &name, pending_name.clone(), diag) {
            Ok(Some(constraint)) => {
                if matches!(constraint, ColumnConstraint::References(_)) {
                    pending_name = None;
                }
                constraints.push(constraint);
            }
            Ok(None) => {}
            Err(_) => {
                cur.pos = start;
                let raw = take_raw_fragment(cur);
                diag.warnings.push(ParseWarning {
                    fragment: display_tokens(&raw),
                    message: format!("unrecognised fragment on column {}, passed through", name),
                });
                constraints.push(ColumnConstraint::Raw(raw));
            }
        }
    }

    if let Some(unused) = pending_name {
        diag.dropped.push(format!("CONSTRAINT {}", unused));
    }

    Ok(ColumnDef {
        name,
        type_name,
        constraints,
    })
}

fn parse_type_name(cur: &mut Cursor<'_>) -> Result<String> {
    let mut words = Vec::new();
    while let Some(token) = cur.peek() {
        let is_type_word = token.kind == TokenKind::Word
            && !COLUMN_CONSTRAINT_STARTS
                .iter()
                .any(|kw| token.is_keyword(kw));
        if !is_type_word {
            break;
        }
        words.push(token.text.clone());
        cur.advance();
    }

    let mut type_name = words.join(" ");
    if !words.is_empty() && cur.at_kind(TokenKind::LParen) {
        let args: String = cur.group()?.iter().map(|t| t.text.as_str()).collect();
        type_name.push('(');
        type_name.push_str(&args);
        type_name.push(')');
    }
    Ok(type_name)
}

/// Parse one column constraint. `Ok(None)` means the fragment was recognised
/// and intentionally dropped.
fn parse_column_constraint(
    cur: &mut Cursor<'_>,
    column: &str,
    name: Option<String>,
    diag: &mut Diagnostics,
) -> Result<Option<ColumnConstraint>> {
    if cur.eat_keyword("NOT") {
        cur.expect_keyword("NULL")?;
        skip_conflict_clause(cur, diag)?;
        return Ok(Some(ColumnConstraint::NotNull));
    }
    if cur.eat_keyword("NULL") {
        skip_conflict_clause(cur, diag)?;
        return Ok(Some(ColumnConstraint::Null));
    }
    if cur.eat_keyword("PRIMARY") {
        cur.expect_keyword("KEY")?;
        for order in ["ASC", "DESC"] {
            if cur.eat_keyword(order) {
                diag.dropped.push(format!("PRIMARY KEY {}", order));
            }
        }
        skip_conflict_clause(cur, diag)?;
        let autoincrement = cur.eat_keyword("AUTOINCREMENT");
        return Ok(Some(ColumnConstraint::PrimaryKey { autoincrement }));
    }
    if cur.eat_keyword("UNIQUE") {
        skip_conflict_clause(cur, diag)?;
        return Ok(Some(ColumnConstraint::Unique));
    }
    if cur.eat_keyword("CHECK") {
        let expr = cur.group()?.to_vec();
        return Ok(Some(ColumnConstraint::Check(expr)));
    }
    if cur.eat_keyword("DEFAULT") {
        return Ok(Some(ColumnConstraint::Default(parse_default_value(cur)?)));
    }
    if cur.eat_keyword("COLLATE") {
        let collation = cur.expect_name()?;
        diag.dropped.push(format!("COLLATE {}", collation));
        return Ok(None);
    }
    if cur.at_keyword("REFERENCES") {
        let fk = parse_references(cur, name, vec![column.to_string()], diag)?;
        return Ok(Some(ColumnConstraint::References(fk)));
    }
    Err(cur.error("unrecognised column constraint"))
}

fn parse_default_value(cur: &mut Cursor<'_>) -> Result<Vec<Token>> {
    let start = cur.pos;
    match cur.peek() {
        Some(t) if t.kind == TokenKind::LParen => {
            cur.group()?;
        }
        Some(t) if t.kind == TokenKind::Symbol && (t.text == "-" || t.text == "+") => {
            cur.advance();
            if !cur.at_kind(TokenKind::Number) {
                return Err(cur.error("expected a number after sign"));
            }
            cur.advance();
        }
        Some(t)
            if matches!(
                t.kind,
                TokenKind::String
                    | TokenKind::Number
                    | TokenKind::Blob
                    | TokenKind::Word
                    | TokenKind::QuotedIdent(_)
            ) =>
        {
            cur.advance();
        }
        _ => return Err(cur.error("expected a default value")),
    }
    Ok(cur.tokens[start..cur.pos].to_vec())
}

/// Parse `REFERENCES table [(cols)]` plus its trailing actions.
fn parse_references(
    cur: &mut Cursor<'_>,
    name: Option<String>,
    columns: Vec<String>,
    diag: &mut Diagnostics,
) -> Result<ForeignKeyDef> {
    cur.expect_keyword("REFERENCES")?;
    let ref_table = cur.expect_name()?;
    let ref_columns = if cur.at_kind(TokenKind::LParen) {
        parse_name_list(cur.group()?, diag)?
    } else {
        Vec::new()
    };

    let mut on_delete = None;
    let mut on_update = None;
    loop {
        if cur.eat_keywords(&["ON", "DELETE"]) {
            on_delete = Some(parse_action(cur)?);
        } else if cur.eat_keywords(&["ON", "UPDATE"]) {
            on_update = Some(parse_action(cur)?);
        } else if cur.eat_keyword("MATCH") {
            let kind = cur.expect_name()?;
            diag.dropped.push(format!("MATCH {}", kind));
        } else if cur.eat_keyword("DEFERRABLE") || cur.eat_keywords(&["NOT", "DEFERRABLE"]) {
            let _ = cur.eat_keywords(&["INITIALLY", "DEFERRED"])
                || cur.eat_keywords(&["INITIALLY", "IMMEDIATE"]);
            diag.dropped.push("DEFERRABLE".to_string());
        } else {
            break;
        }
    }

    Ok(ForeignKeyDef {
        name,
        columns,
        ref_table,
        ref_columns,
        on_delete,
        on_update,
    })
}

fn parse_action(cur: &mut Cursor<'_>) -> Result<ReferentialAction> {
    let first = cur.expect_name()?;
    let words = if first.eq_ignore_ascii_case("SET") || first.eq_ignore_ascii_case("NO") {
        format!("{} {}", first, cur.expect_name()?)
    } else {
        first
    };
    ReferentialAction::parse(&words).ok_or_else(|| cur.error(format!("unknown action {}", words)))
}

/// Parse `a, b COLLATE x DESC` into bare column names.
fn parse_name_list(tokens: &[Token], diag: &mut Diagnostics) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for part in split_top_level(tokens) {
        let mut cur = Cursor::new(part);
        names.push(cur.expect_name()?);
        if !cur.is_done() {
            diag.dropped.push(display_tokens(cur.rest()));
        }
    }
    Ok(names)
}

fn skip_conflict_clause(cur: &mut Cursor<'_>, diag: &mut Diagnostics) -> Result<()> {
    if cur.eat_keywords(&["ON", "CONFLICT"]) {
        let algorithm = cur.expect_name()?;
        diag.dropped.push(format!("ON CONFLICT {}", algorithm));
    }
    Ok(())
}

/// Collect tokens up to the next recognised column constraint, always taking
/// at least one token. Parenthesised groups are taken whole.
fn take_raw_fragment(cur: &mut Cursor<'_>) -> Vec<Token> {
    let start = cur.pos;
    let mut depth = 0i32;
    while let Some(token) = cur.peek() {
        let at_boundary = depth == 0
            && cur.pos > start
            && [
                "CONSTRAINT",
                "NOT",
                "NULL",
                "PRIMARY",
                "UNIQUE",
                "CHECK",
                "DEFAULT",
                "COLLATE",
                "REFERENCES",
            ]
            .iter()
            .any(|kw| token.is_keyword(kw));
        if at_boundary {
            break;
        }
        match token.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => depth -= 1,
            _ => {}
        }
        cur.advance();
    }
    cur.tokens[start..cur.pos].to_vec()
}

/// Parse a standalone foreign-key clause as extracted from a table body:
/// `[CONSTRAINT name] FOREIGN KEY (cols) REFERENCES table [(cols)] [actions]`.
pub fn parse_foreign_key_clause(text: &str) -> Result<ForeignKeyDef> {
    let tokens = tokenize(text)?;
    let mut cur = Cursor::new(&tokens);
    let mut diag = Diagnostics::default();

    let mut name = None;
    if cur.eat_keyword("CONSTRAINT") {
        name = Some(cur.expect_name()?);
    }
    cur.expect_keyword("FOREIGN")?;
    cur.expect_keyword("KEY")?;
    let columns = parse_name_list(cur.group()?, &mut diag)?;
    let fk = parse_references(&mut cur, name, columns, &mut diag)?;
    if !cur.is_done() {
        return Err(cur.error("unexpected trailing tokens"));
    }
    Ok(fk)
}
