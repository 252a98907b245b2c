//! Tokenizer for SQLite table definitions.
//!
//! Produces a flat token stream that keeps string literals and quoted
//! identifiers intact, so that commas and parentheses inside them never
//! confuse the structural split. Comments are discarded; whitespace is
//! remembered per token so expressions can be re-rendered faithfully.

use crate::error::{MigrateError, Result};

/// Kind of a lexical token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Bare word: keyword or unquoted identifier.
    Word,
    /// Quoted identifier; carries the opening quote character
    /// (`"`, `` ` `` or `[`). The token text is the unquoted name.
    QuotedIdent(char),
    /// Single-quoted string literal, text stored unescaped.
    String,
    /// Numeric literal.
    Number,
    /// Blob literal `X'..'`, text holds the hex digits.
    Blob,
    LParen,
    RParen,
    Comma,
    /// Any other operator or punctuation.
    Symbol,
}

/// A token with its text and whether whitespace preceded it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub space_before: bool,
}

impl Token {
    /// Case-insensitive keyword check on a bare word.
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(keyword)
    }

    /// Whether the token can name a table or column.
    pub fn is_name(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Word | TokenKind::QuotedIdent(_) | TokenKind::String
        )
    }
}

/// Two-character operators recognised as a single symbol.
const TWO_CHAR_OPERATORS: &[&str] = &["<=", ">=", "<>", "!=", "==", "||", "<<", ">>"];

/// Split SQL text into tokens.
pub fn tokenize(sql: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = sql.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut space_before = false;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            space_before = true;
            i += 1;
            continue;
        }

        // -- line comment
        if c == '-' && chars.get(i + 1) == Some(&'-') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            space_before = true;
            continue;
        }

        // /* block comment */
        if c == '/' && chars.get(i + 1) == Some(&'*') {
            i += 2;
            while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                i += 1;
            }
            if i >= chars.len() {
                return Err(MigrateError::parse(sql, "unterminated block comment"));
            }
            i += 2;
            space_before = true;
            continue;
        }

        let (kind, text, next) = match c {
            '\'' => {
                let (text, next) = read_quoted(&chars, i, '\'', sql)?;
                (TokenKind::String, text, next)
            }
            '"' | '`' => {
                let (text, next) = read_quoted(&chars, i, c, sql)?;
                (TokenKind::QuotedIdent(c), text, next)
            }
            '[' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&ch| ch == ']')
                    .ok_or_else(|| MigrateError::parse(sql, "unterminated [identifier]"))?;
                let text: String = chars[i + 1..i + 1 + end].iter().collect();
                (TokenKind::QuotedIdent('['), text, i + end + 2)
            }
            'x' | 'X' if chars.get(i + 1) == Some(&'\'') => {
                let (text, next) = read_quoted(&chars, i + 1, '\'', sql)?;
                (TokenKind::Blob, text, next)
            }
            '(' => (TokenKind::LParen, "(".to_string(), i + 1),
            ')' => (TokenKind::RParen, ")".to_string(), i + 1),
            ',' => (TokenKind::Comma, ",".to_string(), i + 1),
            _ if c.is_ascii_digit() || (c == '.' && next_is_digit(&chars, i)) => {
                let next = read_number(&chars, i);
                (TokenKind::Number, chars[i..next].iter().collect(), next)
            }
            _ if is_word_char(c) => {
                let mut next = i;
                while next < chars.len() && is_word_char(chars[next]) {
                    next += 1;
                }
                (TokenKind::Word, chars[i..next].iter().collect(), next)
            }
            _ => {
                let pair: String = chars[i..(i + 2).min(chars.len())].iter().collect();
                if TWO_CHAR_OPERATORS.contains(&pair.as_str()) {
                    (TokenKind::Symbol, pair, i + 2)
                } else {
                    (TokenKind::Symbol, c.to_string(), i + 1)
                }
            }
        };

        tokens.push(Token {
            kind,
            text,
            space_before,
        });
        space_before = false;
        i = next;
    }

    Ok(tokens)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn next_is_digit(chars: &[char], i: usize) -> bool {
    chars.get(i + 1).is_some_and(|c| c.is_ascii_digit())
}

fn read_number(chars: &[char], start: usize) -> usize {
    let mut i = start;
    while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.') {
        // exponent sign: 1e-5
        if (chars[i] == 'e' || chars[i] == 'E')
            && matches!(chars.get(i + 1), Some('+') | Some('-'))
        {
            i += 1;
        }
        i += 1;
    }
    i
}

/// Read a quoted run starting at `start` (the opening quote). A doubled quote
/// character inside the run is an escaped quote. Returns the unescaped text
/// and the index after the closing quote.
fn read_quoted(chars: &[char], start: usize, quote: char, sql: &str) -> Result<(String, usize)> {
    let mut text = String::new();
    let mut i = start + 1;
    loop {
        match chars.get(i) {
            None => {
                return Err(MigrateError::parse(
                    sql,
                    format!("unterminated {}quoted text", quote),
                ))
            }
            Some(&ch) if ch == quote => {
                if chars.get(i + 1) == Some(&quote) {
                    text.push(quote);
                    i += 2;
                } else {
                    return Ok((text, i + 1));
                }
            }
            Some(&ch) => {
                text.push(ch);
                i += 1;
            }
        }
    }
}
