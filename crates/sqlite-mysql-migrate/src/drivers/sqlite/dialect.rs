//! SQLite SQL dialect.

use crate::core::traits::{Dialect, ReadOptions};

/// SQLite dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn quote_ident(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn build_select_query(&self, opts: &ReadOptions) -> String {
        let cols = if opts.columns.is_empty() {
            "*".to_string()
        } else {
            opts.columns
                .iter()
                .map(|c| self.quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut sql = format!("SELECT {} FROM {}", cols, self.quote_ident(&opts.table));

        // rowid keeps paging stable when no key is given
        if opts.order_by.is_empty() {
            sql.push_str(" ORDER BY rowid");
        } else {
            let order: Vec<String> = opts.order_by.iter().map(|c| self.quote_ident(c)).collect();
            sql.push_str(&format!(" ORDER BY {}", order.join(", ")));
        }

        match (opts.limit, opts.offset) {
            (Some(limit), 0) => sql.push_str(&format!(" LIMIT {}", limit)),
            (Some(limit), offset) => sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset)),
            (None, 0) => {}
            (None, offset) => sql.push_str(&format!(" LIMIT -1 OFFSET {}", offset)),
        }

        sql
    }

    fn param_placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        let dialect = SqliteDialect::new();
        assert_eq!(dialect.quote_ident("users"), "\"users\"");
        assert_eq!(dialect.quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_default_order_is_rowid() {
        let dialect = SqliteDialect::new();
        let opts = ReadOptions::all("users", vec!["id".into(), "name".into()]).page(0, 100);
        assert_eq!(
            dialect.build_select_query(&opts),
            "SELECT \"id\", \"name\" FROM \"users\" ORDER BY rowid LIMIT 100"
        );
    }

    #[test]
    fn test_ordered_page() {
        let dialect = SqliteDialect::new();
        let opts = ReadOptions::all("users", vec!["id".into()])
            .ordered_by(vec!["id".into()])
            .page(200, 100);
        assert_eq!(
            dialect.build_select_query(&opts),
            "SELECT \"id\" FROM \"users\" ORDER BY \"id\" LIMIT 100 OFFSET 200"
        );
    }

    #[test]
    fn test_offset_without_limit() {
        let dialect = SqliteDialect::new();
        let mut opts = ReadOptions::all("t", vec![]);
        opts.offset = 5;
        assert_eq!(
            dialect.build_select_query(&opts),
            "SELECT * FROM \"t\" ORDER BY rowid LIMIT -1 OFFSET 5"
        );
    }
}
