//! Type mapping between SQLite and MySQL.
//!
//! Two independent mappings live here:
//!
//! - [`sqlite_to_mysql`] produces the exact MySQL type written into DDL.
//! - [`normalize_type`] folds any type of either engine into a coarse bucket
//!   so that semantically equivalent columns compare equal during validation.

/// Ordered DDL mapping table: source base-type prefix -> MySQL type.
///
/// Order matters where one name is a prefix of another
/// (DATETIME before DATE, TIMESTAMP before TIME).
const DDL_TYPE_MAP: &[(&str, &str)] = &[
    ("INTEGER", "BIGINT"),
    ("BIGINT", "BIGINT"),
    ("REAL", "DOUBLE"),
    ("DOUBLE", "DOUBLE"),
    ("FLOAT", "DOUBLE"),
    ("TEXT", "TEXT"),
    ("CLOB", "LONGTEXT"),
    ("BLOB", "BLOB"),
    ("BOOLEAN", "TINYINT(1)"),
    ("DATETIME", "DATETIME"),
    ("TIMESTAMP", "DATETIME"),
    ("DATE", "DATE"),
    ("TIME", "TIME"),
];

/// Map a SQLite column type to the MySQL type used in generated DDL.
///
/// Matching is case-insensitive on the base type (the text before any size
/// qualifier), so `TEXT(100)` and `text` both map to `TEXT`. Types without an
/// entry (`VARCHAR(255)`, `DECIMAL(10,2)`, `INT`, ...) are returned unchanged,
/// and a typeless column becomes `TEXT`.
pub fn sqlite_to_mysql(sqlite_type: &str) -> String {
    let trimmed = sqlite_type.trim();
    if trimmed.is_empty() {
        return "TEXT".to_string();
    }

    let base = trimmed
        .split('(')
        .next()
        .unwrap_or(trimmed)
        .trim()
        .to_uppercase();

    DDL_TYPE_MAP
        .iter()
        .find(|(prefix, _)| base.starts_with(prefix))
        .map(|(_, mysql)| mysql.to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

/// Fold a type name from either engine into its comparison bucket.
///
/// Buckets: INTEGER, TEXT, BLOB, REAL, DATETIME, DATE, TIME. Anything else is
/// returned upper-cased. `TINYINT(1)`, `INT` and `BIGINT` all land in INTEGER.
pub fn normalize_type(any_type: &str) -> String {
    let upper = any_type.trim().to_uppercase();

    let bucket = if upper.contains("INT") || upper.contains("BOOL") {
        "INTEGER"
    } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
        "TEXT"
    } else if upper.contains("BLOB") || upper.contains("BINARY") {
        "BLOB"
    } else if ["REAL", "FLOA", "DOUB", "NUMERIC", "DECIMAL"]
        .iter()
        .any(|p| upper.contains(p))
    {
        "REAL"
    } else if upper.contains("DATETIME") || upper.contains("TIMESTAMP") {
        "DATETIME"
    } else if upper.contains("DATE") {
        "DATE"
    } else if upper.contains("TIME") {
        "TIME"
    } else {
        return upper;
    };

    bucket.to_string()
}
