//! SQLite source reader.
//!
//! Table DDL comes from `sqlite_master`; columns, foreign keys and indexes
//! come from the `pragma_*` table-valued functions so that the metadata is
//! exactly what SQLite itself resolved from the DDL.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row as SqlxRow, TypeInfo, ValueRef};
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::core::identifier::validate_identifier;
use crate::core::schema::{Column, ForeignKey, Index, ReferentialAction};
use crate::core::traits::{Dialect, ReadOptions, SchemaSource, SourceTable};
use crate::core::value::{Row, SqlValue};
use crate::error::{MigrateError, Result};
use crate::retry::RetryPolicy;
use crate::typemap::sqlite_to_mysql;

use super::SqliteDialect;

/// One row of `pragma_foreign_key_list`.
type ForeignKeyRow = (i64, i64, String, String, Option<String>, String, String);

/// SQLite source reader using sqlx.
pub struct SqliteReader {
    pool: SqlitePool,
    dialect: SqliteDialect,
    path: PathBuf,
}

impl SqliteReader {
    /// Open the database file read-only, retrying per `retry`.
    pub async fn connect(config: &SourceConfig, retry: &RetryPolicy) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .read_only(true)
            .create_if_missing(false);

        let what = format!("Opening SQLite source {}", config.path.display());
        let pool = retry
            .run(&what, || {
                let options = options.clone();
                async move {
                    SqlitePoolOptions::new()
                        .max_connections(config.max_connections)
                        .connect_with(options)
                        .await
                        .map_err(|e| MigrateError::connection("SQLite", e))
                }
            })
            .await?;

        info!("Connected to SQLite source: {}", config.path.display());
        Ok(Self {
            pool,
            dialect: SqliteDialect::new(),
            path: config.path.clone(),
        })
    }

    /// Path of the database file.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Test the database connection.
    pub async fn test_connection(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| MigrateError::pool(e, "testing SQLite connection"))?;
        Ok(())
    }

    /// SQLite library version.
    pub async fn server_version(&self) -> Result<String> {
        let version: String = sqlx::query_scalar("SELECT sqlite_version()")
            .fetch_one(&self.pool)
            .await?;
        Ok(version)
    }

    async fn primary_key(&self, table: &str) -> Result<Vec<String>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT name, pk FROM pragma_table_info(?) WHERE pk > 0 ORDER BY pk",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(name, _)| name).collect())
    }
}

fn decode_row(row: &SqliteRow) -> Result<Row> {
    (0..row.len())
        .map(|i| {
            let raw = row.try_get_raw(i)?;
            if raw.is_null() {
                return Ok(SqlValue::Null);
            }
            // Storage class of this value, not the declared column type
            let storage = raw.type_info().name().to_string();
            let value = match storage.as_str() {
                "INTEGER" => SqlValue::Integer(row.try_get_unchecked::<i64, _>(i)?),
                "REAL" => SqlValue::Real(row.try_get_unchecked::<f64, _>(i)?),
                "BLOB" => SqlValue::Blob(row.try_get_unchecked::<Vec<u8>, _>(i)?),
                _ => SqlValue::Text(row.try_get_unchecked::<String, _>(i)?),
            };
            Ok(value)
        })
        .collect()
}

#[async_trait]
impl SchemaSource for SqliteReader {
    async fn list_tables(&self) -> Result<Vec<SourceTable>> {
        let query = r#"
            SELECT name, sql FROM sqlite_master
            WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND sql IS NOT NULL
            ORDER BY rowid
        "#;

        let rows: Vec<(String, String)> = sqlx::query_as(query).fetch_all(&self.pool).await?;
        debug!("Found {} tables in {}", rows.len(), self.path.display());
        Ok(rows
            .into_iter()
            .map(|(name, sql)| SourceTable::new(name, sql))
            .collect())
    }

    async fn list_foreign_keys(&self, table: &str) -> Result<Vec<ForeignKey>> {
        let query = r#"
            SELECT id, seq, "table", "from", "to", on_update, on_delete
            FROM pragma_foreign_key_list(?)
            ORDER BY id, seq
        "#;

        let rows: Vec<ForeignKeyRow> = sqlx::query_as(query)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        // One row per column pair; `id` groups the pairs of one constraint
        let mut grouped: BTreeMap<i64, Vec<ForeignKeyRow>> = BTreeMap::new();
        for row in rows {
            grouped.entry(row.0).or_default().push(row);
        }

        let mut foreign_keys = Vec::with_capacity(grouped.len());
        for pairs in grouped.into_values() {
            let (_, _, ref_table, _, _, on_update, on_delete) = pairs[0].clone();
            let columns: Vec<String> = pairs.iter().map(|p| p.3.clone()).collect();

            // A NULL "to" means the parent's primary key
            let ref_columns = if pairs.iter().all(|p| p.4.is_some()) {
                pairs.iter().filter_map(|p| p.4.clone()).collect()
            } else {
                self.primary_key(&ref_table).await?
            };

            foreign_keys.push(ForeignKey {
                name: None,
                table: table.to_string(),
                columns,
                ref_table,
                ref_columns,
                on_delete: ReferentialAction::parse(&on_delete).unwrap_or_default(),
                on_update: ReferentialAction::parse(&on_update).unwrap_or_default(),
            });
        }
        Ok(foreign_keys)
    }

    async fn list_indexes(&self, table: &str) -> Result<Vec<Index>> {
        // origin 'c' = CREATE INDEX; 'pk' and 'u' back table constraints
        let indexes: Vec<(String, i64)> = sqlx::query_as(
            r#"SELECT name, "unique" FROM pragma_index_list(?) WHERE origin = 'c' ORDER BY name"#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        let mut result = Vec::with_capacity(indexes.len());
        for (name, unique) in indexes {
            let columns: Vec<Option<String>> =
                sqlx::query_scalar("SELECT name FROM pragma_index_info(?) ORDER BY seqno")
                    .bind(&name)
                    .fetch_all(&self.pool)
                    .await?;

            if columns.iter().any(Option::is_none) {
                warn!("Skipping expression index {} on {}", name, table);
                continue;
            }
            result.push(Index {
                name,
                columns: columns.into_iter().flatten().collect(),
                is_unique: unique != 0,
            });
        }
        Ok(result)
    }

    async fn describe_columns(&self, table: &str) -> Result<Vec<Column>> {
        let rows: Vec<(String, String, i64, Option<String>, i64)> = sqlx::query_as(
            r#"SELECT name, type, "notnull", dflt_value, pk FROM pragma_table_info(?) ORDER BY cid"#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Err(MigrateError::Execution(format!("no such table: {}", table)));
        }

        Ok(rows
            .into_iter()
            .map(|(name, source_type, not_null, default, pk)| {
                let is_primary_key = pk > 0;
                let mut constraints = Vec::new();
                if not_null != 0 {
                    constraints.push("NOT NULL".to_string());
                }
                if let Some(default) = default {
                    constraints.push(format!("DEFAULT {}", default));
                }
                Column {
                    name,
                    target_type: sqlite_to_mysql(&source_type),
                    source_type,
                    is_nullable: not_null == 0 && !is_primary_key,
                    constraints: constraints.join(" "),
                    is_primary_key,
                }
            })
            .collect())
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        validate_identifier(table)?;
        let sql = format!("SELECT COUNT(*) FROM {}", self.dialect.quote_ident(table));
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn read_rows(&self, opts: &ReadOptions) -> Result<Vec<Row>> {
        validate_identifier(&opts.table)?;
        for column in &opts.columns {
            validate_identifier(column)?;
        }
        let sql = self.dialect.build_select_query(opts);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(decode_row).collect()
    }

    fn db_type(&self) -> &str {
        "sqlite"
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
