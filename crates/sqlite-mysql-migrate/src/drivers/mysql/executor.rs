//! MySQL/MariaDB target executor.
//!
//! DDL and explicit transactions run on one dedicated connection so that
//! `START TRANSACTION`, the statement and `COMMIT` share a session. Metadata
//! queries and row batches use a separate pool.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Timelike};
use mysql_async::consts::ColumnType;
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder, Pool, PoolConstraints, PoolOpts, SslOpts, TxOpts};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::TargetConfig;
use crate::core::identifier::validate_identifier;
use crate::core::schema::TargetColumn;
use crate::core::traits::{Dialect, ReadOptions, TargetExecutor};
use crate::core::value::{Row, SqlValue};
use crate::error::{MigrateError, Result};
use crate::retry::RetryPolicy;

use super::MysqlDialect;

/// MySQL max placeholders per prepared statement.
const MYSQL_MAX_PLACEHOLDERS: usize = 65535;

/// Character set id MySQL reports for binary string columns.
const BINARY_CHARSET: u16 = 63;

/// MySQL target executor using mysql_async.
pub struct MysqlExecutor {
    pool: Pool,
    ddl: Mutex<Option<Conn>>,
    dialect: MysqlDialect,
}

impl MysqlExecutor {
    /// Connect to the target, retrying the first connection per `retry`.
    pub async fn connect(config: &TargetConfig, retry: &RetryPolicy) -> Result<Self> {
        let opts = Self::opts(config)?;

        let what = format!("Connecting to MySQL target {}", config.address());
        let conn = retry
            .run(&what, || {
                let opts = opts.clone();
                async move {
                    Conn::new(opts)
                        .await
                        .map_err(|e| MigrateError::connection("MySQL", e))
                }
            })
            .await?;

        let pool = Pool::new(opts);
        let executor = Self {
            pool,
            ddl: Mutex::new(Some(conn)),
            dialect: MysqlDialect::new(),
        };
        executor.test_connection().await?;

        info!("Connected to MySQL target: {}", config.address());
        Ok(executor)
    }

    fn opts(config: &TargetConfig) -> Result<Opts> {
        let ssl_opts = match config.ssl_mode.to_lowercase().as_str() {
            "disable" => {
                warn!("MySQL TLS is disabled. Credentials will be transmitted in plaintext.");
                None
            }
            "prefer" | "require" => {
                Some(SslOpts::default().with_danger_accept_invalid_certs(true))
            }
            "verify-ca" => Some(SslOpts::default().with_danger_skip_domain_validation(true)),
            "verify-full" => Some(SslOpts::default()),
            other => {
                return Err(MigrateError::Config(format!(
                    "unsupported target.ssl_mode '{}'",
                    other
                )))
            }
        };

        let constraints = PoolConstraints::new(1, config.max_connections).ok_or_else(|| {
            MigrateError::Config("target.max_connections must be at least 1".into())
        })?;

        let mut builder = OptsBuilder::default()
            .ip_or_hostname(&config.host)
            .tcp_port(config.port)
            .db_name(Some(&config.database))
            .user(Some(&config.user))
            .pass(Some(&config.password))
            // Use utf8mb4 for full Unicode support
            .init(vec!["SET NAMES utf8mb4"])
            .pool_opts(PoolOpts::new().with_constraints(constraints));

        if let Some(ssl) = ssl_opts {
            builder = builder.ssl_opts(ssl);
        }

        Ok(builder.into())
    }

    async fn pooled(&self, context: &str) -> Result<Conn> {
        self.pool
            .get_conn()
            .await
            .map_err(|e| MigrateError::pool(e, context))
    }

    /// Test a pooled connection.
    pub async fn test_connection(&self) -> Result<()> {
        let mut conn = self.pooled("testing MySQL connection").await?;
        conn.query_drop("SELECT 1")
            .await
            .map_err(|e| MigrateError::pool(e, "testing MySQL connection"))?;
        Ok(())
    }

    /// Server version string.
    pub async fn server_version(&self) -> Result<String> {
        let mut conn = self.pooled("reading MySQL version").await?;
        let version: Option<String> = conn.query_first("SELECT VERSION()").await?;
        Ok(version.unwrap_or_default())
    }

    async fn on_ddl_connection(&self, sql: &str) -> Result<()> {
        let mut guard = self.ddl.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| MigrateError::Execution("MySQL connection is closed".into()))?;
        conn.query_drop(sql).await?;
        Ok(())
    }
}

#[async_trait]
impl TargetExecutor for MysqlExecutor {
    async fn execute(&self, sql: &str) -> Result<()> {
        debug!("Executing: {}", sql);
        self.on_ddl_connection(sql).await
    }

    async fn begin(&self) -> Result<()> {
        self.on_ddl_connection("START TRANSACTION").await
    }

    async fn commit(&self) -> Result<()> {
        self.on_ddl_connection("COMMIT").await
    }

    async fn rollback(&self) -> Result<()> {
        self.on_ddl_connection("ROLLBACK").await
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<TargetColumn>> {
        // CAST to CHAR to handle collation differences where information_schema
        // may return VARBINARY instead of VARCHAR
        let query = r#"
            SELECT CAST(COLUMN_NAME AS CHAR(255)), CAST(COLUMN_TYPE AS CHAR(255)), IS_NULLABLE
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
        "#;

        let mut conn = self.pooled("describing MySQL table").await?;
        let rows: Vec<(String, String, String)> = conn.exec(query, (table,)).await?;
        if rows.is_empty() {
            return Err(MigrateError::Execution(format!(
                "Table '{}' doesn't exist",
                table
            )));
        }

        Ok(rows
            .into_iter()
            .map(|(name, column_type, nullable)| TargetColumn {
                name,
                column_type,
                is_nullable: nullable.eq_ignore_ascii_case("YES"),
            })
            .collect())
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let query = r#"
            SELECT CAST(TABLE_NAME AS CHAR(255))
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_NAME
        "#;

        let mut conn = self.pooled("listing MySQL tables").await?;
        Ok(conn.query(query).await?)
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        validate_identifier(table)?;
        let sql = format!("SELECT COUNT(*) FROM {}", self.dialect.quote_ident(table));
        let mut conn = self.pooled("counting MySQL rows").await?;
        let count: Option<i64> = conn.query_first(sql).await?;
        Ok(count.unwrap_or(0))
    }

    async fn read_rows(&self, opts: &ReadOptions) -> Result<Vec<Row>> {
        validate_identifier(&opts.table)?;
        for column in &opts.columns {
            validate_identifier(column)?;
        }
        let sql = self.dialect.build_select_query(opts);
        let mut conn = self.pooled("reading MySQL rows").await?;

        // Binary protocol, so values arrive typed rather than as text
        let rows: Vec<mysql_async::Row> = conn.exec(sql, ()).await?;

        Ok(rows
            .iter()
            .map(|row| {
                let columns = row.columns_ref();
                (0..row.len())
                    .map(|i| {
                        let value = row.as_ref(i).cloned().unwrap_or(mysql_async::Value::NULL);
                        let is_binary = columns
                            .get(i)
                            .map(|c| {
                                c.character_set() == BINARY_CHARSET
                                    && c.column_type() != ColumnType::MYSQL_TYPE_NEWDECIMAL
                            })
                            .unwrap_or(false);
                        mysql_to_sql_value(value, is_binary)
                    })
                    .collect()
            })
            .collect())
    }

    async fn write_batch(&self, table: &str, columns: &[String], rows: Vec<Row>) -> Result<u64> {
        if rows.is_empty() || columns.is_empty() {
            return Ok(0);
        }
        validate_identifier(table)?;
        for column in columns {
            validate_identifier(column)?;
        }

        let row_count = rows.len() as u64;
        let max_rows_per_statement = (MYSQL_MAX_PLACEHOLDERS / columns.len()).max(1);

        let mut conn = self.pooled("writing MySQL rows").await?;
        let mut tx = conn.start_transaction(TxOpts::default()).await?;

        for chunk in rows.chunks(max_rows_per_statement) {
            let sql = self.dialect.build_insert(table, columns, chunk.len());
            let params: Vec<mysql_async::Value> = chunk
                .iter()
                .flat_map(|row| row.iter().map(sql_value_to_mysql))
                .collect();

            tx.exec_drop(&sql, params)
                .await
                .map_err(|e| MigrateError::transfer(table, format!("INSERT batch: {}", e)))?;
        }
        tx.commit().await?;

        debug!("MySQL: wrote {} rows to {}", row_count, table);
        Ok(row_count)
    }

    fn db_type(&self) -> &str {
        "mysql"
    }

    async fn close(&self) {
        if let Some(conn) = self.ddl.lock().await.take() {
            if let Err(e) = conn.disconnect().await {
                debug!("Error closing MySQL DDL connection: {}", e);
            }
        }
        if let Err(e) = self.pool.clone().disconnect().await {
            debug!("Error closing MySQL pool: {}", e);
        }
    }
}

fn sql_value_to_mysql(value: &SqlValue) -> mysql_async::Value {
    match value {
        SqlValue::Null => mysql_async::Value::NULL,
        SqlValue::Integer(i) => mysql_async::Value::Int(*i),
        SqlValue::Real(f) => mysql_async::Value::Double(*f),
        SqlValue::Text(s) => mysql_async::Value::Bytes(s.as_bytes().to_vec()),
        SqlValue::Blob(b) => mysql_async::Value::Bytes(b.clone()),
        SqlValue::DateTime(dt) => mysql_async::Value::Date(
            dt.year() as u16,
            dt.month() as u8,
            dt.day() as u8,
            dt.hour() as u8,
            dt.minute() as u8,
            dt.second() as u8,
            dt.and_utc().timestamp_subsec_micros(),
        ),
    }
}

fn mysql_to_sql_value(value: mysql_async::Value, is_binary: bool) -> SqlValue {
    use mysql_async::Value;

    match value {
        Value::NULL => SqlValue::Null,
        Value::Int(i) => SqlValue::Integer(i),
        Value::UInt(u) => match i64::try_from(u) {
            Ok(i) => SqlValue::Integer(i),
            Err(_) => SqlValue::Text(u.to_string()),
        },
        Value::Float(f) => SqlValue::Real(f as f64),
        Value::Double(f) => SqlValue::Real(f),
        Value::Bytes(bytes) if is_binary => SqlValue::Blob(bytes),
        Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(s) => SqlValue::Text(s),
            Err(e) => SqlValue::Blob(e.into_bytes()),
        },
        Value::Date(year, month, day, hour, minute, second, micros) => {
            NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
                .and_then(|d| {
                    d.and_hms_micro_opt(hour as u32, minute as u32, second as u32, micros)
                })
                .map(SqlValue::DateTime)
                // zero dates ('0000-00-00') have no NaiveDateTime
                .unwrap_or_else(|| {
                    SqlValue::Text(format!("{:04}-{:02}-{:02} 00:00:00", year, month, day))
                })
        }
        Value::Time(negative, days, hours, minutes, seconds, micros) => {
            let total_hours = days * 24 + hours as u32;
            let sign = if negative { "-" } else { "" };
            let base = format!("{}{:02}:{:02}:{:02}", sign, total_hours, minutes, seconds);
            if micros == 0 {
                SqlValue::Text(base)
            } else {
                SqlValue::Text(format!("{}.{:06}", base, micros))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn ts(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_datetime_round_trips_through_mysql_value() {
        let value = SqlValue::DateTime(ts(2024, 1, 15, 10, 30, 0));
        let mysql = sql_value_to_mysql(&value);
        assert_eq!(mysql, mysql_async::Value::Date(2024, 1, 15, 10, 30, 0, 0));
        assert_eq!(mysql_to_sql_value(mysql, false), value);
    }

    #[test]
    fn test_bytes_depend_on_charset() {
        let bytes = mysql_async::Value::Bytes(b"abc".to_vec());
        assert_eq!(
            mysql_to_sql_value(bytes.clone(), false),
            SqlValue::Text("abc".into())
        );
        assert_eq!(
            mysql_to_sql_value(bytes, true),
            SqlValue::Blob(b"abc".to_vec())
        );
    }

    #[test]
    fn test_unsigned_overflow_falls_back_to_text() {
        assert_eq!(
            mysql_to_sql_value(mysql_async::Value::UInt(7), false),
            SqlValue::Integer(7)
        );
        assert_eq!(
            mysql_to_sql_value(mysql_async::Value::UInt(u64::MAX), false),
            SqlValue::Text(u64::MAX.to_string())
        );
    }

    #[test]
    fn test_zero_date_is_kept_as_text() {
        assert_eq!(
            mysql_to_sql_value(mysql_async::Value::Date(0, 0, 0, 0, 0, 0, 0), false),
            SqlValue::Text("0000-00-00 00:00:00".into())
        );
    }

    #[test]
    fn test_time_values() {
        assert_eq!(
            mysql_to_sql_value(mysql_async::Value::Time(false, 1, 2, 3, 4, 0), false),
            SqlValue::Text("26:03:04".into())
        );
    }

    #[tokio::test]
    async fn test_temporal_values_read_back_validate_against_source_text() {
        use crate::ddl::translate;
        use crate::testing::{target_column, MockSource, MockTarget};
        use crate::verify::{DataOutcome, Validator, ValidatorConfig};
        use tokio_util::sync::CancellationToken;

        let sql = "CREATE TABLE events (id INTEGER PRIMARY KEY, day DATE, at TIME, price DECIMAL(10,2))";
        let source = MockSource::new().with_table(
            sql,
            vec![vec![
                SqlValue::Integer(1),
                SqlValue::from("2024-01-15"),
                SqlValue::from("10:30:00"),
                SqlValue::Real(9.5),
            ]],
        );
        let read_back = vec![
            mysql_to_sql_value(mysql_async::Value::Int(1), false),
            mysql_to_sql_value(mysql_async::Value::Date(2024, 1, 15, 0, 0, 0, 0), false),
            mysql_to_sql_value(mysql_async::Value::Time(false, 0, 10, 30, 0, 0), false),
            mysql_to_sql_value(mysql_async::Value::Bytes(b"9.50".to_vec()), false),
        ];
        let columns = vec![
            target_column("id", "bigint", false),
            target_column("day", "date", true),
            target_column("at", "time", true),
            target_column("price", "decimal(10,2)", true),
        ];
        let target = MockTarget::new().with_table("events", columns.clone(), vec![read_back]);
        let validator = Validator::new(
            &source,
            &target,
            ValidatorConfig::default(),
            CancellationToken::new(),
        );

        let table = translate(sql).unwrap().table;
        let outcome = validator.diff_data(&table, &columns).await.unwrap();
        assert_eq!(outcome, DataOutcome::Match { rows: 1 });
    }

    #[test]
    fn test_opts_reject_unknown_ssl_mode() {
        let config = TargetConfig {
            host: "localhost".into(),
            port: 3306,
            database: "app".into(),
            user: "app".into(),
            password: String::new(),
            ssl_mode: "sometimes".into(),
            max_connections: 4,
        };
        assert!(MysqlExecutor::opts(&config).is_err());
    }
}
