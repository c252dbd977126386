//! MySQL sessions over an SQLx pool.
//!
//! Values are bound positionally from [`SqlValue`] and decoded back by the
//! column's reported type name, so metadata and data queries share one path.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::{
    MySql, MySqlArguments, MySqlConnectOptions, MySqlPool as SqlxPool, MySqlPoolOptions, MySqlRow,
    MySqlSslMode,
};
use sqlx::query::Query;
use sqlx::{Column as _, Row as _, Transaction, TypeInfo, ValueRef};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ConnectionConfig;
use crate::core::traits::{ConnectionPool, DbTransaction, RowCallback, SqlExecutor};
use crate::core::value::{Row, SqlValue};
use crate::drivers::common::next_row;
use crate::error::{DbError, Result};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Idle connection timeout (5 minutes).
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// MySQL connection pool.
pub struct MysqlPool {
    pool: SqlxPool,
}

impl MysqlPool {
    /// Open a pool for the configured database and test it.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let info = config.db_info()?;
        let options = MySqlConnectOptions::new()
            .host(&info.host)
            .port(info.port)
            .database(info.database_name())
            .username(&config.user)
            .password(&config.password)
            .ssl_mode(MySqlSslMode::Preferred);

        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .idle_timeout(POOL_IDLE_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| DbError::pool(e, "creating MySQL pool"))?;

        sqlx::query("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| DbError::pool(e, "testing MySQL connection"))?;

        info!(
            "Connected to MySQL: {}:{}/{} (pool_size={})",
            info.host,
            info.port,
            info.database_name(),
            config.max_connections
        );

        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlxPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SqlExecutor for MysqlPool {
    async fn query(&self, sql: &str, args: &[SqlValue]) -> Result<Vec<Row>> {
        // Statements without arguments go over the text protocol; not every
        // statement can be prepared.
        let rows = if args.is_empty() {
            sqlx::raw_sql(sql).fetch_all(&self.pool).await?
        } else {
            bind_args(sqlx::query(sql), args).fetch_all(&self.pool).await?
        };
        Ok(convert_rows(rows))
    }

    async fn execute(&self, sql: &str, args: &[SqlValue]) -> Result<u64> {
        let result = if args.is_empty() {
            sqlx::raw_sql(sql).execute(&self.pool).await?
        } else {
            bind_args(sqlx::query(sql), args).execute(&self.pool).await?
        };
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ConnectionPool for MysqlPool {
    fn as_executor(&self) -> &dyn SqlExecutor {
        self
    }

    async fn execute_batch(&self, sql: &str) -> Result<()> {
        sqlx::raw_sql(sql).execute(&self.pool).await?;
        Ok(())
    }

    async fn walk(
        &self,
        sql: &str,
        cancel: &CancellationToken,
        on_row: &mut RowCallback<'_>,
    ) -> Result<()> {
        let mut stream = sqlx::raw_sql(sql).fetch(&self.pool);
        let mut columns: Option<Arc<[String]>> = None;

        while let Some(row) = next_row(&mut stream, cancel).await? {
            on_row(convert_row(&row, &mut columns))?;
        }
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn DbTransaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::pool(e, "beginning MySQL transaction"))?;
        Ok(Box::new(MysqlTransaction {
            tx: Mutex::new(Some(tx)),
        }))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// A transaction pinned to one pooled MySQL connection.
pub struct MysqlTransaction {
    tx: Mutex<Option<Transaction<'static, MySql>>>,
}

impl MysqlTransaction {
    fn finished() -> DbError {
        DbError::Query("transaction already finished".to_string())
    }
}

#[async_trait]
impl SqlExecutor for MysqlTransaction {
    async fn query(&self, sql: &str, args: &[SqlValue]) -> Result<Vec<Row>> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(Self::finished)?;
        let rows = if args.is_empty() {
            sqlx::raw_sql(sql).fetch_all(&mut **tx).await?
        } else {
            bind_args(sqlx::query(sql), args).fetch_all(&mut **tx).await?
        };
        Ok(convert_rows(rows))
    }

    async fn execute(&self, sql: &str, args: &[SqlValue]) -> Result<u64> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(Self::finished)?;
        let result = if args.is_empty() {
            sqlx::raw_sql(sql).execute(&mut **tx).await?
        } else {
            bind_args(sqlx::query(sql), args).execute(&mut **tx).await?
        };
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl DbTransaction for MysqlTransaction {
    fn as_executor(&self) -> &dyn SqlExecutor {
        self
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let tx = self.tx.into_inner().ok_or_else(Self::finished)?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let tx = self.tx.into_inner().ok_or_else(Self::finished)?;
        tx.rollback().await?;
        Ok(())
    }
}

/// Bind arguments in order.
fn bind_args<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    args: &[SqlValue],
) -> Query<'q, MySql, MySqlArguments> {
    for arg in args {
        query = match arg {
            SqlValue::Null => query.bind(Option::<String>::None),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::I32(v) => query.bind(*v),
            SqlValue::I64(v) => query.bind(*v),
            SqlValue::U64(v) => query.bind(*v),
            SqlValue::F32(v) => query.bind(*v),
            SqlValue::F64(v) => query.bind(*v),
            SqlValue::Decimal(d) => query.bind(*d),
            SqlValue::Text(s) => query.bind(s.clone()),
            SqlValue::Bytes(b) => query.bind(b.clone()),
            // MySQL has no native UUID type; char(36) is the common storage.
            SqlValue::Uuid(u) => query.bind(u.to_string()),
            SqlValue::DateTime(dt) => query.bind(*dt),
            SqlValue::DateTimeOffset(dt) => query.bind(dt.naive_utc()),
            SqlValue::Date(d) => query.bind(*d),
            SqlValue::Time(t) => query.bind(*t),
        };
    }
    query
}

fn convert_rows(rows: Vec<MySqlRow>) -> Vec<Row> {
    let mut columns = None;
    rows.iter().map(|row| convert_row(row, &mut columns)).collect()
}

/// Convert one row, sharing the column list across a result set.
fn convert_row(row: &MySqlRow, columns: &mut Option<Arc<[String]>>) -> Row {
    let names = columns
        .get_or_insert_with(|| {
            row.columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect::<Vec<_>>()
                .into()
        })
        .clone();

    let values = (0..row.len()).map(|i| decode_value(row, i)).collect();
    Row::new(names, values)
}

/// Decode a field by its reported type name.
fn decode_value(row: &MySqlRow, idx: usize) -> SqlValue {
    let is_null = row.try_get_raw(idx).map(|r| r.is_null()).unwrap_or(true);
    if is_null {
        return SqlValue::Null;
    }

    let type_name = row.columns()[idx].type_info().name().to_uppercase();
    let unsigned = type_name.ends_with("UNSIGNED");

    match type_name.trim_end_matches(" UNSIGNED") {
        "BOOLEAN" => row
            .try_get::<bool, _>(idx)
            .map(SqlValue::Bool)
            .unwrap_or(SqlValue::Null),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "YEAR" if !unsigned => row
            .try_get::<i32, _>(idx)
            .map(SqlValue::I32)
            .or_else(|_| row.try_get::<i64, _>(idx).map(SqlValue::I64))
            .unwrap_or(SqlValue::Null),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "YEAR" => row
            .try_get::<u32, _>(idx)
            .map(|v| SqlValue::I64(i64::from(v)))
            .or_else(|_| row.try_get::<u16, _>(idx).map(|v| SqlValue::I32(i32::from(v))))
            .or_else(|_| row.try_get::<u8, _>(idx).map(|v| SqlValue::I32(i32::from(v))))
            .unwrap_or(SqlValue::Null),
        "BIGINT" if unsigned => row
            .try_get::<u64, _>(idx)
            .map(SqlValue::U64)
            .unwrap_or(SqlValue::Null),
        "BIGINT" => row
            .try_get::<i64, _>(idx)
            .map(SqlValue::I64)
            .unwrap_or(SqlValue::Null),
        "FLOAT" => row
            .try_get::<f32, _>(idx)
            .map(SqlValue::F32)
            .unwrap_or(SqlValue::Null),
        "DOUBLE" => row
            .try_get::<f64, _>(idx)
            .map(SqlValue::F64)
            .unwrap_or(SqlValue::Null),
        "DECIMAL" => row
            .try_get::<rust_decimal::Decimal, _>(idx)
            .map(SqlValue::Decimal)
            .unwrap_or(SqlValue::Null),
        "DATE" => row
            .try_get::<chrono::NaiveDate, _>(idx)
            .map(SqlValue::Date)
            .unwrap_or(SqlValue::Null),
        "TIME" => row
            .try_get::<chrono::NaiveTime, _>(idx)
            .map(SqlValue::Time)
            .unwrap_or(SqlValue::Null),
        "DATETIME" | "TIMESTAMP" => row
            .try_get::<chrono::NaiveDateTime, _>(idx)
            .map(SqlValue::DateTime)
            .unwrap_or(SqlValue::Null),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => row
            .try_get::<Vec<u8>, _>(idx)
            .map(SqlValue::Bytes)
            .unwrap_or(SqlValue::Null),
        "BIT" | "GEOMETRY" => row
            .try_get_unchecked::<Vec<u8>, _>(idx)
            .map(SqlValue::Bytes)
            .unwrap_or(SqlValue::Null),
        // Text, JSON, ENUM, SET and anything newer read as text.
        _ => row
            .try_get::<String, _>(idx)
            .map(SqlValue::Text)
            .or_else(|_| {
                row.try_get_unchecked::<Vec<u8>, _>(idx)
                    .map(|b| SqlValue::Text(String::from_utf8_lossy(&b).into_owned()))
            })
            .unwrap_or(SqlValue::Null),
    }
}
