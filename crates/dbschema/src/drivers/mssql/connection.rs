//! SQL Server sessions over a bb8 pool of Tiberius clients.
//!
//! Statements without arguments go out as plain SQL batches, so session
//! settings such as `SET IDENTITY_INSERT` survive until the next statement
//! on the same connection. Statements with arguments are sent as RPC with
//! `@P1..@Pn` parameters.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use rust_decimal::Decimal;
use tiberius::{AuthMethod, Client, ColumnData, Config, EncryptionLevel, FromSql, Query};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::core::traits::{ConnectionPool, DbTransaction, RowCallback, SqlExecutor};
use crate::core::value::{Row, SqlValue};
use crate::drivers::common::next_row;
use crate::error::{DbError, Result};

/// Maximum TDS packet size.
const TDS_MAX_PACKET_SIZE: u32 = 32767;

/// Connection pool timeouts.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(300);
const POOL_MAX_LIFETIME: Duration = Duration::from_secs(1800);
const TCP_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

type MssqlClient = Client<Compat<TcpStream>>;

/// Connection manager for bb8 pool with Tiberius.
#[derive(Clone)]
pub struct TiberiusConnectionManager {
    host: String,
    port: u16,
    database: String,
    user: String,
    password: String,
    encrypt: bool,
    trust_server_cert: bool,
}

impl TiberiusConnectionManager {
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        let info = config.db_info()?;
        Ok(Self {
            host: info.host.clone(),
            port: info.port,
            database: info.database_name().to_string(),
            user: config.user.clone(),
            password: config.password.clone(),
            encrypt: config.encrypt,
            trust_server_cert: config.trust_server_cert,
        })
    }

    fn build_config(&self) -> Config {
        let mut config = Config::new();
        config.host(&self.host);
        config.port(self.port);
        config.database(&self.database);
        config.authentication(AuthMethod::sql_server(&self.user, &self.password));

        if self.encrypt {
            config.encryption(EncryptionLevel::Required);
            if self.trust_server_cert {
                config.trust_cert();
            }
        } else {
            config.encryption(EncryptionLevel::NotSupported);
        }

        config.packet_size(TDS_MAX_PACKET_SIZE);
        config
    }
}

fn io_error(e: std::io::Error, context: &str) -> tiberius::error::Error {
    tiberius::error::Error::Io {
        kind: e.kind(),
        message: format!("{}: {}", context, e),
    }
}

#[async_trait]
impl bb8::ManageConnection for TiberiusConnectionManager {
    type Connection = MssqlClient;
    type Error = tiberius::error::Error;

    async fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        let config = self.build_config();
        let tcp = TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| io_error(e, "connecting"))?;
        tcp.set_nodelay(true).ok();

        let std_tcp = tcp.into_std().map_err(|e| io_error(e, "configuring socket"))?;
        let socket = socket2::Socket::from(std_tcp);
        let keepalive = socket2::TcpKeepalive::new()
            .with_time(TCP_KEEPALIVE_INTERVAL)
            .with_interval(TCP_KEEPALIVE_INTERVAL);
        if let Err(e) = socket.set_tcp_keepalive(&keepalive) {
            warn!("Failed to set TCP keepalive on MSSQL connection: {}", e);
        }

        let std_tcp: std::net::TcpStream = socket.into();
        std_tcp.set_nonblocking(true).ok();
        let tcp = TcpStream::from_std(std_tcp).map_err(|e| io_error(e, "converting socket"))?;

        Client::connect(config, tcp.compat_write()).await
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        conn.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// SQL Server connection pool.
pub struct MssqlPool {
    pool: Pool<TiberiusConnectionManager>,
}

impl MssqlPool {
    /// Open a pool for the configured database and test it.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let manager = TiberiusConnectionManager::new(config)?;
        let pool = Pool::builder()
            .max_size(config.max_connections)
            .min_idle(Some(1))
            .connection_timeout(POOL_CONNECTION_TIMEOUT)
            .idle_timeout(Some(POOL_IDLE_TIMEOUT))
            .max_lifetime(Some(POOL_MAX_LIFETIME))
            .test_on_check_out(true)
            .build(manager.clone())
            .await
            .map_err(|e| DbError::pool(e, "creating MSSQL pool"))?;

        {
            let mut conn = pool
                .get()
                .await
                .map_err(|e| DbError::pool(e, "testing MSSQL connection"))?;
            conn.simple_query("SELECT 1").await?.into_results().await?;
        }

        info!(
            "Connected to MSSQL: {}:{}/{} (pool_size={})",
            manager.host, manager.port, manager.database, config.max_connections
        );

        Ok(Self { pool })
    }

    async fn get(&self) -> Result<PooledConnection<'_, TiberiusConnectionManager>> {
        self.pool
            .get()
            .await
            .map_err(|e| DbError::pool(e, "getting MSSQL connection"))
    }
}

#[async_trait]
impl SqlExecutor for MssqlPool {
    async fn query(&self, sql: &str, args: &[SqlValue]) -> Result<Vec<Row>> {
        let mut conn = self.get().await?;
        run_query(&mut conn, sql, args).await
    }

    async fn execute(&self, sql: &str, args: &[SqlValue]) -> Result<u64> {
        let mut conn = self.get().await?;
        run_execute(&mut conn, sql, args).await
    }
}

#[async_trait]
impl ConnectionPool for MssqlPool {
    fn as_executor(&self) -> &dyn SqlExecutor {
        self
    }

    async fn execute_batch(&self, sql: &str) -> Result<()> {
        let mut conn = self.get().await?;
        conn.simple_query(sql).await?.into_results().await?;
        Ok(())
    }

    async fn walk(
        &self,
        sql: &str,
        cancel: &CancellationToken,
        on_row: &mut RowCallback<'_>,
    ) -> Result<()> {
        let mut conn = self.get().await?;
        // Rows left unread on cancel are flushed by the client before the
        // connection's next statement.
        let mut stream = conn.simple_query(sql).await?.into_row_stream();
        let mut columns: Option<Arc<[String]>> = None;

        while let Some(row) = next_row(&mut stream, cancel).await? {
            on_row(convert_row(row, &mut columns))?;
        }
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn DbTransaction>> {
        let mut conn = self
            .pool
            .get_owned()
            .await
            .map_err(|e| DbError::pool(e, "beginning MSSQL transaction"))?;
        conn.simple_query("BEGIN TRAN").await?.into_results().await?;
        Ok(Box::new(MssqlSession {
            conn: Mutex::new(Some(conn)),
        }))
    }

    async fn close(&self) {
        debug!("MSSQL pool released");
    }
}

/// A transaction pinned to one pooled connection.
///
/// Every statement of the transaction runs on the same session, so
/// session-scoped settings apply to the statements that follow them.
pub struct MssqlSession {
    conn: Mutex<Option<PooledConnection<'static, TiberiusConnectionManager>>>,
}

impl MssqlSession {
    fn finished() -> DbError {
        DbError::Query("transaction already finished".to_string())
    }

    async fn finish(&self, sql: &str) -> Result<()> {
        let mut guard = self.conn.lock().await;
        let mut conn = guard.take().ok_or_else(Self::finished)?;
        conn.simple_query(sql).await?.into_results().await?;
        Ok(())
    }
}

#[async_trait]
impl SqlExecutor for MssqlSession {
    async fn query(&self, sql: &str, args: &[SqlValue]) -> Result<Vec<Row>> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(Self::finished)?;
        run_query(conn, sql, args).await
    }

    async fn execute(&self, sql: &str, args: &[SqlValue]) -> Result<u64> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(Self::finished)?;
        run_execute(conn, sql, args).await
    }
}

#[async_trait]
impl DbTransaction for MssqlSession {
    fn as_executor(&self) -> &dyn SqlExecutor {
        self
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.finish("COMMIT TRAN").await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        // The server may already have rolled back after a batch-aborting error.
        self.finish("IF @@TRANCOUNT > 0 ROLLBACK TRAN").await
    }
}

async fn run_query(client: &mut MssqlClient, sql: &str, args: &[SqlValue]) -> Result<Vec<Row>> {
    let rows = if args.is_empty() {
        client.simple_query(sql).await?.into_first_result().await?
    } else {
        bind_args(sql, args).query(client).await?.into_first_result().await?
    };

    let mut columns = None;
    Ok(rows
        .into_iter()
        .map(|row| convert_row(row, &mut columns))
        .collect())
}

/// Affected row count; plain batches report 0.
async fn run_execute(client: &mut MssqlClient, sql: &str, args: &[SqlValue]) -> Result<u64> {
    if args.is_empty() {
        client.simple_query(sql).await?.into_results().await?;
        return Ok(0);
    }
    Ok(bind_args(sql, args).execute(client).await?.total())
}

/// Build an RPC query with arguments bound in order as `@P1..@Pn`.
fn bind_args<'a>(sql: &'a str, args: &[SqlValue]) -> Query<'a> {
    let mut query = Query::new(sql);
    for arg in args {
        match arg {
            SqlValue::Null => query.bind(Option::<String>::None),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::I32(v) => query.bind(*v),
            SqlValue::I64(v) => query.bind(*v),
            SqlValue::U64(v) => match i64::try_from(*v) {
                Ok(v) => query.bind(v),
                Err(_) => query.bind(Decimal::from(*v)),
            },
            SqlValue::F32(v) => query.bind(*v),
            SqlValue::F64(v) => query.bind(*v),
            SqlValue::Decimal(d) => query.bind(*d),
            SqlValue::Text(s) => query.bind(s.clone()),
            SqlValue::Bytes(b) => query.bind(b.clone()),
            SqlValue::Uuid(u) => query.bind(*u),
            SqlValue::DateTime(dt) => query.bind(*dt),
            SqlValue::DateTimeOffset(dt) => query.bind(*dt),
            SqlValue::Date(d) => query.bind(*d),
            SqlValue::Time(t) => query.bind(*t),
        }
    }
    query
}

fn convert_row(row: tiberius::Row, columns: &mut Option<Arc<[String]>>) -> Row {
    let names = columns
        .get_or_insert_with(|| {
            row.columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect::<Vec<_>>()
                .into()
        })
        .clone();

    let values = row.into_iter().map(|data| decode(&data)).collect();
    Row::new(names, values)
}

fn from_sql<'a, T: FromSql<'a>>(data: &'a ColumnData<'static>) -> Option<T> {
    T::from_sql(data).ok().flatten()
}

/// Convert one TDS value into the engine-neutral representation.
fn decode(data: &ColumnData<'static>) -> SqlValue {
    let value = match data {
        ColumnData::U8(v) => v.map(|v| SqlValue::I32(i32::from(v))),
        ColumnData::I16(v) => v.map(|v| SqlValue::I32(i32::from(v))),
        ColumnData::I32(v) => v.map(SqlValue::I32),
        ColumnData::I64(v) => v.map(SqlValue::I64),
        ColumnData::F32(v) => v.map(SqlValue::F32),
        ColumnData::F64(v) => v.map(SqlValue::F64),
        ColumnData::Bit(v) => v.map(SqlValue::Bool),
        ColumnData::String(v) => v.as_ref().map(|s| SqlValue::Text(s.to_string())),
        ColumnData::Guid(v) => v.map(SqlValue::Uuid),
        ColumnData::Binary(v) => v.as_ref().map(|b| SqlValue::Bytes(b.to_vec())),
        ColumnData::Xml(v) => v
            .as_ref()
            .map(|x| SqlValue::Text(x.clone().into_owned().into_string())),
        ColumnData::Numeric(_) => from_sql::<Decimal>(data).map(SqlValue::Decimal),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            from_sql::<chrono::NaiveDateTime>(data).map(SqlValue::DateTime)
        }
        ColumnData::Date(_) => from_sql::<chrono::NaiveDate>(data).map(SqlValue::Date),
        ColumnData::Time(_) => from_sql::<chrono::NaiveTime>(data).map(SqlValue::Time),
        ColumnData::DateTimeOffset(_) => {
            from_sql::<chrono::DateTime<chrono::FixedOffset>>(data).map(SqlValue::DateTimeOffset)
        }
        #[allow(unreachable_patterns)]
        _ => None,
    };
    value.unwrap_or(SqlValue::Null)
}
