//! Core traits for the dialect engine.
//!
//! - [`SqlExecutor`]: runs one statement at a time against a session
//! - [`DbTransaction`]: an executor pinned to one session until commit/rollback
//! - [`ConnectionPool`]: the already-open logical connection a dialect borrows
//! - [`DbDialect`]: the per-engine capability contract
//! - [`DataConverter`]: coarse type classification and value parsing
//! - [`DbProgram`]: backup/restore tooling where the engine has one
//!
//! # Design Patterns
//!
//! - **Strategy**: each engine family provides its own `DbDialect`
//! - **Template Method**: default trait methods (`get_primary_key`,
//!   `get_table_ddl`, `batch_insert`) define the shared algorithm skeletons

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::dialect::{ColumnTypeMap, DataType};
use crate::error::Result;

use super::conn::{DbConn, DbType};
use super::schema::{resolve_primary_key, Column, DbCopyTable, DbServer, DuplicateStrategy, Index, Table};
use super::value::{Row, SqlValue};

/// Callback receiving one streamed row at a time.
pub type RowCallback<'a> = dyn FnMut(Row) -> Result<()> + Send + 'a;

/// Execute statements against a database session.
///
/// Arguments are always bound positionally using the engine's native
/// placeholder syntax (`?` for MySQL, `@P1..` for SQL Server).
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Run a statement and collect its first result set.
    async fn query(&self, sql: &str, args: &[SqlValue]) -> Result<Vec<Row>>;

    /// Run a statement and return the affected row count.
    async fn execute(&self, sql: &str, args: &[SqlValue]) -> Result<u64>;
}

/// A transaction handle usable wherever an executor is expected.
#[async_trait]
pub trait DbTransaction: SqlExecutor {
    fn as_executor(&self) -> &dyn SqlExecutor;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// An open connection pool for one database.
#[async_trait]
pub trait ConnectionPool: SqlExecutor {
    fn as_executor(&self) -> &dyn SqlExecutor;

    /// Run a multi-statement script without arguments.
    async fn execute_batch(&self, sql: &str) -> Result<()>;

    /// Stream the rows of a query through `on_row` without buffering the
    /// result set. The token is checked before every callback; the cursor is
    /// released when this returns.
    async fn walk(
        &self,
        sql: &str,
        cancel: &CancellationToken,
        on_row: &mut RowCallback<'_>,
    ) -> Result<()>;

    /// Begin a transaction pinned to one pooled session.
    async fn begin(&self) -> Result<Box<dyn DbTransaction>>;

    async fn close(&self);
}

/// Classify native column types and convert values for display/parsing.
pub trait DataConverter: Send + Sync {
    /// Coarse category of a native column type string.
    fn get_data_type(&self, column_type: &str) -> DataType;

    /// Stringify a value for display.
    fn format_data(&self, value: &SqlValue, data_type: DataType) -> String {
        let _ = data_type;
        value.to_string()
    }

    /// Parse textual date/time values using the dialect's layouts.
    ///
    /// Non-text input and non-temporal kinds pass through unchanged. Text
    /// that fails to parse yields the zero value of the target kind.
    fn parse_data(&self, value: SqlValue, data_type: DataType) -> SqlValue;
}

/// Options for a logical backup.
#[derive(Debug, Clone, Default)]
pub struct BackupOptions {
    /// Destination file.
    pub output: PathBuf,
    /// Tables to include; empty means the whole database.
    pub tables: Vec<String>,
    /// Dump structure only.
    pub no_data: bool,
}

/// Backup/restore program handle.
#[async_trait]
pub trait DbProgram: Send + Sync {
    async fn backup(&self, opts: &BackupOptions) -> Result<PathBuf>;

    async fn restore(&self, file: &Path) -> Result<()>;
}

/// Per-engine capability contract.
///
/// Every method has identical semantics across engines; only the SQL each
/// one issues differs.
#[async_trait]
pub trait DbDialect: Send + Sync {
    fn db_type(&self) -> DbType;

    /// The connection this dialect is bound to.
    fn conn(&self) -> &DbConn;

    /// Quote an identifier for this engine.
    fn quote_ident(&self, name: &str) -> Result<String>;

    /// Quote a string literal for embedding in generated DDL.
    fn quote_literal(&self, text: &str) -> String;

    /// Native type to common type table for this engine.
    fn type_map(&self) -> &'static dyn ColumnTypeMap;

    fn data_converter(&self) -> &'static dyn DataConverter;

    async fn get_db_server(&self) -> Result<DbServer>;

    async fn get_db_names(&self) -> Result<Vec<String>>;

    /// Fails with `UnsupportedOperation` on engines without schemas.
    async fn get_schemas(&self) -> Result<Vec<String>>;

    /// All tables in scope when `names` is empty, else only the matches.
    async fn get_tables(&self, names: &[String]) -> Result<Vec<Table>>;

    /// Columns of several tables in one query; group by `table_name`.
    async fn get_columns(&self, table_names: &[String]) -> Result<Vec<Column>>;

    async fn get_primary_key(&self, table: &str) -> Result<String> {
        let columns = self.get_columns(&[table.to_string()]).await?;
        resolve_primary_key(table, &columns)
    }

    /// Folded indexes, primary-key indexes excluded.
    async fn get_table_index(&self, table: &str) -> Result<Vec<Index>>;

    async fn get_table_ddl(&self, table: &str) -> Result<String> {
        self.copy_table_ddl(table, "").await
    }

    /// DDL recreating `table` under `new_table` (or its own name if empty).
    async fn copy_table_ddl(&self, table: &str, new_table: &str) -> Result<String>;

    /// `CREATE TABLE` statements for a column model, possibly from another
    /// engine after conversion.
    fn generate_table_ddl(
        &self,
        table: &Table,
        columns: &[Column],
        drop_before_create: bool,
    ) -> Result<Vec<String>>;

    /// Index creation statements for an index model.
    fn generate_index_ddl(&self, table: &Table, indexes: &[Index]) -> Result<Vec<String>>;

    /// Insert `rows` with the given duplicate strategy.
    ///
    /// With `tx` absent, a transaction is opened for the call and committed
    /// on success, so session settings such as identity insert apply to
    /// every statement issued.
    async fn batch_insert(
        &self,
        tx: Option<&dyn SqlExecutor>,
        table: &str,
        columns: &[String],
        rows: &[Vec<SqlValue>],
        strategy: DuplicateStrategy,
    ) -> Result<u64> {
        if let Some(exec) = tx {
            return self
                .batch_insert_with(exec, table, columns, rows, strategy)
                .await;
        }

        let tx = self.conn().pool.begin().await?;
        let result = self
            .batch_insert_with(tx.as_executor(), table, columns, rows, strategy)
            .await;
        match result {
            Ok(affected) => {
                tx.commit().await?;
                Ok(affected)
            }
            Err(e) => {
                if let Err(re) = tx.rollback().await {
                    warn!("Rollback after failed insert into {} failed: {}", table, re);
                }
                Err(e)
            }
        }
    }

    /// Strategy implementation on an explicit executor.
    async fn batch_insert_with(
        &self,
        exec: &dyn SqlExecutor,
        table: &str,
        columns: &[String],
        rows: &[Vec<SqlValue>],
        strategy: DuplicateStrategy,
    ) -> Result<u64>;

    /// Create a timestamped copy of a table; rows are copied in a detached
    /// background task when requested. Returns the new table name.
    async fn copy_table(&self, spec: &DbCopyTable) -> Result<String>;

    /// Copy every row of `table` into the existing `new_table` in one
    /// statement. This is the work `copy_table` runs in the background.
    async fn copy_table_data(&self, table: &str, new_table: &str) -> Result<()>;

    /// Stream every row of `table` through `on_row`.
    async fn walk_table_record(
        &self,
        table: &str,
        cancel: &CancellationToken,
        on_row: &mut RowCallback<'_>,
    ) -> Result<()>;

    fn get_db_program(&self) -> Result<Box<dyn DbProgram>>;
}
