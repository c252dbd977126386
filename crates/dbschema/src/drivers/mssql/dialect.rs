//! SQL Server dialect.
//!
//! Introspection reads the `sys.*` catalog views through the queries in
//! `metasql/mssql_meta.sql`, scoped to the connection's current schema
//! (`dbo` unless configured otherwise).

use async_trait::async_trait;
use chrono::Local;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::conn::{DbConn, DbType};
use crate::core::identifier::{qualify_mssql, quote_mssql, unquote_ident};
use crate::core::schema::{
    fold_indexes, Column, DbCopyTable, DbServer, DuplicateStrategy, Index, Table,
};
use crate::core::traits::{DataConverter, DbDialect, DbProgram, RowCallback, SqlExecutor};
use crate::core::value::SqlValue;
use crate::dialect::ColumnTypeMap;
use crate::drivers::common::{column_from_row, index_from_row, table_from_row, PlaceholderStyle};
use crate::error::{DbError, Result};
use crate::metasql::{get_rendered, get_sql, MetaFile};

use super::converter::MSSQL_CONVERTER;
use super::ddl;
use super::typemap::MSSQL_TYPE_MAP;

const DEFAULT_SCHEMA: &str = "dbo";

/// SQL Server dialect bound to one connection and schema.
#[derive(Clone)]
pub struct MssqlDialect {
    conn: DbConn,
    pub(super) schema: String,
}

impl MssqlDialect {
    pub fn new(conn: DbConn) -> Self {
        let schema = conn
            .info
            .current_schema()
            .unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
        Self { conn, schema }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Schema followed by the unquoted names, bound as `@P1..@Pn`.
    fn scoped_args(&self, names: &[String]) -> Vec<SqlValue> {
        std::iter::once(SqlValue::from(self.schema.as_str()))
            .chain(names.iter().map(|n| SqlValue::from(unquote_ident(n))))
            .collect()
    }

    /// Column metadata read on `exec`, so a transaction sees its own DDL.
    pub(super) async fn load_columns(
        &self,
        exec: &dyn SqlExecutor,
        table_names: &[String],
    ) -> Result<Vec<Column>> {
        if table_names.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = PlaceholderStyle::AtP.list(2, table_names.len());
        let sql = get_rendered(
            MetaFile::Mssql,
            "MSSQL_COLUMN_MA",
            &[("tableNames", placeholders.as_str())],
        )?;
        let rows = exec.query(&sql, &self.scoped_args(table_names)).await?;
        let columns: Vec<Column> = rows.iter().map(column_from_row).collect();
        debug!(
            "MSSQL: loaded {} columns for {} tables in {}",
            columns.len(),
            table_names.len(),
            self.schema
        );
        Ok(columns)
    }

    /// Every index of `table`, primary key included, folded per index.
    pub(super) async fn load_indexes(
        &self,
        exec: &dyn SqlExecutor,
        table: &str,
    ) -> Result<Vec<Index>> {
        let rows = exec
            .query(
                get_sql(MetaFile::Mssql, "MSSQL_INDEX_INFO")?,
                &self.scoped_args(&[table.to_string()]),
            )
            .await?;
        Ok(fold_indexes(rows.iter().map(index_from_row).collect()))
    }

    /// `INSERT ... SELECT` script copying every column, with identity
    /// insert enabled around it when the table has an identity column.
    pub(super) fn copy_rows_sql(
        &self,
        table: &str,
        new_table: &str,
        columns: &[Column],
    ) -> Result<String> {
        let source = qualify_mssql(&self.schema, table)?;
        let target = qualify_mssql(&self.schema, new_table)?;
        let cols = columns
            .iter()
            .map(|c| quote_mssql(&c.column_name))
            .collect::<Result<Vec<_>>>()?
            .join(", ");

        let insert = format!("INSERT INTO {} ({}) SELECT {} FROM {};", target, cols, cols, source);
        if columns.iter().any(|c| c.is_identity) {
            Ok(format!(
                "SET IDENTITY_INSERT {t} ON;\n{insert}\nSET IDENTITY_INSERT {t} OFF;",
                t = target,
                insert = insert
            ))
        } else {
            Ok(insert)
        }
    }
}

#[async_trait]
impl DbDialect for MssqlDialect {
    fn db_type(&self) -> DbType {
        DbType::Mssql
    }

    fn conn(&self) -> &DbConn {
        &self.conn
    }

    fn quote_ident(&self, name: &str) -> Result<String> {
        quote_mssql(name)
    }

    fn quote_literal(&self, text: &str) -> String {
        ddl::quote_literal(text)
    }

    fn type_map(&self) -> &'static dyn ColumnTypeMap {
        &MSSQL_TYPE_MAP
    }

    fn data_converter(&self) -> &'static dyn DataConverter {
        &MSSQL_CONVERTER
    }

    async fn get_db_server(&self) -> Result<DbServer> {
        let rows = self
            .conn
            .pool
            .query("SELECT @@VERSION AS version", &[])
            .await?;
        let version = rows
            .first()
            .map(|r| r.get_string("version"))
            .ok_or_else(|| DbError::Query("server returned no version".to_string()))?;
        Ok(DbServer { version })
    }

    async fn get_db_names(&self) -> Result<Vec<String>> {
        let rows = self
            .conn
            .pool
            .query(get_sql(MetaFile::Mssql, "MSSQL_DBS")?, &[])
            .await?;
        Ok(rows.iter().map(|r| r.get_string("dbname")).collect())
    }

    async fn get_schemas(&self) -> Result<Vec<String>> {
        let rows = self
            .conn
            .pool
            .query(get_sql(MetaFile::Mssql, "MSSQL_DB_SCHEMAS")?, &[])
            .await?;
        Ok(rows.iter().map(|r| r.get_string("schemaName")).collect())
    }

    async fn get_tables(&self, names: &[String]) -> Result<Vec<Table>> {
        let placeholders = PlaceholderStyle::AtP.list(2, names.len());
        let sql = get_rendered(
            MetaFile::Mssql,
            "MSSQL_TABLE_INFO",
            &[("tableNames", placeholders.as_str())],
        )?;
        let rows = self.conn.pool.query(&sql, &self.scoped_args(names)).await?;
        let tables: Vec<Table> = rows.iter().map(table_from_row).collect();
        debug!("MSSQL: found {} tables in {}", tables.len(), self.schema);
        Ok(tables)
    }

    async fn get_columns(&self, table_names: &[String]) -> Result<Vec<Column>> {
        self.load_columns(self.conn.pool.as_executor(), table_names)
            .await
    }

    async fn get_table_index(&self, table: &str) -> Result<Vec<Index>> {
        let indexes = self
            .load_indexes(self.conn.pool.as_executor(), table)
            .await?;
        Ok(indexes.into_iter().filter(|i| !i.is_primary).collect())
    }

    async fn copy_table_ddl(&self, table: &str, new_table: &str) -> Result<String> {
        let table = unquote_ident(table);
        let columns = self.get_columns(&[table.to_string()]).await?;
        if columns.is_empty() {
            return Err(DbError::TableNotFound(table.to_string()));
        }

        let mut info = self
            .get_tables(&[table.to_string()])
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();
        info.name = if new_table.is_empty() {
            table.to_string()
        } else {
            unquote_ident(new_table).to_string()
        };

        let indexes = self.get_table_index(table).await?;
        let mut statements = self.generate_table_ddl(&info, &columns, false)?;
        statements.extend(self.generate_index_ddl(&info, &indexes)?);
        Ok(statements.join(";\n") + ";")
    }

    fn generate_table_ddl(
        &self,
        table: &Table,
        columns: &[Column],
        drop_before_create: bool,
    ) -> Result<Vec<String>> {
        ddl::table_ddl(&self.schema, table, columns, drop_before_create)
    }

    fn generate_index_ddl(&self, table: &Table, indexes: &[Index]) -> Result<Vec<String>> {
        ddl::index_ddl(&self.schema, table, indexes)
    }

    async fn batch_insert_with(
        &self,
        exec: &dyn SqlExecutor,
        table: &str,
        columns: &[String],
        rows: &[Vec<SqlValue>],
        strategy: DuplicateStrategy,
    ) -> Result<u64> {
        self.write_rows(exec, table, columns, rows, strategy).await
    }

    async fn copy_table(&self, spec: &DbCopyTable) -> Result<String> {
        let new_table = spec.new_table_name(Local::now().naive_local());
        let ddl = self.copy_table_ddl(&spec.table_name, &new_table).await?;
        self.conn.pool.execute_batch(&ddl).await?;
        info!("Created table {}.{} from {}", self.schema, new_table, spec.table_name);

        if spec.copy_data {
            let dialect = self.clone();
            let table = spec.table_name.clone();
            let target = new_table.clone();
            tokio::spawn(async move {
                match dialect.copy_table_data(&table, &target).await {
                    Ok(()) => info!("Copied rows from {} to {}", table, target),
                    Err(e) => warn!("Failed to copy data of {} to {}: {}", table, target, e),
                }
            });
        }
        Ok(new_table)
    }

    async fn copy_table_data(&self, table: &str, new_table: &str) -> Result<()> {
        let columns = self.get_columns(&[table.to_string()]).await?;
        if columns.is_empty() {
            return Err(DbError::TableNotFound(table.to_string()));
        }
        let sql = self.copy_rows_sql(table, new_table, &columns)?;
        self.conn.pool.execute_batch(&sql).await
    }

    async fn walk_table_record(
        &self,
        table: &str,
        cancel: &CancellationToken,
        on_row: &mut RowCallback<'_>,
    ) -> Result<()> {
        let sql = format!("SELECT * FROM {}", qualify_mssql(&self.schema, table)?);
        self.conn.pool.walk(&sql, cancel, on_row).await
    }

    fn get_db_program(&self) -> Result<Box<dyn DbProgram>> {
        Err(DbError::unsupported(self.db_type().name(), "backup/restore"))
    }
}
