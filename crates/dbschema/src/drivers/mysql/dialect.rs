//! MySQL/MariaDB dialect.
//!
//! Introspection reads `information_schema` through the queries in
//! `metasql/mysql_meta.sql`. MySQL has no schema level below the database,
//! so everything is scoped to `DATABASE()`.

use async_trait::async_trait;
use chrono::Local;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::conn::{DbConn, DbType};
use crate::core::identifier::{quote_mysql, unquote_ident};
use crate::core::schema::{
    fold_indexes, Column, DbCopyTable, DbServer, DuplicateStrategy, Index, Table,
};
use crate::core::traits::{DataConverter, DbDialect, DbProgram, RowCallback, SqlExecutor};
use crate::core::value::SqlValue;
use crate::dialect::ColumnTypeMap;
use crate::drivers::common::{column_from_row, index_from_row, table_from_row, PlaceholderStyle};
use crate::error::{DbError, Result};
use crate::metasql::{get_rendered, get_sql, MetaFile};

use super::converter::MYSQL_CONVERTER;
use super::ddl;
use super::program::MysqlProgram;
use super::typemap::MYSQL_TYPE_MAP;

/// MySQL/MariaDB dialect bound to one connection.
///
/// Compatible with MySQL 5.7+, 8.0+, and MariaDB 10.2+.
#[derive(Clone)]
pub struct MysqlDialect {
    conn: DbConn,
    program: Option<MysqlProgram>,
}

impl MysqlDialect {
    pub fn new(conn: DbConn) -> Self {
        Self {
            conn,
            program: None,
        }
    }

    /// Enable backup/restore through the given client tools.
    pub fn with_program(mut self, program: MysqlProgram) -> Self {
        self.program = Some(program);
        self
    }

    /// Names with caller quoting removed, bound as `?` arguments.
    fn name_args(names: &[String]) -> Vec<SqlValue> {
        names
            .iter()
            .map(|n| SqlValue::from(unquote_ident(n)))
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
        let placeholders = PlaceholderStyle::Question.list(1, table_names.len());
        let sql = get_rendered(
            MetaFile::Mysql,
            "MYSQL_COLUMN_MA",
            &[("tableNames", placeholders.as_str())],
        )?;
        let rows = exec.query(&sql, &Self::name_args(table_names)).await?;
        let columns: Vec<Column> = rows.iter().map(column_from_row).collect();
        debug!("MySQL: loaded {} columns for {} tables", columns.len(), table_names.len());
        Ok(columns)
    }

}

#[async_trait]
impl DbDialect for MysqlDialect {
    fn db_type(&self) -> DbType {
        DbType::Mysql
    }

    fn conn(&self) -> &DbConn {
        &self.conn
    }

    fn quote_ident(&self, name: &str) -> Result<String> {
        quote_mysql(name)
    }

    fn quote_literal(&self, text: &str) -> String {
        ddl::quote_literal(text)
    }

    fn type_map(&self) -> &'static dyn ColumnTypeMap {
        &MYSQL_TYPE_MAP
    }

    fn data_converter(&self) -> &'static dyn DataConverter {
        &MYSQL_CONVERTER
    }

    async fn get_db_server(&self) -> Result<DbServer> {
        let rows = self
            .conn
            .pool
            .query("SELECT VERSION() AS version", &[])
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
            .query(get_sql(MetaFile::Mysql, "MYSQL_DBS")?, &[])
            .await?;
        Ok(rows.iter().map(|r| r.get_string("dbname")).collect())
    }

    async fn get_schemas(&self) -> Result<Vec<String>> {
        Err(DbError::unsupported(self.db_type().name(), "schemas"))
    }

    async fn get_tables(&self, names: &[String]) -> Result<Vec<Table>> {
        let placeholders = PlaceholderStyle::Question.list(1, names.len());
        let sql = get_rendered(
            MetaFile::Mysql,
            "MYSQL_TABLE_INFO",
            &[("tableNames", placeholders.as_str())],
        )?;
        let rows = self.conn.pool.query(&sql, &Self::name_args(names)).await?;
        let tables: Vec<Table> = rows.iter().map(table_from_row).collect();
        debug!("MySQL: found {} tables", tables.len());
        Ok(tables)
    }

    async fn get_columns(&self, table_names: &[String]) -> Result<Vec<Column>> {
        self.load_columns(self.conn.pool.as_executor(), table_names)
            .await
    }

    async fn get_table_index(&self, table: &str) -> Result<Vec<Index>> {
        let rows = self
            .conn
            .pool
            .query(
                get_sql(MetaFile::Mysql, "MYSQL_INDEX_INFO")?,
                &[SqlValue::from(unquote_ident(table))],
            )
            .await?;
        let indexes = fold_indexes(rows.iter().map(index_from_row).collect());
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
        Ok(statements.join(";\n"))
    }

    fn generate_table_ddl(
        &self,
        table: &Table,
        columns: &[Column],
        drop_before_create: bool,
    ) -> Result<Vec<String>> {
        ddl::table_ddl(table, columns, drop_before_create)
    }

    fn generate_index_ddl(&self, table: &Table, indexes: &[Index]) -> Result<Vec<String>> {
        ddl::index_ddl(table, indexes)
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
        info!("Created table {} from {}", new_table, spec.table_name);

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
        let sql = format!(
            "INSERT INTO {} SELECT * FROM {}",
            quote_mysql(new_table)?,
            quote_mysql(table)?
        );
        let copied = self.conn.pool.execute(&sql, &[]).await?;
        debug!("MySQL: copied {} rows from {} to {}", copied, table, new_table);
        Ok(())
    }

    async fn walk_table_record(
        &self,
        table: &str,
        cancel: &CancellationToken,
        on_row: &mut RowCallback<'_>,
    ) -> Result<()> {
        let sql = format!("SELECT * FROM {}", quote_mysql(table)?);
        self.conn.pool.walk(&sql, cancel, on_row).await
    }

    fn get_db_program(&self) -> Result<Box<dyn DbProgram>> {
        match &self.program {
            Some(program) => Ok(Box::new(program.clone())),
            None => Err(DbError::Program(
                "backup tools are not configured for this connection".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{rows, MockPool};
    use crate::core::value::Row;

    fn dialect(mock: &MockPool) -> MysqlDialect {
        MysqlDialect::new(mock.conn(DbType::Mysql, "app"))
    }

    fn users_metadata(mock: &MockPool) {
        mock.respond(
            "information_schema.COLUMNS",
            rows(
                &[
                    "tableName",
                    "columnName",
                    "dataType",
                    "columnType",
                    "nullable",
                    "isPrimaryKey",
                    "isIdentity",
                ],
                vec![
                    vec![
                        "users".into(),
                        "id".into(),
                        "int".into(),
                        "int".into(),
                        SqlValue::I64(0),
                        SqlValue::I64(1),
                        SqlValue::I64(1),
                    ],
                    vec![
                        "users".into(),
                        "email".into(),
                        "varchar".into(),
                        "varchar(128)".into(),
                        SqlValue::I64(1),
                        SqlValue::I64(0),
                        SqlValue::I64(0),
                    ],
                ],
            ),
        );
        mock.respond(
            "information_schema.TABLES",
            rows(
                &["tableName", "tableComment"],
                vec![vec!["users".into(), "".into()]],
            ),
        );
        mock.respond(
            "information_schema.STATISTICS",
            rows(
                &["indexName", "columnName", "isUnique", "isPrimaryKey", "seqInIndex"],
                vec![
                    vec![
                        "PRIMARY".into(),
                        "id".into(),
                        SqlValue::I64(1),
                        SqlValue::I64(1),
                        SqlValue::I64(1),
                    ],
                    vec![
                        "uk_email".into(),
                        "email".into(),
                        SqlValue::I64(1),
                        SqlValue::I64(0),
                        SqlValue::I64(1),
                    ],
                ],
            ),
        );
    }

    #[tokio::test]
    async fn test_get_db_server() {
        let mock = MockPool::new();
        mock.respond(
            "VERSION()",
            rows(&["version"], vec![vec!["8.0.36".into()]]),
        );
        let server = dialect(&mock).get_db_server().await.unwrap();
        assert_eq!(server.version, "8.0.36");
    }

    #[tokio::test]
    async fn test_get_schemas_unsupported() {
        let mock = MockPool::new();
        let err = dialect(&mock).get_schemas().await.unwrap_err();
        assert!(matches!(err, DbError::UnsupportedOperation { .. }));
    }

    #[tokio::test]
    async fn test_get_tables_binds_unquoted_names() {
        let mock = MockPool::new();
        let d = dialect(&mock);

        d.get_tables(&[]).await.unwrap();
        d.get_tables(&["`users`".to_string(), "orders".to_string()])
            .await
            .unwrap();

        let executed = mock.executed();
        assert!(!executed[0].sql.contains("table_name IN"));
        assert!(executed[0].args.is_empty());
        assert!(executed[1].sql.contains("table_name IN (?, ?)"));
        assert_eq!(
            executed[1].args,
            vec![SqlValue::from("users"), SqlValue::from("orders")]
        );
    }

    #[tokio::test]
    async fn test_get_columns_without_names_skips_query() {
        let mock = MockPool::new();
        assert!(dialect(&mock).get_columns(&[]).await.unwrap().is_empty());
        assert!(mock.executed().is_empty());
    }

    #[tokio::test]
    async fn test_get_primary_key() {
        let mock = MockPool::new();
        users_metadata(&mock);
        assert_eq!(dialect(&mock).get_primary_key("users").await.unwrap(), "id");
    }

    #[tokio::test]
    async fn test_get_primary_key_missing_table() {
        let mock = MockPool::new();
        let err = dialect(&mock).get_primary_key("ghost").await.unwrap_err();
        assert!(matches!(err, DbError::TableNotFound(_)));
    }

    #[tokio::test]
    async fn test_get_table_index_excludes_primary() {
        let mock = MockPool::new();
        users_metadata(&mock);
        let indexes = dialect(&mock).get_table_index("users").await.unwrap();
        assert_eq!(indexes.len(), 1);
        assert_eq!(indexes[0].index_name, "uk_email");
        assert!(indexes[0].is_unique);
    }

    #[tokio::test]
    async fn test_get_table_index_empty() {
        let mock = MockPool::new();
        assert!(dialect(&mock).get_table_index("plain").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_table_ddl() {
        let mock = MockPool::new();
        users_metadata(&mock);
        let ddl = dialect(&mock).get_table_ddl("users").await.unwrap();
        assert_eq!(
            ddl,
            "CREATE TABLE `users` (\n  `id` int NOT NULL AUTO_INCREMENT,\n  `email` varchar(128),\n  PRIMARY KEY (`id`)\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;\n\
             ALTER TABLE `users` ADD UNIQUE INDEX `uk_email`(`email`) USING BTREE"
        );
    }

    #[tokio::test]
    async fn test_copy_table_with_data() {
        let mock = MockPool::new();
        users_metadata(&mock);
        let d = dialect(&mock);

        let new_table = d
            .copy_table(&DbCopyTable {
                table_name: "users".into(),
                copy_data: true,
            })
            .await
            .unwrap();
        assert!(new_table.starts_with("users_copy_"));

        let expected = format!("INSERT INTO `{}` SELECT * FROM `users`", new_table);
        for _ in 0..100 {
            if mock.statements().contains(&expected) {
                break;
            }
            tokio::task::yield_now().await;
        }

        let statements = mock.statements();
        assert!(statements
            .iter()
            .any(|s| s.starts_with(&format!("CREATE TABLE `{}`", new_table))));
        assert!(statements.contains(&expected));
    }

    #[tokio::test]
    async fn test_walk_table_record_cancelled() {
        let mock = MockPool::new();
        mock.respond(
            "SELECT * FROM `users`",
            rows(&["id"], vec![vec![SqlValue::I64(1)], vec![SqlValue::I64(2)]]),
        );
        let d = dialect(&mock);
        let cancel = CancellationToken::new();

        let mut seen: Vec<Row> = Vec::new();
        let token = cancel.clone();
        let err = d
            .walk_table_record("users", &cancel, &mut |row: Row| -> Result<()> {
                seen.push(row);
                token.cancel();
                Ok(())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Cancelled));
        assert_eq!(seen.len(), 1);
    }

    #[tokio::test]
    async fn test_get_db_program_requires_tools() {
        let mock = MockPool::new();
        assert!(dialect(&mock).get_db_program().is_err());
    }

    #[test]
    fn test_quote_literal() {
        let mock = MockPool::new();
        assert_eq!(dialect(&mock).quote_literal("it's"), "'it''s'");
    }
}
