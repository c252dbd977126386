//! Database driver implementations.
//!
//! This module provides database-specific implementations of the core traits:
//!
//! - [`mysql`]: MySQL/MariaDB driver
//! - [`mssql`]: Microsoft SQL Server driver
//! - [`common`]: Shared utilities (batch statement sizing, metadata mapping)
//!
//! # Architecture
//!
//! Each driver module implements:
//! - `DbDialect`: introspection, DDL and batch loading for the engine
//! - `ConnectionPool`: the engine's pooled connection and transactions
//! - `DataConverter` and `ColumnTypeMap`: the engine's side of the
//!   canonical type system
//!
//! # Adding New Databases
//!
//! 1. Create a new module under `drivers/` with the items above
//! 2. Add a metadata query file under `metasql/`
//! 3. Add a `DbType` variant and wire it into [`DbType::dialect`] and [`connect`]

pub mod common;
pub mod mssql;
pub mod mysql;

use std::sync::Arc;

use tracing::info;

pub use mssql::{MssqlDialect, MssqlPool};
pub use mysql::{MysqlDialect, MysqlPool, MysqlProgram};

use crate::config::Config;
use crate::core::conn::{DbConn, DbType};
use crate::core::schema::Column;
use crate::core::traits::DbDialect;
use crate::dialect::convert_column;
use crate::error::Result;

impl DbType {
    /// Dialect for this engine bound to an open connection.
    ///
    /// The MySQL dialect built here has no backup tools attached; use
    /// [`connect`] or [`MysqlDialect::with_program`] for that.
    pub fn dialect(&self, conn: DbConn) -> Arc<dyn DbDialect> {
        match self {
            DbType::Mysql => Arc::new(MysqlDialect::new(conn)),
            DbType::Mssql => Arc::new(MssqlDialect::new(conn)),
        }
    }
}

/// Open a pool for the configured connection and bind its dialect.
pub async fn connect(config: &Config) -> Result<Arc<dyn DbDialect>> {
    let conn_config = &config.connection;
    let info = conn_config.db_info()?;

    let dialect: Arc<dyn DbDialect> = match info.db_type {
        DbType::Mysql => {
            let pool = MysqlPool::connect(conn_config).await?;
            let conn = DbConn::new(info, Arc::new(pool));
            let program = MysqlProgram::new(
                conn.info.clone(),
                config.program.clone(),
                conn_config.user.clone(),
                conn_config.password.clone(),
            );
            Arc::new(MysqlDialect::new(conn).with_program(program))
        }
        DbType::Mssql => {
            let pool = MssqlPool::connect(conn_config).await?;
            Arc::new(MssqlDialect::new(DbConn::new(info, Arc::new(pool))))
        }
    };

    info!(
        "{} dialect ready for {}",
        dialect.db_type().name(),
        dialect.conn().info.database
    );
    Ok(dialect)
}

/// Convert a column model read from `from` into `to`'s native types, ready
/// for `to.generate_table_ddl`.
pub fn convert_columns(columns: &[Column], from: &dyn DbDialect, to: &dyn DbDialect) -> Vec<Column> {
    columns
        .iter()
        .map(|c| convert_column(c, from.type_map(), to.type_map()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::Table;
    use crate::core::testing::MockPool;

    #[test]
    fn test_dialect_from_db_type() {
        let mock = MockPool::new();
        let mysql = DbType::Mysql.dialect(mock.conn(DbType::Mysql, "app"));
        let mssql = DbType::Mssql.dialect(mock.conn(DbType::Mssql, "app"));

        assert_eq!(mysql.db_type(), DbType::Mysql);
        assert_eq!(mssql.db_type(), DbType::Mssql);
        assert_eq!(mysql.quote_ident("users").unwrap(), "`users`");
        assert_eq!(mssql.quote_ident("users").unwrap(), "[users]");
    }

    #[test]
    fn test_mysql_columns_to_mssql_ddl() {
        let mock = MockPool::new();
        let mysql = DbType::Mysql.dialect(mock.conn(DbType::Mysql, "app"));
        let mssql = DbType::Mssql.dialect(mock.conn(DbType::Mssql, "app"));

        let columns = vec![
            Column {
                table_name: "events".into(),
                column_name: "id".into(),
                data_type: "int".into(),
                column_type: "int".into(),
                is_primary_key: true,
                is_identity: true,
                ..Default::default()
            },
            Column {
                table_name: "events".into(),
                column_name: "title".into(),
                data_type: "varchar".into(),
                column_type: "varchar(64)".into(),
                nullable: true,
                char_max_length: 64,
                ..Default::default()
            },
            Column {
                table_name: "events".into(),
                column_name: "at".into(),
                data_type: "datetime".into(),
                column_type: "datetime".into(),
                nullable: true,
                column_default: Some("CURRENT_TIMESTAMP()".into()),
                ..Default::default()
            },
        ];

        let converted = convert_columns(&columns, mysql.as_ref(), mssql.as_ref());
        assert_eq!(converted[1].column_type, "nvarchar(64)");
        assert_eq!(converted[2].data_type, "datetime2");
        assert_eq!(converted[2].column_default, None);

        let table = Table {
            name: "events".into(),
            ..Default::default()
        };
        let ddl = mssql.generate_table_ddl(&table, &converted, true).unwrap();
        assert_eq!(ddl[0], "DROP TABLE IF EXISTS [dbo].[events]");
        assert!(ddl[1].contains("\t[id] int NOT NULL IDENTITY(1,1)"));
        assert!(ddl[1].contains("\t[title] nvarchar(64) NULL"));
        assert!(ddl[1].contains("CONSTRAINT [PK_events] PRIMARY KEY ([id])"));
    }
}
