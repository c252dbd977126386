//! # dbschema
//!
//! Dialect abstraction and schema/data transfer engine for MySQL and
//! Microsoft SQL Server.
//!
//! A [`DbDialect`] bound to an open connection provides:
//!
//! - **Introspection** of databases, schemas, tables, columns and indexes
//! - **DDL synthesis** for a table model, including models read from the
//!   other engine after conversion through the canonical type system
//! - **Batch insert** with `none` / `ignore` / `update` duplicate handling
//! - **Table copy** (structure now, rows in a background task)
//! - **Streaming reads** of a whole table with cancellation
//! - **Backup/restore** through the engine's client tools where available
//!
//! ## Example
//!
//! ```rust,no_run
//! use dbschema::{Config, DbDialect, DuplicateStrategy};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let dialect = dbschema::connect(&config).await?;
//!     let columns = dialect.get_columns(&["users".to_string()]).await?;
//!     println!("users has {} columns", columns.len());
//!
//!     let rows = vec![vec![1i64.into(), "alice".into()]];
//!     let cols = vec!["id".to_string(), "name".to_string()];
//!     dialect
//!         .batch_insert(None, "users", &cols, &rows, DuplicateStrategy::Update)
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod dialect;
pub mod drivers;
pub mod error;
pub mod metasql;

// Re-exports for convenient access
pub use crate::config::{Config, ConnectionConfig, ProgramConfig};
pub use crate::core::{
    BackupOptions, Column, ConnectionPool, DataConverter, DbConn, DbCopyTable, DbDialect, DbInfo,
    DbProgram, DbServer, DbTransaction, DbType, DuplicateStrategy, Index, Row, RowCallback,
    SqlExecutor, SqlValue, Table,
};
pub use crate::dialect::{convert_column, ColumnTypeMap, CommonType, DataType};
pub use crate::drivers::{connect, convert_columns, MssqlDialect, MysqlDialect};
pub use crate::error::{DbError, Result};
