//! Core abstractions shared by every dialect.
//!
//! - [`schema`]: server, table, column and index metadata types
//! - [`value`]: runtime values and named result rows
//! - [`identifier`]: the single quoting/escaping utility for generated SQL
//! - [`conn`]: the logical connection a dialect is bound to
//! - [`traits`]: executor, pool, dialect, converter and program contracts
//!
//! The core defines engine-agnostic contracts implemented by the driver
//! modules (`drivers/mysql`, `drivers/mssql`).

pub mod conn;
pub mod identifier;
pub mod schema;
pub mod traits;
pub mod value;

#[cfg(test)]
pub(crate) mod testing;

pub use conn::{DbConn, DbInfo, DbType};
pub use schema::{
    fold_indexes, resolve_primary_key, unique_key_columns, Column, DbCopyTable, DbServer,
    DuplicateStrategy, Index, Table,
};
pub use traits::{
    BackupOptions, ConnectionPool, DataConverter, DbDialect, DbProgram, DbTransaction,
    RowCallback, SqlExecutor,
};
pub use value::{Row, SqlValue};
