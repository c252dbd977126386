//! MySQL/MariaDB database driver.
//!
//! This module provides MySQL-specific implementations for:
//! - [`MysqlDialect`]: the dialect contract over `information_schema`
//! - [`MysqlPool`]: SQLx-backed connection pool and transactions
//! - [`MysqlProgram`]: backup/restore through `mysqldump` and `mysql`
//!
//! # Supported Versions
//!
//! - MySQL 5.7+, 8.0+
//! - MariaDB 10.2+

mod connection;
mod converter;
mod ddl;
mod dialect;
mod program;
mod typemap;
mod writer;

pub use connection::{MysqlPool, MysqlTransaction};
pub use converter::{MysqlConverter, MYSQL_CONVERTER};
pub use dialect::MysqlDialect;
pub use program::MysqlProgram;
pub use typemap::{MysqlTypeMap, MYSQL_TYPE_MAP};
