//! Microsoft SQL Server driver.
//!
//! This module provides MSSQL-specific implementations:
//!
//! - [`MssqlDialect`]: the dialect contract over the `sys.*` catalog views
//! - [`MssqlPool`]: bb8 pool of Tiberius clients
//! - [`MssqlSession`]: a transaction pinned to one pooled connection

mod connection;
mod converter;
mod ddl;
mod dialect;
mod typemap;
mod writer;

pub use connection::{MssqlPool, MssqlSession, TiberiusConnectionManager};
pub use converter::{MssqlConverter, MSSQL_CONVERTER};
pub use dialect::MssqlDialect;
pub use typemap::{MssqlTypeMap, MSSQL_TYPE_MAP};
