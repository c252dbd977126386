//! Common type system shared by all dialects.
//!
//! - [`DataType`]: coarse runtime category used by data converters
//! - [`CommonType`]: portable column type used for cross-dialect DDL
//! - [`ColumnTypeMap`]: per-dialect native ↔ common lookup tables
//! - [`converter`]: type classification and temporal parsing helpers
//!
//! ```rust,ignore
//! let mysql_col = convert_column(&mssql_col, &MSSQL_TYPE_MAP, &MYSQL_TYPE_MAP);
//! ```

mod canonical;
pub mod converter;

pub use canonical::{base_type_name, convert_column, ColumnTypeMap, CommonType, DataType};
pub use converter::classify_type;

#[cfg(test)]
pub(crate) use canonical::tests::assert_map_consistent;
