//! Common utilities shared across database drivers.
//!
//! - [`batch`]: placeholder generation, argument flattening, statement sizing
//! - [`meta`]: mapping of metadata query rows onto the schema model
//! - [`stream`]: cancellable row streams

pub mod batch;
pub mod meta;
pub mod stream;

pub use batch::{check_row_widths, execute_logged, flatten_rows, ParamLimits, PlaceholderStyle};
pub use meta::{column_from_row, contains_name, index_from_row, key_columns, table_from_row};
pub use stream::next_row;
