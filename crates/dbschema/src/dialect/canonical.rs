//! Hub-and-spoke common type system.
//!
//! Each dialect maps its native type names onto [`CommonType`] and back.
//! Converting a column between engines goes native → common → native, so
//! adding an engine needs one table pair instead of one mapper per pair.
//!
//! ```text
//! Source DB  →  CommonType  →  Target DB
//!   MySQL    →    Varchar   →   MSSQL (nvarchar)
//!   MSSQL    →    Datetime  →   MySQL (datetime)
//! ```
//!
//! [`DataType`] is the coarser runtime category the data converters use.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::schema::Column;

/// Coarse runtime category of a column for display and parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Number,
    DateTime,
    Date,
    Time,
    String,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataType::Number => "number",
            DataType::DateTime => "datetime",
            DataType::Date => "date",
            DataType::Time => "time",
            DataType::String => "string",
        };
        f.write_str(s)
    }
}

/// Portable column type shared across dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommonType {
    // ===== Strings =====
    Varchar,
    Char,
    Text,
    Mediumtext,
    Longtext,
    Enum,
    Json,

    // ===== Binary =====
    Binary,
    Varbinary,
    Blob,
    Mediumblob,
    Longblob,

    // ===== Numbers =====
    Tinyint,
    Smallint,
    Int,
    Bigint,
    /// Exact or approximate non-integer number.
    Number,

    // ===== Date/Time =====
    Date,
    Time,
    Datetime,
    Timestamp,
}

impl CommonType {
    /// Every variant, for totality checks over the lookup tables.
    pub const ALL: [CommonType; 21] = [
        CommonType::Varchar,
        CommonType::Char,
        CommonType::Text,
        CommonType::Mediumtext,
        CommonType::Longtext,
        CommonType::Enum,
        CommonType::Json,
        CommonType::Binary,
        CommonType::Varbinary,
        CommonType::Blob,
        CommonType::Mediumblob,
        CommonType::Longblob,
        CommonType::Tinyint,
        CommonType::Smallint,
        CommonType::Int,
        CommonType::Bigint,
        CommonType::Number,
        CommonType::Date,
        CommonType::Time,
        CommonType::Datetime,
        CommonType::Timestamp,
    ];

    /// Coarse category of this type.
    pub fn data_type(&self) -> DataType {
        match self {
            CommonType::Tinyint
            | CommonType::Smallint
            | CommonType::Int
            | CommonType::Bigint
            | CommonType::Number => DataType::Number,
            CommonType::Datetime | CommonType::Timestamp => DataType::DateTime,
            CommonType::Date => DataType::Date,
            CommonType::Time => DataType::Time,
            _ => DataType::String,
        }
    }

    /// Whether the native rendering carries a length, e.g. `varchar(255)`.
    pub fn is_sized(&self) -> bool {
        matches!(
            self,
            CommonType::Varchar | CommonType::Char | CommonType::Binary | CommonType::Varbinary
        )
    }
}

/// Native type name ↔ common type tables for one dialect.
///
/// Implementations keep both directions in process-wide read-only tables;
/// the reverse table must cover every [`CommonType`].
pub trait ColumnTypeMap: Send + Sync {
    fn dialect_name(&self) -> &'static str;

    /// Common type of a native base type name (`varchar`, `datetime2`).
    /// Matching ignores case and any `(length)` suffix.
    fn to_common(&self, native: &str) -> Option<CommonType>;

    /// Preferred native base type for a common type.
    fn from_common(&self, common: CommonType) -> &'static str;

    /// Full native type for `common`, using the length/precision of `col`.
    fn render_type(&self, common: CommonType, col: &Column) -> String {
        let native = self.from_common(common);
        if common.is_sized() && col.char_max_length > 0 {
            return format!("{}({})", native, col.char_max_length);
        }
        if common == CommonType::Number && col.num_precision > 0 {
            return format!("{}({},{})", native, col.num_precision, col.num_scale);
        }
        native.to_string()
    }
}

/// Base type name of a possibly sized native type: `varchar(20)` → `varchar`.
pub fn base_type_name(native: &str) -> String {
    native
        .split('(')
        .next()
        .unwrap_or(native)
        .trim()
        .to_lowercase()
}

/// Convert a column's type from one dialect to another.
///
/// Unmapped native types fall back to `Varchar`. Function-valued defaults do
/// not survive the trip since the target engine may lack the function.
pub fn convert_column(col: &Column, from: &dyn ColumnTypeMap, to: &dyn ColumnTypeMap) -> Column {
    if from.dialect_name() == to.dialect_name() {
        return col.clone();
    }

    let source_type = if col.data_type.is_empty() {
        col.column_type.as_str()
    } else {
        col.data_type.as_str()
    };
    let common = from.to_common(source_type).unwrap_or(CommonType::Varchar);

    let mut out = col.clone();
    out.data_type = to.from_common(common).to_string();
    out.column_type = to.render_type(common, col);
    if out
        .column_default
        .as_deref()
        .is_some_and(|d| d.contains('('))
    {
        out.column_default = None;
    }
    out
}
