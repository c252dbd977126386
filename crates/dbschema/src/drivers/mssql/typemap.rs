//! SQL Server native type ↔ common type tables.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::core::schema::Column;
use crate::dialect::{base_type_name, ColumnTypeMap, CommonType};

static TO_COMMON: LazyLock<HashMap<&'static str, CommonType>> = LazyLock::new(|| {
    HashMap::from([
        // Integers
        ("bit", CommonType::Tinyint),
        ("tinyint", CommonType::Tinyint),
        ("smallint", CommonType::Smallint),
        ("int", CommonType::Int),
        ("bigint", CommonType::Bigint),
        // Exact and approximate numerics
        ("decimal", CommonType::Number),
        ("numeric", CommonType::Number),
        ("money", CommonType::Number),
        ("smallmoney", CommonType::Number),
        ("float", CommonType::Number),
        ("real", CommonType::Number),
        // Strings
        ("char", CommonType::Char),
        ("nchar", CommonType::Char),
        ("varchar", CommonType::Varchar),
        ("nvarchar", CommonType::Varchar),
        ("text", CommonType::Text),
        ("ntext", CommonType::Text),
        ("xml", CommonType::Text),
        ("uniqueidentifier", CommonType::Varchar),
        // Binary
        ("binary", CommonType::Binary),
        ("varbinary", CommonType::Varbinary),
        ("image", CommonType::Blob),
        ("timestamp", CommonType::Binary),
        ("rowversion", CommonType::Binary),
        // Date/time
        ("date", CommonType::Date),
        ("time", CommonType::Time),
        ("datetime", CommonType::Datetime),
        ("datetime2", CommonType::Datetime),
        ("smalldatetime", CommonType::Datetime),
        ("datetimeoffset", CommonType::Timestamp),
    ])
});

/// SQL Server type tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct MssqlTypeMap;

pub static MSSQL_TYPE_MAP: MssqlTypeMap = MssqlTypeMap;

impl ColumnTypeMap for MssqlTypeMap {
    fn dialect_name(&self) -> &'static str {
        "mssql"
    }

    fn to_common(&self, native: &str) -> Option<CommonType> {
        TO_COMMON.get(base_type_name(native).as_str()).copied()
    }

    fn from_common(&self, common: CommonType) -> &'static str {
        match common {
            CommonType::Varchar
            | CommonType::Text
            | CommonType::Mediumtext
            | CommonType::Longtext
            | CommonType::Enum
            | CommonType::Json => "nvarchar",
            CommonType::Char => "nchar",
            CommonType::Binary => "binary",
            CommonType::Varbinary
            | CommonType::Blob
            | CommonType::Mediumblob
            | CommonType::Longblob => "varbinary",
            // MySQL TINYINT is signed; SQL Server's is not.
            CommonType::Tinyint => "smallint",
            CommonType::Smallint => "smallint",
            CommonType::Int => "int",
            CommonType::Bigint => "bigint",
            CommonType::Number => "decimal",
            CommonType::Date => "date",
            CommonType::Time => "time",
            CommonType::Datetime | CommonType::Timestamp => "datetime2",
        }
    }

    fn render_type(&self, common: CommonType, col: &Column) -> String {
        let len = col.char_max_length;
        match common {
            CommonType::Varchar | CommonType::Char => {
                let native = self.from_common(common);
                if len > 0 && len <= 4000 {
                    format!("{}({})", native, len)
                } else if len == 0 {
                    format!("{}(255)", native)
                } else {
                    "nvarchar(max)".to_string()
                }
            }
            CommonType::Binary | CommonType::Varbinary => {
                let native = self.from_common(common);
                if len > 0 && len <= 8000 {
                    format!("{}({})", native, len)
                } else if len == 0 {
                    format!("{}(255)", native)
                } else {
                    "varbinary(max)".to_string()
                }
            }
            CommonType::Text
            | CommonType::Mediumtext
            | CommonType::Longtext
            | CommonType::Enum
            | CommonType::Json => "nvarchar(max)".to_string(),
            CommonType::Blob | CommonType::Mediumblob | CommonType::Longblob => {
                "varbinary(max)".to_string()
            }
            CommonType::Number => {
                if col.num_precision > 0 {
                    let p = col.num_precision.min(38);
                    format!("decimal({},{})", p, col.num_scale.clamp(0, p))
                } else {
                    "decimal(18,0)".to_string()
                }
            }
            _ => self.from_common(common).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{assert_map_consistent, convert_column};
    use crate::drivers::mysql::MYSQL_TYPE_MAP;

    #[test]
    fn test_map_consistent() {
        let natives: Vec<&str> = TO_COMMON.keys().copied().collect();
        assert_map_consistent(&MSSQL_TYPE_MAP, &natives);
    }

    #[test]
    fn test_render_type() {
        let col = |len: i64| Column {
            char_max_length: len,
            ..Default::default()
        };
        assert_eq!(MSSQL_TYPE_MAP.render_type(CommonType::Varchar, &col(100)), "nvarchar(100)");
        assert_eq!(MSSQL_TYPE_MAP.render_type(CommonType::Varchar, &col(-1)), "nvarchar(max)");
        assert_eq!(MSSQL_TYPE_MAP.render_type(CommonType::Longtext, &col(0)), "nvarchar(max)");
        assert_eq!(MSSQL_TYPE_MAP.render_type(CommonType::Blob, &col(0)), "varbinary(max)");
        assert_eq!(MSSQL_TYPE_MAP.render_type(CommonType::Number, &col(0)), "decimal(18,0)");
    }

    #[test]
    fn test_convert_mysql_column_to_mssql() {
        let col = Column {
            table_name: "users".into(),
            column_name: "created".into(),
            data_type: "timestamp".into(),
            column_type: "timestamp".into(),
            column_default: Some("CURRENT_TIMESTAMP".into()),
            ..Default::default()
        };
        let out = convert_column(&col, &MYSQL_TYPE_MAP, &MSSQL_TYPE_MAP);
        assert_eq!(out.data_type, "datetime2");
        assert_eq!(out.column_type, "datetime2");
        assert_eq!(out.column_default.as_deref(), Some("CURRENT_TIMESTAMP"));

        let col = Column {
            data_type: "varchar".into(),
            column_type: "varchar(40)".into(),
            char_max_length: 40,
            column_default: Some("uuid()".into()),
            ..Default::default()
        };
        let out = convert_column(&col, &MYSQL_TYPE_MAP, &MSSQL_TYPE_MAP);
        assert_eq!(out.column_type, "nvarchar(40)");
        assert_eq!(out.column_default, None);
    }

    #[test]
    fn test_convert_unknown_type_falls_back_to_varchar() {
        let col = Column {
            data_type: "sql_variant".into(),
            column_type: "sql_variant".into(),
            ..Default::default()
        };
        let out = convert_column(&col, &MSSQL_TYPE_MAP, &MYSQL_TYPE_MAP);
        assert_eq!(out.column_type, "varchar(255)");
    }
}
