//! MySQL native type ↔ common type tables.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::core::schema::Column;
use crate::dialect::{base_type_name, ColumnTypeMap, CommonType};

/// Longest `varchar` that fits a utf8mb4 row.
const MAX_VARCHAR: i64 = 16383;

static TO_COMMON: LazyLock<HashMap<&'static str, CommonType>> = LazyLock::new(|| {
    HashMap::from([
        ("bigint", CommonType::Bigint),
        ("binary", CommonType::Binary),
        ("bit", CommonType::Tinyint),
        ("blob", CommonType::Blob),
        ("bool", CommonType::Tinyint),
        ("boolean", CommonType::Tinyint),
        ("char", CommonType::Char),
        ("date", CommonType::Date),
        ("datetime", CommonType::Datetime),
        ("decimal", CommonType::Number),
        ("double", CommonType::Number),
        ("enum", CommonType::Enum),
        ("float", CommonType::Number),
        ("int", CommonType::Int),
        ("integer", CommonType::Int),
        ("json", CommonType::Json),
        ("longblob", CommonType::Longblob),
        ("longtext", CommonType::Longtext),
        ("mediumblob", CommonType::Mediumblob),
        ("mediumint", CommonType::Int),
        ("mediumtext", CommonType::Mediumtext),
        ("numeric", CommonType::Number),
        ("real", CommonType::Number),
        ("set", CommonType::Varchar),
        ("smallint", CommonType::Smallint),
        ("text", CommonType::Text),
        ("time", CommonType::Time),
        ("timestamp", CommonType::Timestamp),
        ("tinyblob", CommonType::Blob),
        ("tinyint", CommonType::Tinyint),
        ("tinytext", CommonType::Text),
        ("varbinary", CommonType::Varbinary),
        ("varchar", CommonType::Varchar),
        ("year", CommonType::Smallint),
    ])
});

/// MySQL / MariaDB type tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlTypeMap;

pub static MYSQL_TYPE_MAP: MysqlTypeMap = MysqlTypeMap;

impl ColumnTypeMap for MysqlTypeMap {
    fn dialect_name(&self) -> &'static str {
        "mysql"
    }

    fn to_common(&self, native: &str) -> Option<CommonType> {
        TO_COMMON.get(base_type_name(native).as_str()).copied()
    }

    fn from_common(&self, common: CommonType) -> &'static str {
        match common {
            CommonType::Varchar => "varchar",
            CommonType::Char => "char",
            CommonType::Text => "text",
            CommonType::Mediumtext => "mediumtext",
            CommonType::Longtext => "longtext",
            CommonType::Enum => "enum",
            CommonType::Json => "json",
            CommonType::Binary => "binary",
            CommonType::Varbinary => "varbinary",
            CommonType::Blob => "blob",
            CommonType::Mediumblob => "mediumblob",
            CommonType::Longblob => "longblob",
            CommonType::Tinyint => "tinyint",
            CommonType::Smallint => "smallint",
            CommonType::Int => "int",
            CommonType::Bigint => "bigint",
            CommonType::Number => "decimal",
            CommonType::Date => "date",
            CommonType::Time => "time",
            CommonType::Datetime => "datetime",
            CommonType::Timestamp => "timestamp",
        }
    }

    fn render_type(&self, common: CommonType, col: &Column) -> String {
        let len = col.char_max_length;
        match common {
            CommonType::Varchar | CommonType::Char => {
                if len < 0 || len > MAX_VARCHAR {
                    "longtext".to_string()
                } else if len == 0 {
                    "varchar(255)".to_string()
                } else if common == CommonType::Char && len <= 255 {
                    format!("char({})", len)
                } else {
                    format!("varchar({})", len)
                }
            }
            CommonType::Binary | CommonType::Varbinary => {
                if len < 0 || len > 65535 {
                    "longblob".to_string()
                } else if len == 0 {
                    "varbinary(255)".to_string()
                } else if common == CommonType::Binary && len <= 255 {
                    format!("binary({})", len)
                } else {
                    format!("varbinary({})", len)
                }
            }
            // Value lists do not survive a trip through the common type.
            CommonType::Enum => "varchar(255)".to_string(),
            CommonType::Number if col.num_precision > 0 => format!(
                "decimal({},{})",
                col.num_precision.min(65),
                col.num_scale.clamp(0, 30)
            ),
            _ => self.from_common(common).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::assert_map_consistent;

    #[test]
    fn test_map_consistent() {
        let natives: Vec<&str> = TO_COMMON.keys().copied().collect();
        assert_map_consistent(&MYSQL_TYPE_MAP, &natives);
    }

    #[test]
    fn test_to_common_ignores_case_and_length() {
        assert_eq!(MYSQL_TYPE_MAP.to_common("VARCHAR(64)"), Some(CommonType::Varchar));
        assert_eq!(MYSQL_TYPE_MAP.to_common("decimal(10,2)"), Some(CommonType::Number));
        assert_eq!(MYSQL_TYPE_MAP.to_common("geometry"), None);
    }

    #[test]
    fn test_render_type() {
        let col = |len: i64| Column {
            char_max_length: len,
            ..Default::default()
        };
        assert_eq!(MYSQL_TYPE_MAP.render_type(CommonType::Varchar, &col(50)), "varchar(50)");
        assert_eq!(MYSQL_TYPE_MAP.render_type(CommonType::Varchar, &col(-1)), "longtext");
        assert_eq!(MYSQL_TYPE_MAP.render_type(CommonType::Char, &col(10)), "char(10)");
        assert_eq!(MYSQL_TYPE_MAP.render_type(CommonType::Varbinary, &col(0)), "varbinary(255)");

        let num = Column {
            num_precision: 10,
            num_scale: 2,
            ..Default::default()
        };
        assert_eq!(MYSQL_TYPE_MAP.render_type(CommonType::Number, &num), "decimal(10,2)");
        assert_eq!(MYSQL_TYPE_MAP.render_type(CommonType::Int, &num), "int");
    }
}
