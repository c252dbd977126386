//! SQL Server data converter. Timestamps are exchanged as RFC 3339.

use crate::core::traits::DataConverter;
use crate::core::value::SqlValue;
use crate::dialect::converter::{parse_date_or_zero, parse_rfc3339_or_zero, parse_time_or_zero};
use crate::dialect::{classify_type, DataType};

const DATE_LAYOUT: &str = "%Y-%m-%d";
const TIME_LAYOUT: &str = "%H:%M:%S%.f";

#[derive(Debug, Clone, Copy, Default)]
pub struct MssqlConverter;

pub static MSSQL_CONVERTER: MssqlConverter = MssqlConverter;

impl DataConverter for MssqlConverter {
    fn get_data_type(&self, column_type: &str) -> DataType {
        classify_type(column_type)
    }

    fn parse_data(&self, value: SqlValue, data_type: DataType) -> SqlValue {
        let SqlValue::Text(text) = &value else {
            return value;
        };
        match data_type {
            DataType::DateTime => SqlValue::DateTimeOffset(parse_rfc3339_or_zero(text)),
            DataType::Date => SqlValue::Date(parse_date_or_zero(text, DATE_LAYOUT)),
            DataType::Time => SqlValue::Time(parse_time_or_zero(text, TIME_LAYOUT)),
            _ => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_parse_date() {
        let parsed = MSSQL_CONVERTER.parse_data(SqlValue::from("2024-01-05"), DataType::Date);
        assert_eq!(parsed, SqlValue::Date(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()));

        let zero = MSSQL_CONVERTER.parse_data(SqlValue::from("not-a-date"), DataType::Date);
        assert_eq!(zero, SqlValue::Date(NaiveDate::from_ymd_opt(1, 1, 1).unwrap()));
    }

    #[test]
    fn test_parse_rfc3339() {
        let parsed = MSSQL_CONVERTER.parse_data(
            SqlValue::from("2024-01-05T10:20:30+02:00"),
            DataType::DateTime,
        );
        match parsed {
            SqlValue::DateTimeOffset(dt) => {
                assert_eq!(dt.offset().local_minus_utc(), 7200);
                assert_eq!(dt.naive_local().to_string(), "2024-01-05 10:20:30");
            }
            other => panic!("unexpected {:?}", other),
        }

        let zero = MSSQL_CONVERTER.parse_data(SqlValue::from("2024-01-05 10:20"), DataType::DateTime);
        assert!(zero.to_string().starts_with("0001-01-01"));
    }

    #[test]
    fn test_get_data_type() {
        assert_eq!(MSSQL_CONVERTER.get_data_type("datetimeoffset"), DataType::DateTime);
        assert_eq!(MSSQL_CONVERTER.get_data_type("smallint"), DataType::Number);
        assert_eq!(MSSQL_CONVERTER.get_data_type("uniqueidentifier"), DataType::String);
    }
}
