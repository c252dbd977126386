//! MySQL data converter.

use crate::core::traits::DataConverter;
use crate::core::value::SqlValue;
use crate::dialect::converter::{parse_date_or_zero, parse_datetime_or_zero, parse_time_or_zero};
use crate::dialect::{classify_type, DataType};

const DATETIME_LAYOUT: &str = "%Y-%m-%d %H:%M:%S%.f";
const DATE_LAYOUT: &str = "%Y-%m-%d";
const TIME_LAYOUT: &str = "%H:%M:%S%.f";

#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlConverter;

pub static MYSQL_CONVERTER: MysqlConverter = MysqlConverter;

impl DataConverter for MysqlConverter {
    fn get_data_type(&self, column_type: &str) -> DataType {
        classify_type(column_type)
    }

    fn parse_data(&self, value: SqlValue, data_type: DataType) -> SqlValue {
        let SqlValue::Text(text) = &value else {
            return value;
        };
        match data_type {
            DataType::DateTime => SqlValue::DateTime(parse_datetime_or_zero(text, DATETIME_LAYOUT)),
            DataType::Date => SqlValue::Date(parse_date_or_zero(text, DATE_LAYOUT)),
            DataType::Time => SqlValue::Time(parse_time_or_zero(text, TIME_LAYOUT)),
            _ => value,
        }
    }
}
