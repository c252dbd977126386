//! Runtime values and result rows.
//!
//! Values read from either engine are normalized into [`SqlValue`]; result
//! rows keep their column names so callers can address fields by name the
//! way metadata queries alias them.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Owned SQL value used for both bound arguments and fetched fields.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL.
    Null,

    /// Boolean / bit value.
    Bool(bool),

    /// 32-bit signed integer.
    I32(i32),

    /// 64-bit signed integer.
    I64(i64),

    /// 64-bit unsigned integer (MySQL `BIGINT UNSIGNED`).
    U64(u64),

    /// 32-bit floating point.
    F32(f32),

    /// 64-bit floating point.
    F64(f64),

    /// Exact decimal.
    Decimal(Decimal),

    /// Text.
    Text(String),

    /// Binary data.
    Bytes(Vec<u8>),

    /// UUID/GUID value.
    Uuid(Uuid),

    /// Timestamp without timezone.
    DateTime(NaiveDateTime),

    /// Timestamp with timezone offset.
    DateTimeOffset(DateTime<FixedOffset>),

    /// Date without time component.
    Date(NaiveDate),

    /// Time without date component.
    Time(NaiveTime),
}

impl SqlValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Borrow the text payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Best-effort integer view used when reading metadata columns whose
    /// declared type differs between server versions.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Bool(b) => Some(i64::from(*b)),
            SqlValue::I32(v) => Some(i64::from(*v)),
            SqlValue::I64(v) => Some(*v),
            SqlValue::U64(v) => i64::try_from(*v).ok(),
            SqlValue::F32(v) => Some(*v as i64),
            SqlValue::F64(v) => Some(*v as i64),
            SqlValue::Decimal(d) => d.trunc().to_string().parse().ok(),
            SqlValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Convert to a JSON value for export.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            SqlValue::Null => Value::Null,
            SqlValue::Bool(b) => Value::Bool(*b),
            SqlValue::I32(v) => Value::from(*v),
            SqlValue::I64(v) => Value::from(*v),
            SqlValue::U64(v) => Value::from(*v),
            SqlValue::F32(v) => serde_json::Number::from_f64(f64::from(*v))
                .map(Value::Number)
                .unwrap_or(Value::Null),
            SqlValue::F64(v) => serde_json::Number::from_f64(*v)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            SqlValue::Bytes(b) => Value::String(hex(b)),
            other => Value::String(other.to_string()),
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("0x");
    for b in bytes {
        out.push_str(&format!("{:02X}", b));
    }
    out
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => Ok(()),
            SqlValue::Bool(b) => write!(f, "{}", u8::from(*b)),
            SqlValue::I32(v) => write!(f, "{}", v),
            SqlValue::I64(v) => write!(f, "{}", v),
            SqlValue::U64(v) => write!(f, "{}", v),
            SqlValue::F32(v) => write!(f, "{}", v),
            SqlValue::F64(v) => write!(f, "{}", v),
            SqlValue::Decimal(d) => write!(f, "{}", d),
            SqlValue::Text(s) => f.write_str(s),
            SqlValue::Bytes(b) => f.write_str(&hex(b)),
            SqlValue::Uuid(u) => write!(f, "{}", u),
            SqlValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.f")),
            SqlValue::DateTimeOffset(dt) => f.write_str(&dt.to_rfc3339()),
            SqlValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            SqlValue::Time(t) => write!(f, "{}", t.format("%H:%M:%S%.f")),
        }
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::I32(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::I64(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::F64(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(v)
    }
}

impl From<Decimal> for SqlValue {
    fn from(v: Decimal) -> Self {
        SqlValue::Decimal(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::DateTime(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl From<NaiveTime> for SqlValue {
    fn from(v: NaiveTime) -> Self {
        SqlValue::Time(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// One result row: an ordered field-name to value mapping.
///
/// Column names are shared between all rows of a result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<SqlValue>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<SqlValue> {
        self.values
    }

    /// Look up a field by name, ignoring ASCII case.
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .and_then(|i| self.values.get(i))
    }

    /// Field as display text; NULL and missing fields are empty.
    pub fn get_string(&self, name: &str) -> String {
        self.get(name).map(ToString::to_string).unwrap_or_default()
    }

    /// Field as an optional string; NULL and missing fields are `None`.
    pub fn get_opt_string(&self, name: &str) -> Option<String> {
        match self.get(name) {
            None | Some(SqlValue::Null) => None,
            Some(v) => Some(v.to_string()),
        }
    }

    pub fn get_i64(&self, name: &str) -> i64 {
        self.get(name).and_then(SqlValue::as_i64).unwrap_or(0)
    }

    pub fn get_bool(&self, name: &str) -> bool {
        self.get_i64(name) != 0
    }

    pub fn get_datetime(&self, name: &str) -> Option<NaiveDateTime> {
        match self.get(name)? {
            SqlValue::DateTime(dt) => Some(*dt),
            SqlValue::DateTimeOffset(dt) => Some(dt.naive_local()),
            SqlValue::Date(d) => d.and_hms_opt(0, 0, 0),
            _ => None,
        }
    }

    /// Convert to a JSON object keyed by column name.
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .columns
            .iter()
            .zip(&self.values)
            .map(|(c, v)| (c.clone(), v.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> Row {
        let cols: Arc<[String]> = vec!["tableName".to_string(), "tableRows".to_string()].into();
        Row::new(cols, vec![SqlValue::from("users"), SqlValue::U64(42)])
    }

    #[test]
    fn test_row_lookup_is_case_insensitive() {
        let r = row();
        assert_eq!(r.get_string("TABLENAME"), "users");
        assert_eq!(r.get_i64("tablerows"), 42);
        assert_eq!(r.get_string("missing"), "");
        assert_eq!(r.get_opt_string("missing"), None);
    }

    #[test]
    fn test_display_null_is_empty() {
        assert_eq!(SqlValue::Null.to_string(), "");
        assert_eq!(SqlValue::Bool(true).to_string(), "1");
        assert_eq!(SqlValue::Bytes(vec![0xAB, 0x01]).to_string(), "0xAB01");
    }

    #[test]
    fn test_as_i64_conversions() {
        assert_eq!(SqlValue::Text(" 7 ".into()).as_i64(), Some(7));
        assert_eq!(SqlValue::U64(u64::MAX).as_i64(), None);
        assert_eq!(SqlValue::Null.as_i64(), None);
    }

    #[test]
    fn test_row_to_json() {
        let json = row().to_json();
        assert_eq!(json["tableName"], "users");
        assert_eq!(json["tableRows"], 42);
    }

    #[test]
    fn test_from_option() {
        let v: SqlValue = Option::<i32>::None.into();
        assert!(v.is_null());
        let v: SqlValue = Some("a").into();
        assert_eq!(v, SqlValue::Text("a".into()));
    }
}
