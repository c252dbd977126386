//! Result-row mapping for the metadata queries.
//!
//! Both engines' metadata files alias their columns identically
//! (`tableName`, `columnName`, `isPrimaryKey`, ...), so one set of mappers
//! serves every dialect.

use crate::core::schema::{Column, Index, Table};
use crate::core::value::Row;

pub fn table_from_row(row: &Row) -> Table {
    Table {
        name: row.get_string("tableName"),
        comment: row.get_string("tableComment"),
        create_time: row.get_datetime("createTime"),
        row_count: row.get_i64("tableRows"),
        data_length: row.get_i64("dataLength"),
        index_length: row.get_i64("indexLength"),
    }
}

pub fn column_from_row(row: &Row) -> Column {
    Column {
        table_name: row.get_string("tableName"),
        column_name: row.get_string("columnName"),
        data_type: row.get_string("dataType"),
        column_type: row.get_string("columnType"),
        comment: row.get_string("columnComment"),
        nullable: row.get_bool("nullable"),
        is_primary_key: row.get_bool("isPrimaryKey"),
        is_identity: row.get_bool("isIdentity"),
        column_default: row.get_opt_string("columnDefault"),
        char_max_length: row.get_i64("charMaxLength"),
        num_precision: row.get_i64("numPrecision"),
        num_scale: row.get_i64("numScale"),
    }
}

/// One raw (index, column) row; fold with [`crate::core::fold_indexes`].
pub fn index_from_row(row: &Row) -> Index {
    Index {
        index_name: row.get_string("indexName"),
        column_name: row.get_string("columnName"),
        index_type: row.get_string("indexType"),
        comment: row.get_string("indexComment"),
        is_unique: row.get_bool("isUnique"),
        seq_in_index: row.get_i64("seqInIndex"),
        is_primary: row.get_bool("isPrimaryKey"),
    }
}

/// Primary-key and identity column names of a column list.
pub fn key_columns(columns: &[Column]) -> (Vec<String>, Vec<String>) {
    let pks = columns
        .iter()
        .filter(|c| c.is_primary_key)
        .map(|c| c.column_name.clone())
        .collect();
    let identities = columns
        .iter()
        .filter(|c| c.is_identity)
        .map(|c| c.column_name.clone())
        .collect();
    (pks, identities)
}

/// Case-insensitive membership test for column names.
pub fn contains_name(names: &[String], name: &str) -> bool {
    names.iter().any(|n| n.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::rows;
    use crate::core::value::SqlValue;

    #[test]
    fn test_column_from_row() {
        let row = rows(
            &[
                "tableName",
                "columnName",
                "dataType",
                "columnType",
                "columnComment",
                "nullable",
                "isPrimaryKey",
                "isIdentity",
                "columnDefault",
                "charMaxLength",
            ],
            vec![vec![
                SqlValue::from("users"),
                SqlValue::from("name"),
                SqlValue::from("varchar"),
                SqlValue::from("varchar(64)"),
                SqlValue::from(""),
                SqlValue::I64(1),
                SqlValue::I64(0),
                SqlValue::I64(0),
                SqlValue::Null,
                SqlValue::I64(64),
            ]],
        )
        .remove(0);

        let col = column_from_row(&row);
        assert_eq!(col.column_name, "name");
        assert_eq!(col.column_type, "varchar(64)");
        assert!(col.nullable);
        assert!(!col.is_primary_key);
        assert_eq!(col.column_default, None);
        assert_eq!(col.char_max_length, 64);
        assert_eq!(col.num_precision, 0);
    }

    #[test]
    fn test_key_columns() {
        let columns = vec![
            Column {
                column_name: "id".into(),
                is_primary_key: true,
                is_identity: true,
                ..Default::default()
            },
            Column {
                column_name: "name".into(),
                ..Default::default()
            },
        ];
        let (pks, ids) = key_columns(&columns);
        assert_eq!(pks, vec!["id"]);
        assert_eq!(ids, vec!["id"]);
        assert!(contains_name(&ids, "ID"));
        assert!(!contains_name(&ids, "name"));
    }
}
