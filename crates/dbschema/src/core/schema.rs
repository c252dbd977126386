//! Schema and metadata types for servers, tables, columns and indexes.
//!
//! Everything here is derived on demand from live metadata and discarded
//! after the call; nothing is cached across introspection calls.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{DbError, Result};

/// Server snapshot read from a single version query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbServer {
    pub version: String,
}

/// Table metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Table name.
    pub name: String,

    /// Table comment (empty when none).
    pub comment: String,

    /// Creation time as reported by the engine.
    pub create_time: Option<NaiveDateTime>,

    /// Approximate row count (engine statistics, not `COUNT(*)`).
    pub row_count: i64,

    /// Data size in bytes.
    pub data_length: i64,

    /// Index size in bytes.
    pub index_length: i64,
}

/// Column metadata.
///
/// Column order within a table is significant: DDL emission and positional
/// batch-insert binding both follow it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Owning table.
    pub table_name: String,

    /// Column name.
    pub column_name: String,

    /// Base native type name (`varchar`, `int`, ...).
    pub data_type: String,

    /// Full native type including length/precision (`varchar(255)`).
    pub column_type: String,

    /// Column comment (empty when none).
    pub comment: String,

    pub nullable: bool,

    pub is_primary_key: bool,

    /// Identity (SQL Server) or AUTO_INCREMENT (MySQL).
    pub is_identity: bool,

    /// Raw default expression as stored by the engine.
    pub column_default: Option<String>,

    /// Character length; -1 for MAX types, 0 when not applicable.
    pub char_max_length: i64,

    pub num_precision: i64,

    pub num_scale: i64,
}

impl Column {
    /// Full type string, falling back to the base type.
    pub fn full_type(&self) -> &str {
        if self.column_type.is_empty() {
            &self.data_type
        } else {
            &self.column_type
        }
    }
}

/// Index metadata.
///
/// A folded index carries all of its key columns in `column_name`,
/// comma-joined in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub index_name: String,

    /// Key column(s), comma-joined when the index spans several columns.
    pub column_name: String,

    /// Engine index type (`BTREE`, `NONCLUSTERED`, ...).
    pub index_type: String,

    pub comment: String,

    pub is_unique: bool,

    /// Position of `column_name` within the index (1-based) for raw rows.
    pub seq_in_index: i64,

    /// Backs the primary key constraint.
    pub is_primary: bool,
}

impl Index {
    /// Key columns in order.
    pub fn columns(&self) -> Vec<&str> {
        self.column_name
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect()
    }
}

/// Fold raw (index, column) rows into one entry per index.
///
/// Rows arrive ordered by (index name, sequence). Consecutive rows sharing a
/// name are merged; their columns are joined with `,` in `seq_in_index`
/// order, so a stray out-of-order row cannot reorder the key.
pub fn fold_indexes(rows: Vec<Index>) -> Vec<Index> {
    let mut folded: Vec<(Index, Vec<(i64, String)>)> = Vec::new();

    for row in rows {
        match folded.last_mut() {
            Some((head, cols)) if head.index_name == row.index_name => {
                cols.push((row.seq_in_index, row.column_name));
            }
            _ => {
                let cols = vec![(row.seq_in_index, row.column_name.clone())];
                folded.push((row, cols));
            }
        }
    }

    folded
        .into_iter()
        .map(|(mut index, mut cols)| {
            cols.sort_by_key(|(seq, _)| *seq);
            index.seq_in_index = cols.first().map(|(seq, _)| *seq).unwrap_or(1);
            index.column_name = cols
                .into_iter()
                .map(|(_, c)| c)
                .collect::<Vec<_>>()
                .join(",");
            index
        })
        .collect()
}

/// Resolve the identifying column of a table.
///
/// Returns the first column flagged as primary key, else the first column in
/// declaration order. Fails with `TableNotFound` when there are no columns.
pub fn resolve_primary_key(table: &str, columns: &[Column]) -> Result<String> {
    let first = columns
        .first()
        .ok_or_else(|| DbError::TableNotFound(table.to_string()))?;

    Ok(columns
        .iter()
        .find(|c| c.is_primary_key)
        .unwrap_or(first)
        .column_name
        .clone())
}

/// Union of the key columns of every unique index, first-seen order.
pub fn unique_key_columns(indexes: &[Index]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for index in indexes.iter().filter(|i| i.is_unique) {
        for col in index.columns() {
            if !out.iter().any(|c| c.eq_ignore_ascii_case(col)) {
                out.push(col.to_string());
            }
        }
    }
    out
}

/// How batch insert treats rows colliding with existing keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateStrategy {
    /// Plain insert; collisions fail the statement.
    #[default]
    None,
    /// Silently drop colliding rows.
    Ignore,
    /// Merge: update matched rows, insert the rest.
    Update,
}

impl fmt::Display for DuplicateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DuplicateStrategy::None => "none",
            DuplicateStrategy::Ignore => "ignore",
            DuplicateStrategy::Update => "update",
        };
        f.write_str(s)
    }
}

impl FromStr for DuplicateStrategy {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "none" | "insert" => Ok(DuplicateStrategy::None),
            "ignore" => Ok(DuplicateStrategy::Ignore),
            "update" | "merge" | "upsert" => Ok(DuplicateStrategy::Update),
            other => Err(DbError::Config(format!(
                "unknown duplicate strategy '{}', expected none|ignore|update",
                other
            ))),
        }
    }
}

/// Table copy request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbCopyTable {
    pub table_name: String,
    /// Also copy rows in the background after the structure is created.
    pub copy_data: bool,
}

impl DbCopyTable {
    /// Name of the copy: `<table>_copy_<YYYYmmddHHMMSS>`.
    pub fn new_table_name(&self, now: NaiveDateTime) -> String {
        format!("{}_copy_{}", self.table_name, now.format("%Y%m%d%H%M%S"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn idx(name: &str, col: &str, seq: i64, unique: bool) -> Index {
        Index {
            index_name: name.to_string(),
            column_name: col.to_string(),
            index_type: "BTREE".to_string(),
            is_unique: unique,
            seq_in_index: seq,
            ..Default::default()
        }
    }

    fn col(name: &str, pk: bool) -> Column {
        Column {
            table_name: "t".to_string(),
            column_name: name.to_string(),
            data_type: "int".to_string(),
            is_primary_key: pk,
            ..Default::default()
        }
    }

    #[test]
    fn test_fold_indexes_joins_in_sequence_order() {
        let rows = vec![
            idx("idx_a", "a", 1, false),
            idx("idx_ab", "b", 2, true),
            idx("idx_ab", "a", 1, true),
            idx("idx_ab", "c", 3, true),
        ];
        let folded = fold_indexes(rows);
        assert_eq!(folded.len(), 2);
        assert_eq!(folded[0].column_name, "a");
        assert_eq!(folded[1].index_name, "idx_ab");
        assert_eq!(folded[1].column_name, "a,b,c");
        assert_eq!(folded[1].seq_in_index, 1);
        assert_eq!(folded[1].columns(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_fold_indexes_empty() {
        assert!(fold_indexes(Vec::new()).is_empty());
    }

    #[test]
    fn test_resolve_primary_key() {
        let cols = vec![col("a", false), col("b", true), col("c", true)];
        assert_eq!(resolve_primary_key("t", &cols).unwrap(), "b");
    }

    #[test]
    fn test_resolve_primary_key_falls_back_to_first_column() {
        let cols = vec![col("first", false), col("second", false)];
        assert_eq!(resolve_primary_key("t", &cols).unwrap(), "first");
    }

    #[test]
    fn test_resolve_primary_key_no_columns() {
        let err = resolve_primary_key("ghost", &[]).unwrap_err();
        assert!(matches!(err, DbError::TableNotFound(t) if t == "ghost"));
    }

    #[test]
    fn test_unique_key_columns_union() {
        let indexes = vec![
            Index {
                column_name: "id".into(),
                is_unique: true,
                is_primary: true,
                ..Default::default()
            },
            Index {
                column_name: "email,ID".into(),
                is_unique: true,
                ..Default::default()
            },
            Index {
                column_name: "name".into(),
                is_unique: false,
                ..Default::default()
            },
        ];
        assert_eq!(unique_key_columns(&indexes), vec!["id", "email"]);
    }

    #[test]
    fn test_duplicate_strategy_parse() {
        assert_eq!("merge".parse::<DuplicateStrategy>().unwrap(), DuplicateStrategy::Update);
        assert_eq!("IGNORE".parse::<DuplicateStrategy>().unwrap(), DuplicateStrategy::Ignore);
        assert!("replace".parse::<DuplicateStrategy>().is_err());
    }

    #[test]
    fn test_copy_table_name() {
        let now = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(8, 5, 7)
            .unwrap();
        let spec = DbCopyTable {
            table_name: "orders".into(),
            copy_data: false,
        };
        assert_eq!(spec.new_table_name(now), "orders_copy_20240309080507");
    }
}
