//! Engine-agnostic pieces of the batch loader.
//!
//! Placeholder generation, row-major argument flattening and splitting of
//! large batches under an engine's bind-parameter limit. Each dialect builds
//! its own statements on top of these.

use tracing::error;

use crate::core::traits::SqlExecutor;
use crate::core::value::SqlValue;
use crate::error::{DbError, Result};

/// Positional placeholder syntax of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `?` (MySQL).
    Question,
    /// `@P1`, `@P2`, ... (SQL Server / TDS).
    AtP,
}

impl PlaceholderStyle {
    /// Placeholder for the 1-based parameter `n`.
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            PlaceholderStyle::Question => "?".to_string(),
            PlaceholderStyle::AtP => format!("@P{}", n),
        }
    }

    /// `count` comma-separated placeholders numbered from `start`.
    pub fn list(&self, start: usize, count: usize) -> String {
        (start..start + count)
            .map(|n| self.placeholder(n))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `rows` parenthesized groups of `cols` placeholders: `(?, ?), (?, ?)`.
    pub fn value_groups(&self, start: usize, rows: usize, cols: usize) -> String {
        (0..rows)
            .map(|r| format!("({})", self.list(start + r * cols, cols)))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Bind-parameter limits of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamLimits {
    pub max_params: usize,
    pub max_rows: usize,
}

impl ParamLimits {
    /// SQL Server: 2100 parameters per RPC, two of which are the
    /// `sp_executesql` statement and declaration; 1000 rows per VALUES list.
    pub const MSSQL: ParamLimits = ParamLimits {
        max_params: 2098,
        max_rows: 1000,
    };

    /// MySQL: 65535 placeholders per prepared statement.
    pub const MYSQL: ParamLimits = ParamLimits {
        max_params: 65535,
        max_rows: usize::MAX,
    };

    /// Rows that fit in one statement with `cols` values each.
    pub fn rows_per_statement(&self, cols: usize) -> usize {
        (self.max_params / cols.max(1)).clamp(1, self.max_rows)
    }
}

/// Flatten a row matrix into one argument sequence in row-major order.
pub fn flatten_rows(rows: &[Vec<SqlValue>]) -> Vec<SqlValue> {
    rows.iter().flat_map(|row| row.iter().cloned()).collect()
}

/// Reject batches whose rows do not match the column list.
pub fn check_row_widths(table: &str, columns: &[String], rows: &[Vec<SqlValue>]) -> Result<()> {
    if columns.is_empty() {
        return Err(DbError::Query(format!(
            "cannot insert into {} with zero columns",
            table
        )));
    }
    if let Some((i, row)) = rows
        .iter()
        .enumerate()
        .find(|(_, row)| row.len() != columns.len())
    {
        return Err(DbError::Query(format!(
            "row {} for {} has {} values, expected {}",
            i,
            table,
            row.len(),
            columns.len()
        )));
    }
    Ok(())
}

/// Execute a generated statement. On failure the statement text is logged;
/// the returned error carries only the driver message.
pub async fn execute_logged(exec: &dyn SqlExecutor, sql: &str, args: &[SqlValue]) -> Result<u64> {
    exec.execute(sql, args)
        .await
        .inspect_err(|e| error!("Failed to execute sql: {}, sql: [ {} ]", e, sql))
}
