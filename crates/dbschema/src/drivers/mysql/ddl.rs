//! MySQL DDL generation.

use crate::core::identifier::{escape_literal, quote_mysql};
use crate::core::schema::{Column, Index, Table};
use crate::error::Result;

const TABLE_OPTIONS: &str = "ENGINE=InnoDB DEFAULT CHARSET=utf8mb4";

/// MySQL identifier length limit, in characters.
const MAX_NAME_CHARS: usize = 64;

/// Type fragments whose defaults are written as string literals.
const QUOTED_DEFAULT_TYPES: [&str; 9] = [
    "char", "text", "lob", "date", "time", "enum", "set", "binary", "json",
];

/// `'text'` with backslashes and quotes escaped.
pub fn quote_literal(text: &str) -> String {
    format!("'{}'", escape_literal(text, true))
}

/// Render a column default, or `None` when it cannot be carried over.
///
/// Function-call defaults are dropped since another engine may lack the
/// function. Textual and temporal defaults are quoted unless the default of
/// a temporal column is itself a date/time keyword.
fn default_clause(col: &Column) -> Option<String> {
    let default = col.column_default.as_deref()?.trim();
    if default.is_empty() || default.contains('(') || default.eq_ignore_ascii_case("NULL") {
        return None;
    }
    if default.starts_with('\'') {
        return Some(default.to_string());
    }

    let ty = col.full_type().to_lowercase();
    let textual = QUOTED_DEFAULT_TYPES.iter().any(|t| ty.contains(t));
    let temporal = ty.contains("date") || ty.contains("time");
    let keyword = {
        let upper = default.to_uppercase();
        upper.contains("DATE") || upper.contains("TIME")
    };

    if textual && !(temporal && keyword) {
        Some(quote_literal(default))
    } else {
        Some(default.to_string())
    }
}

/// One column definition line.
pub fn column_definition(col: &Column) -> Result<String> {
    let mut sql = format!("{} {}", quote_mysql(&col.column_name)?, col.full_type());
    if !col.nullable {
        sql.push_str(" NOT NULL");
    }
    if col.is_identity {
        sql.push_str(" AUTO_INCREMENT");
    }
    if let Some(default) = default_clause(col) {
        sql.push_str(" DEFAULT ");
        sql.push_str(&default);
    }
    if !col.comment.is_empty() {
        sql.push_str(&format!(" COMMENT {}", quote_literal(&col.comment)));
    }
    Ok(sql)
}

/// `CREATE TABLE` for a column model, optionally preceded by a drop.
pub fn table_ddl(table: &Table, columns: &[Column], drop_before_create: bool) -> Result<Vec<String>> {
    let name = quote_mysql(&table.name)?;
    let mut statements = Vec::new();
    if drop_before_create {
        statements.push(format!("DROP TABLE IF EXISTS {}", name));
    }

    let mut lines = columns
        .iter()
        .map(|c| column_definition(c).map(|def| format!("  {}", def)))
        .collect::<Result<Vec<_>>>()?;

    let pks = columns
        .iter()
        .filter(|c| c.is_primary_key)
        .map(|c| quote_mysql(&c.column_name))
        .collect::<Result<Vec<_>>>()?;
    if !pks.is_empty() {
        lines.push(format!("  PRIMARY KEY ({})", pks.join(", ")));
    }

    let mut create = format!(
        "CREATE TABLE {} (\n{}\n) {}",
        name,
        lines.join(",\n"),
        TABLE_OPTIONS
    );
    if !table.comment.is_empty() {
        create.push_str(&format!(" COMMENT {}", quote_literal(&table.comment)));
    }
    statements.push(create);
    Ok(statements)
}

/// Name for an index in generated DDL.
///
/// Index names are scoped per table, so the introspected name is reused.
/// Unnamed indexes get `{normal|unique}_key_<cols>`. Either is cut to 64
/// characters, since models converted from SQL Server allow 128.
pub fn index_name(index: &Index) -> String {
    let name = if index.index_name.is_empty() {
        let kind = if index.is_unique { "unique" } else { "normal" };
        format!("{}_key_{}", kind, index.columns().join("_"))
    } else {
        index.index_name.clone()
    };
    name.chars().take(MAX_NAME_CHARS).collect()
}

/// `ALTER TABLE ... ADD INDEX` statements for an index model.
pub fn index_ddl(table: &Table, indexes: &[Index]) -> Result<Vec<String>> {
    let table_name = quote_mysql(&table.name)?;
    indexes
        .iter()
        .map(|index| {
            let cols = index
                .columns()
                .into_iter()
                .map(quote_mysql)
                .collect::<Result<Vec<_>>>()?;
            let unique = if index.is_unique { "UNIQUE " } else { "" };
            let mut sql = format!(
                "ALTER TABLE {} ADD {}INDEX {}({}) USING BTREE",
                table_name,
                unique,
                quote_mysql(&index_name(index))?,
                cols.join(", ")
            );
            if !index.comment.is_empty() {
                sql.push_str(&format!(" COMMENT {}", quote_literal(&index.comment)));
            }
            Ok(sql)
        })
        .collect()
}
