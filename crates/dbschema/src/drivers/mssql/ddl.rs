//! SQL Server DDL generation.
//!
//! Comments become `MS_Description` extended properties, since T-SQL has no
//! inline `COMMENT` clause.

use crate::core::identifier::{escape_literal, qualify_mssql, quote_mssql};
use crate::core::schema::{Column, Index, Table};
use crate::error::Result;

/// `N'text'` with single quotes doubled.
pub fn quote_literal(text: &str) -> String {
    format!("N'{}'", escape_literal(text, false))
}

/// Render a column default, or `None` for an empty one.
///
/// SQL Server reports defaults wrapped in parentheses, e.g. `((0))` or
/// `(getdate())`, which are valid as written.
fn default_clause(col: &Column) -> Option<String> {
    let default = col.column_default.as_deref()?.trim();
    if default.is_empty() || default.eq_ignore_ascii_case("NULL") {
        return None;
    }
    if default.starts_with('(') || default.starts_with('\'') || default.starts_with("N'") {
        return Some(default.to_string());
    }
    let ty = col.full_type().to_lowercase();
    if ["char", "text", "date", "time", "xml"].iter().any(|t| ty.contains(t)) {
        Some(quote_literal(default))
    } else {
        Some(default.to_string())
    }
}

/// One column definition line.
pub fn column_definition(col: &Column) -> Result<String> {
    let mut sql = format!("{} {}", quote_mssql(&col.column_name)?, col.full_type());
    sql.push_str(if col.nullable { " NULL" } else { " NOT NULL" });
    if col.is_identity {
        sql.push_str(" IDENTITY(1,1)");
    }
    if let Some(default) = default_clause(col) {
        sql.push_str(" DEFAULT ");
        sql.push_str(&default);
    }
    Ok(sql)
}

/// `EXEC sp_addextendedproperty` for a table, column or index description.
fn description(schema: &str, table: &str, level2: Option<(&str, &str)>, text: &str) -> String {
    let mut sql = format!(
        "EXEC sp_addextendedproperty N'MS_Description', {}, N'SCHEMA', {}, N'TABLE', {}",
        quote_literal(text),
        quote_literal(schema),
        quote_literal(table)
    );
    if let Some((kind, name)) = level2 {
        sql.push_str(&format!(", N'{}', {}", kind, quote_literal(name)));
    }
    sql
}

/// `CREATE TABLE` for a column model in `schema`, optionally preceded by a
/// drop, followed by description statements for any comments.
pub fn table_ddl(
    schema: &str,
    table: &Table,
    columns: &[Column],
    drop_before_create: bool,
) -> Result<Vec<String>> {
    let name = qualify_mssql(schema, &table.name)?;
    let mut statements = Vec::new();
    if drop_before_create {
        statements.push(format!("DROP TABLE IF EXISTS {}", name));
    }

    let mut lines = columns
        .iter()
        .map(|c| column_definition(c).map(|def| format!("\t{}", def)))
        .collect::<Result<Vec<_>>>()?;

    let pks = columns
        .iter()
        .filter(|c| c.is_primary_key)
        .map(|c| quote_mssql(&c.column_name))
        .collect::<Result<Vec<_>>>()?;
    if !pks.is_empty() {
        lines.push(format!(
            "\tCONSTRAINT {} PRIMARY KEY ({})",
            quote_mssql(&format!("PK_{}", table.name))?,
            pks.join(",")
        ));
    }

    statements.push(format!("CREATE TABLE {} (\n{}\n)", name, lines.join(",\n")));

    if !table.comment.is_empty() {
        statements.push(description(schema, &table.name, None, &table.comment));
    }
    for col in columns.iter().filter(|c| !c.comment.is_empty()) {
        statements.push(description(
            schema,
            &table.name,
            Some(("COLUMN", &col.column_name)),
            &col.comment,
        ));
    }
    Ok(statements)
}

/// `CREATE INDEX` statements for an index model.
pub fn index_ddl(schema: &str, table: &Table, indexes: &[Index]) -> Result<Vec<String>> {
    let target = qualify_mssql(schema, &table.name)?;
    let mut statements = Vec::new();
    for index in indexes {
        let cols = index
            .columns()
            .into_iter()
            .map(quote_mssql)
            .collect::<Result<Vec<_>>>()?;
        let unique = if index.is_unique { "UNIQUE " } else { "" };
        statements.push(format!(
            "CREATE {}NONCLUSTERED INDEX {} ON {} ({})",
            unique,
            quote_mssql(&index.index_name)?,
            target,
            cols.join(", ")
        ));
        if !index.comment.is_empty() {
            statements.push(description(
                schema,
                &table.name,
                Some(("INDEX", &index.index_name)),
                &index.comment,
            ));
        }
    }
    Ok(statements)
}
