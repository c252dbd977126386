//! SQL Server batch loader.
//!
//! Multi-row `INSERT ... VALUES` with `@Pn` parameters, chunked so a
//! statement binds at most 2098 values in at most 1000 rows. T-SQL has no
//! insert-or-ignore verb, so duplicates are handled with session tricks:
//!
//! - `Ignore`: a temporary unique constraint with `IGNORE_DUP_KEY = ON`
//!   over the table's unique key columns, dropped afterwards
//! - `Update`: `MERGE` keyed on the primary key
//!
//! When an inserted column is an identity column, `IDENTITY_INSERT` is
//! switched on for the duration of the batch. All of this relies on every
//! statement running on the same session.

use chrono::Local;
use tracing::{debug, warn};

use crate::core::identifier::{qualify_mssql, quote_mssql, unquote_ident};
use crate::core::schema::{unique_key_columns, DuplicateStrategy};
use crate::core::traits::SqlExecutor;
use crate::core::value::SqlValue;
use crate::drivers::common::{
    check_row_widths, contains_name, execute_logged, flatten_rows, key_columns, ParamLimits,
    PlaceholderStyle,
};
use crate::error::Result;

use super::MssqlDialect;

impl MssqlDialect {
    pub(super) async fn write_rows(
        &self,
        exec: &dyn SqlExecutor,
        table: &str,
        columns: &[String],
        rows: &[Vec<SqlValue>],
        strategy: DuplicateStrategy,
    ) -> Result<u64> {
        check_row_widths(table, columns, rows)?;
        if rows.is_empty() {
            return Ok(0);
        }

        let target = qualify_mssql(&self.schema, table)?;
        let meta = self.load_columns(exec, &[table.to_string()]).await?;
        let (pks, identities) = key_columns(&meta);
        let identity_insert = columns.iter().any(|c| contains_name(&identities, c));

        if identity_insert {
            exec.execute(&format!("SET IDENTITY_INSERT {} ON", target), &[])
                .await?;
        }

        let result = match strategy {
            DuplicateStrategy::None => insert_chunks(exec, &target, columns, rows).await,
            DuplicateStrategy::Ignore => {
                self.insert_ignoring(exec, table, &target, columns, rows)
                    .await
            }
            DuplicateStrategy::Update => {
                let keys: Vec<String> = pks
                    .into_iter()
                    .filter(|pk| contains_name(columns, pk))
                    .collect();
                if keys.is_empty() {
                    debug!("{} has no primary key among inserted columns, update strategy inserts plainly", table);
                    insert_chunks(exec, &target, columns, rows).await
                } else {
                    merge_chunks(exec, &target, columns, rows, &keys, &identities).await
                }
            }
        };

        if identity_insert {
            let off = format!("SET IDENTITY_INSERT {} OFF", target);
            if let Err(e) = exec.execute(&off, &[]).await {
                warn!("Failed to reset identity insert on {}: {}", target, e);
            }
        }
        result
    }

    /// Insert under a temporary `IGNORE_DUP_KEY` constraint.
    ///
    /// The constraint is dropped whether or not the insert succeeds.
    async fn insert_ignoring(
        &self,
        exec: &dyn SqlExecutor,
        table: &str,
        target: &str,
        columns: &[String],
        rows: &[Vec<SqlValue>],
    ) -> Result<u64> {
        let indexes = self.load_indexes(exec, table).await?;
        let unique = unique_key_columns(&indexes);
        if unique.is_empty() {
            debug!("{} has no unique key, ignore strategy inserts plainly", table);
            return insert_chunks(exec, target, columns, rows).await;
        }

        let constraint = quote_mssql(&temp_constraint_name(
            table,
            &Local::now().format("%Y%m%d%H%M%S").to_string(),
        ))?;
        let key_list = unique
            .iter()
            .map(|c| quote_mssql(c))
            .collect::<Result<Vec<_>>>()?
            .join(", ");

        execute_logged(
            exec,
            &format!(
                "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({}) WITH (IGNORE_DUP_KEY = ON)",
                target, constraint, key_list
            ),
            &[],
        )
        .await?;

        let result = insert_chunks(exec, target, columns, rows).await;

        let drop = format!("ALTER TABLE {} DROP CONSTRAINT {}", target, constraint);
        if let Err(e) = exec.execute(&drop, &[]).await {
            warn!("Failed to drop temporary constraint {} on {}: {}", constraint, target, e);
        }
        result
    }
}

/// Bytes of the table name kept in `UQ_tmp_<table>_<yyyymmddhhmmss>` so
/// the constraint name stays within 128 characters.
const TEMP_CONSTRAINT_TABLE_BYTES: usize = 128 - "UQ_tmp_".len() - 1 - 14;

fn temp_constraint_name(table: &str, stamp: &str) -> String {
    let table = unquote_ident(table);
    let mut end = table.len().min(TEMP_CONSTRAINT_TABLE_BYTES);
    while !table.is_char_boundary(end) {
        end -= 1;
    }
    format!("UQ_tmp_{}_{}", &table[..end], stamp)
}

fn quoted_list(columns: &[String]) -> Result<Vec<String>> {
    columns.iter().map(|c| quote_mssql(c)).collect()
}

async fn insert_chunks(
    exec: &dyn SqlExecutor,
    target: &str,
    columns: &[String],
    rows: &[Vec<SqlValue>],
) -> Result<u64> {
    let col_list = quoted_list(columns)?.join(", ");
    let per_statement = ParamLimits::MSSQL.rows_per_statement(columns.len());

    let mut affected = 0;
    for chunk in rows.chunks(per_statement) {
        let sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            target,
            col_list,
            PlaceholderStyle::AtP.value_groups(1, chunk.len(), columns.len())
        );
        affected += execute_logged(exec, &sql, &flatten_rows(chunk)).await?;
    }

    debug!("MSSQL: wrote {} rows to {}", rows.len(), target);
    Ok(affected)
}

/// `MERGE` statement for one chunk of rows.
fn merge_sql(
    target: &str,
    columns: &[String],
    row_count: usize,
    keys: &[String],
    identities: &[String],
) -> Result<String> {
    let quoted = quoted_list(columns)?;
    let style = PlaceholderStyle::AtP;

    let source = (0..row_count)
        .map(|r| {
            let values = quoted
                .iter()
                .enumerate()
                .map(|(i, q)| {
                    let p = style.placeholder(r * columns.len() + i + 1);
                    if r == 0 {
                        format!("{} AS {}", p, q)
                    } else {
                        p
                    }
                })
                .collect::<Vec<_>>();
            format!("SELECT {}", values.join(", "))
        })
        .collect::<Vec<_>>()
        .join(" UNION ALL ");

    let on = quoted_list(keys)?
        .iter()
        .map(|k| format!("target.{k} = source.{k}"))
        .collect::<Vec<_>>()
        .join(" AND ");

    let updates = columns
        .iter()
        .zip(&quoted)
        .filter(|(c, _)| !contains_name(keys, c) && !contains_name(identities, c))
        .map(|(_, q)| format!("target.{q} = source.{q}"))
        .collect::<Vec<_>>();

    let mut sql = format!(
        "MERGE INTO {} AS target USING ({}) AS source ON {}",
        target, source, on
    );
    if !updates.is_empty() {
        sql.push_str(&format!(" WHEN MATCHED THEN UPDATE SET {}", updates.join(", ")));
    }
    sql.push_str(&format!(
        " WHEN NOT MATCHED THEN INSERT ({}) VALUES ({});",
        quoted.join(", "),
        quoted
            .iter()
            .map(|q| format!("source.{}", q))
            .collect::<Vec<_>>()
            .join(", ")
    ));
    Ok(sql)
}

async fn merge_chunks(
    exec: &dyn SqlExecutor,
    target: &str,
    columns: &[String],
    rows: &[Vec<SqlValue>],
    keys: &[String],
    identities: &[String],
) -> Result<u64> {
    let per_statement = ParamLimits::MSSQL.rows_per_statement(columns.len());
    let mut affected = 0;
    for chunk in rows.chunks(per_statement) {
        let sql = merge_sql(target, columns, chunk.len(), keys, identities)?;
        affected += execute_logged(exec, &sql, &flatten_rows(chunk)).await?;
    }

    debug!("MSSQL: merged {} rows into {}", rows.len(), target);
    Ok(affected)
}
