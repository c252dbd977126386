//! MySQL batch loader.
//!
//! Multi-row `INSERT` statements with positional `?` placeholders, split so
//! no statement exceeds the placeholder limit. Duplicates are handled by
//! the engine itself:
//!
//! - `None`: plain `INSERT`
//! - `Ignore`: `INSERT ... ON DUPLICATE KEY UPDATE c = c`, a no-op
//!   assignment, so key collisions are skipped while every other
//!   constraint still fails the statement
//! - `Update`: `INSERT ... ON DUPLICATE KEY UPDATE` over the non-key columns

use tracing::debug;

use crate::core::identifier::quote_mysql;
use crate::core::schema::DuplicateStrategy;
use crate::core::traits::SqlExecutor;
use crate::core::value::SqlValue;
use crate::drivers::common::{
    check_row_widths, contains_name, execute_logged, flatten_rows, key_columns, ParamLimits,
    PlaceholderStyle,
};
use crate::error::{DbError, Result};

use super::MysqlDialect;

/// Statement prefix and optional trailing clause of one insert form.
struct InsertForm {
    verb: &'static str,
    suffix: Option<String>,
}

impl InsertForm {
    fn plain() -> Self {
        Self {
            verb: "INSERT INTO",
            suffix: None,
        }
    }

    /// Skip rows that collide on a unique key. Unlike `INSERT IGNORE` this
    /// leaves NOT NULL, truncation and foreign key errors intact.
    fn skip_duplicates(columns: &[String]) -> Result<Self> {
        let first = columns
            .first()
            .ok_or_else(|| DbError::Query("insert without columns".to_string()))?;
        let q = quote_mysql(first)?;
        Ok(Self {
            verb: "INSERT INTO",
            suffix: Some(format!("ON DUPLICATE KEY UPDATE {q} = {q}")),
        })
    }
}

impl MysqlDialect {
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

        let form = match strategy {
            DuplicateStrategy::None => InsertForm::plain(),
            DuplicateStrategy::Ignore => InsertForm::skip_duplicates(columns)?,
            DuplicateStrategy::Update => self.upsert_form(exec, table, columns).await?,
        };

        insert_chunks(exec, table, columns, rows, &form).await
    }

    /// `ON DUPLICATE KEY UPDATE` over every inserted column that is neither
    /// part of the primary key nor an identity column.
    ///
    /// Without a primary key this is a plain insert. When nothing is left to
    /// update, colliding rows are skipped.
    async fn upsert_form(
        &self,
        exec: &dyn SqlExecutor,
        table: &str,
        columns: &[String],
    ) -> Result<InsertForm> {
        let meta = self.load_columns(exec, &[table.to_string()]).await?;
        let (pks, identities) = key_columns(&meta);
        if pks.is_empty() {
            debug!("{} has no primary key, update strategy inserts plainly", table);
            return Ok(InsertForm::plain());
        }

        let updates = columns
            .iter()
            .filter(|c| !contains_name(&pks, c) && !contains_name(&identities, c))
            .map(|c| quote_mysql(c).map(|q| format!("{q} = VALUES({q})")))
            .collect::<Result<Vec<_>>>()?;

        if updates.is_empty() {
            return InsertForm::skip_duplicates(columns);
        }
        Ok(InsertForm {
            verb: "INSERT INTO",
            suffix: Some(format!("ON DUPLICATE KEY UPDATE {}", updates.join(", "))),
        })
    }
}

async fn insert_chunks(
    exec: &dyn SqlExecutor,
    table: &str,
    columns: &[String],
    rows: &[Vec<SqlValue>],
    form: &InsertForm,
) -> Result<u64> {
    let target = quote_mysql(table)?;
    let col_list = columns
        .iter()
        .map(|c| quote_mysql(c))
        .collect::<Result<Vec<_>>>()?
        .join(", ");

    let per_statement = ParamLimits::MYSQL.rows_per_statement(columns.len());
    let mut affected = 0;
    for chunk in rows.chunks(per_statement) {
        let mut sql = format!(
            "{} {} ({}) VALUES {}",
            form.verb,
            target,
            col_list,
            PlaceholderStyle::Question.value_groups(1, chunk.len(), columns.len())
        );
        if let Some(suffix) = &form.suffix {
            sql.push(' ');
            sql.push_str(suffix);
        }
        affected += execute_logged(exec, &sql, &flatten_rows(chunk)).await?;
    }

    debug!("MySQL: wrote {} rows to {}", rows.len(), table);
    Ok(affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::conn::DbType;
    use crate::core::testing::{rows, MockPool};
    use crate::core::traits::DbDialect;

    const COLUMN_FIELDS: [&str; 4] = ["tableName", "columnName", "isPrimaryKey", "isIdentity"];

    fn users_columns(mock: &MockPool, with_pk: bool) {
        let pk = SqlValue::I64(i64::from(with_pk));
        mock.respond(
            "information_schema.COLUMNS",
            rows(
                &COLUMN_FIELDS,
                vec![
                    vec!["users".into(), "id".into(), pk.clone(), pk],
                    vec!["users".into(), "name".into(), SqlValue::I64(0), SqlValue::I64(0)],
                ],
            ),
        );
    }

    fn batch() -> (Vec<String>, Vec<Vec<SqlValue>>) {
        (
            vec!["id".to_string(), "name".to_string()],
            vec![
                vec![SqlValue::I64(1), "a".into()],
                vec![SqlValue::I64(2), "b".into()],
            ],
        )
    }

    #[tokio::test]
    async fn test_insert_plain_binds_row_major() {
        let mock = MockPool::new();
        mock.affect("INSERT INTO", 2);
        let dialect = MysqlDialect::new(mock.conn(DbType::Mysql, "app"));
        let (cols, data) = batch();

        let n = dialect
            .batch_insert(None, "users", &cols, &data, DuplicateStrategy::None)
            .await
            .unwrap();

        assert_eq!(n, 2);
        let executed = mock.executed();
        assert_eq!(executed.len(), 1);
        assert_eq!(
            executed[0].sql,
            "INSERT INTO `users` (`id`, `name`) VALUES (?, ?), (?, ?)"
        );
        assert_eq!(
            executed[0].args,
            vec![SqlValue::I64(1), "a".into(), SqlValue::I64(2), "b".into()]
        );
        assert_eq!(mock.commits(), 1);
    }

    #[tokio::test]
    async fn test_ignore_skips_only_key_collisions() {
        let mock = MockPool::new();
        let dialect = MysqlDialect::new(mock.conn(DbType::Mysql, "app"));
        let (cols, data) = batch();

        dialect
            .batch_insert(None, "users", &cols, &data, DuplicateStrategy::Ignore)
            .await
            .unwrap();

        assert_eq!(
            mock.statements(),
            vec!["INSERT INTO `users` (`id`, `name`) VALUES (?, ?), (?, ?) ON DUPLICATE KEY UPDATE `id` = `id`"]
        );
        assert!(!mock.statements()[0].contains("IGNORE"));
    }

    #[tokio::test]
    async fn test_update_uses_on_duplicate_key() {
        let mock = MockPool::new();
        users_columns(&mock, true);
        let dialect = MysqlDialect::new(mock.conn(DbType::Mysql, "app"));
        let (cols, data) = batch();

        dialect
            .batch_insert(None, "users", &cols, &data, DuplicateStrategy::Update)
            .await
            .unwrap();

        let statements = mock.statements();
        assert_eq!(
            statements.last().unwrap(),
            "INSERT INTO `users` (`id`, `name`) VALUES (?, ?), (?, ?) ON DUPLICATE KEY UPDATE `name` = VALUES(`name`)"
        );
    }

    #[tokio::test]
    async fn test_update_without_primary_key_inserts_plainly() {
        let mock = MockPool::new();
        users_columns(&mock, false);
        let dialect = MysqlDialect::new(mock.conn(DbType::Mysql, "app"));
        let (cols, data) = batch();

        dialect
            .batch_insert(None, "users", &cols, &data, DuplicateStrategy::Update)
            .await
            .unwrap();

        let statements = mock.statements();
        assert_eq!(
            statements.last().unwrap(),
            "INSERT INTO `users` (`id`, `name`) VALUES (?, ?), (?, ?)"
        );
        assert!(!statements.iter().any(|s| s.contains("ON DUPLICATE")));
    }

    #[tokio::test]
    async fn test_update_only_keys_skips_duplicates() {
        let mock = MockPool::new();
        users_columns(&mock, true);
        let dialect = MysqlDialect::new(mock.conn(DbType::Mysql, "app"));

        dialect
            .batch_insert(
                None,
                "users",
                &["id".to_string()],
                &[vec![SqlValue::I64(1)]],
                DuplicateStrategy::Update,
            )
            .await
            .unwrap();

        assert_eq!(
            mock.statements().last().unwrap(),
            "INSERT INTO `users` (`id`) VALUES (?) ON DUPLICATE KEY UPDATE `id` = `id`"
        );
    }

    #[tokio::test]
    async fn test_failed_insert_rolls_back() {
        let mock = MockPool::new();
        mock.fail_on("INSERT INTO");
        let dialect = MysqlDialect::new(mock.conn(DbType::Mysql, "app"));
        let (cols, data) = batch();

        let err = dialect
            .batch_insert(None, "users", &cols, &data, DuplicateStrategy::None)
            .await
            .unwrap_err();

        assert!(!err.to_string().contains("VALUES"));
        assert_eq!(mock.rollbacks(), 1);
        assert_eq!(mock.commits(), 0);
    }

    #[tokio::test]
    async fn test_empty_batch_issues_nothing() {
        let mock = MockPool::new();
        let dialect = MysqlDialect::new(mock.conn(DbType::Mysql, "app"));

        let n = dialect
            .batch_insert_with(
                &mock,
                "users",
                &["id".to_string()],
                &[],
                DuplicateStrategy::None,
            )
            .await
            .unwrap();

        assert_eq!(n, 0);
        assert!(mock.statements().is_empty());
    }
}
