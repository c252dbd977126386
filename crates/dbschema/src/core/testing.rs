//! Recording connection used by unit tests.
//!
//! Queries return canned rows keyed by a SQL fragment; every statement is
//! logged with its bound arguments so tests can assert on exact SQL.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{DbError, Result};

use super::conn::{DbConn, DbInfo, DbType};
use super::traits::{ConnectionPool, DbTransaction, RowCallback, SqlExecutor};
use super::value::{Row, SqlValue};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Executed {
    pub sql: String,
    pub args: Vec<SqlValue>,
}

#[derive(Default)]
struct MockState {
    responses: Vec<(String, Vec<Row>)>,
    affected: Vec<(String, u64)>,
    failures: Vec<String>,
    log: Vec<Executed>,
    commits: usize,
    rollbacks: usize,
}

#[derive(Clone, Default)]
pub(crate) struct MockPool {
    state: Arc<Mutex<MockState>>,
}

impl MockPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `rows` for any query containing `fragment`.
    pub fn respond(&self, fragment: &str, rows: Vec<Row>) {
        self.state
            .lock()
            .unwrap()
            .responses
            .push((fragment.to_string(), rows));
    }

    /// Report `n` affected rows for statements containing `fragment`.
    pub fn affect(&self, fragment: &str, n: u64) {
        self.state
            .lock()
            .unwrap()
            .affected
            .push((fragment.to_string(), n));
    }

    /// Fail any statement containing `fragment`.
    pub fn fail_on(&self, fragment: &str) {
        self.state
            .lock()
            .unwrap()
            .failures
            .push(fragment.to_string());
    }

    pub fn executed(&self) -> Vec<Executed> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn statements(&self) -> Vec<String> {
        self.executed().into_iter().map(|e| e.sql).collect()
    }

    pub fn commits(&self) -> usize {
        self.state.lock().unwrap().commits
    }

    pub fn rollbacks(&self) -> usize {
        self.state.lock().unwrap().rollbacks
    }

    /// Wrap this pool in a `DbConn` for the given engine.
    pub fn conn(&self, db_type: DbType, database: &str) -> DbConn {
        let info = DbInfo {
            db_type,
            host: "localhost".to_string(),
            port: db_type.default_port(),
            database: database.to_string(),
            schema: None,
        };
        DbConn::new(info, Arc::new(self.clone()))
    }

    fn record(&self, sql: &str, args: &[SqlValue]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.log.push(Executed {
            sql: sql.to_string(),
            args: args.to_vec(),
        });
        if let Some(f) = state.failures.iter().find(|f| sql.contains(f.as_str())) {
            return Err(DbError::Query(format!("mock failure on '{}'", f)));
        }
        Ok(())
    }

    fn rows_for(&self, sql: &str) -> Vec<Row> {
        let state = self.state.lock().unwrap();
        state
            .responses
            .iter()
            .find(|(f, _)| sql.contains(f.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default()
    }
}

/// Build rows sharing one column list.
pub(crate) fn rows(columns: &[&str], data: Vec<Vec<SqlValue>>) -> Vec<Row> {
    let cols: Arc<[String]> = columns.iter().map(|c| c.to_string()).collect::<Vec<_>>().into();
    data.into_iter()
        .map(|values| Row::new(cols.clone(), values))
        .collect()
}

#[async_trait]
impl SqlExecutor for MockPool {
    async fn query(&self, sql: &str, args: &[SqlValue]) -> Result<Vec<Row>> {
        self.record(sql, args)?;
        Ok(self.rows_for(sql))
    }

    async fn execute(&self, sql: &str, args: &[SqlValue]) -> Result<u64> {
        self.record(sql, args)?;
        let state = self.state.lock().unwrap();
        Ok(state
            .affected
            .iter()
            .find(|(f, _)| sql.contains(f.as_str()))
            .map(|(_, n)| *n)
            .unwrap_or(0))
    }
}

#[async_trait]
impl ConnectionPool for MockPool {
    fn as_executor(&self) -> &dyn SqlExecutor {
        self
    }

    async fn execute_batch(&self, sql: &str) -> Result<()> {
        self.record(sql, &[])
    }

    async fn walk(
        &self,
        sql: &str,
        cancel: &CancellationToken,
        on_row: &mut RowCallback<'_>,
    ) -> Result<()> {
        self.record(sql, &[])?;
        for row in self.rows_for(sql) {
            if cancel.is_cancelled() {
                return Err(DbError::Cancelled);
            }
            on_row(row)?;
        }
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn DbTransaction>> {
        Ok(Box::new(MockTx { pool: self.clone() }))
    }

    async fn close(&self) {}
}

struct MockTx {
    pool: MockPool,
}

#[async_trait]
impl SqlExecutor for MockTx {
    async fn query(&self, sql: &str, args: &[SqlValue]) -> Result<Vec<Row>> {
        self.pool.query(sql, args).await
    }

    async fn execute(&self, sql: &str, args: &[SqlValue]) -> Result<u64> {
        self.pool.execute(sql, args).await
    }
}

#[async_trait]
impl DbTransaction for MockTx {
    fn as_executor(&self) -> &dyn SqlExecutor {
        self
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.pool.state.lock().unwrap().commits += 1;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.pool.state.lock().unwrap().rollbacks += 1;
        Ok(())
    }
}
