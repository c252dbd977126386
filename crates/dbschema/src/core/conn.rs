//! The logical connection a dialect is bound to.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{DbError, Result};

use super::traits::ConnectionPool;

/// Supported engine families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
    Mysql,
    Mssql,
}

impl DbType {
    pub fn name(&self) -> &'static str {
        match self {
            DbType::Mysql => "mysql",
            DbType::Mssql => "mssql",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            DbType::Mysql => 3306,
            DbType::Mssql => 1433,
        }
    }

    /// Whether the engine has a schema level below the database.
    pub fn has_schemas(&self) -> bool {
        matches!(self, DbType::Mssql)
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DbType {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(DbType::Mysql),
            "mssql" | "sqlserver" | "sql_server" => Ok(DbType::Mssql),
            other => Err(DbError::Config(format!(
                "Unknown database type: '{}'. Supported types: mysql, mssql",
                other
            ))),
        }
    }
}

/// Where a connection points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbInfo {
    pub db_type: DbType,
    pub host: String,
    pub port: u16,
    /// Database name; SQL Server also accepts `db/schema`.
    pub database: String,
    /// Explicit schema, overriding any `db/schema` suffix.
    pub schema: Option<String>,
}

impl DbInfo {
    /// Database part of `database`, without a `/schema` suffix.
    pub fn database_name(&self) -> &str {
        self.database
            .split_once('/')
            .map(|(db, _)| db)
            .unwrap_or(&self.database)
    }

    /// Current schema: explicit `schema`, else the `db/schema` suffix,
    /// else `dbo` on SQL Server. MySQL has none.
    pub fn current_schema(&self) -> Option<String> {
        if !self.db_type.has_schemas() {
            return None;
        }
        if let Some(schema) = self.schema.as_deref().filter(|s| !s.is_empty()) {
            return Some(schema.to_string());
        }
        let from_db = self
            .database
            .split_once('/')
            .map(|(_, s)| s)
            .filter(|s| !s.is_empty());
        Some(from_db.unwrap_or("dbo").to_string())
    }
}

/// An already-open logical connection: target info plus a shared pool.
///
/// Cheap to clone; background tasks hold their own clone.
#[derive(Clone)]
pub struct DbConn {
    pub info: Arc<DbInfo>,
    pub pool: Arc<dyn ConnectionPool>,
}

impl DbConn {
    pub fn new(info: DbInfo, pool: Arc<dyn ConnectionPool>) -> Self {
        Self {
            info: Arc::new(info),
            pool,
        }
    }
}

impl fmt::Debug for DbConn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConn").field("info", &self.info).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(db_type: DbType, database: &str, schema: Option<&str>) -> DbInfo {
        DbInfo {
            db_type,
            host: "localhost".into(),
            port: db_type.default_port(),
            database: database.into(),
            schema: schema.map(String::from),
        }
    }

    #[test]
    fn test_db_type_from_str() {
        assert_eq!("MariaDB".parse::<DbType>().unwrap(), DbType::Mysql);
        assert_eq!("sqlserver".parse::<DbType>().unwrap(), DbType::Mssql);
        assert!("oracle".parse::<DbType>().is_err());
    }

    #[test]
    fn test_current_schema() {
        assert_eq!(
            info(DbType::Mssql, "sales/reporting", None).current_schema(),
            Some("reporting".to_string())
        );
        assert_eq!(
            info(DbType::Mssql, "sales", None).current_schema(),
            Some("dbo".to_string())
        );
        assert_eq!(
            info(DbType::Mssql, "sales/reporting", Some("audit")).current_schema(),
            Some("audit".to_string())
        );
        assert_eq!(info(DbType::Mysql, "sales", Some("x")).current_schema(), None);
    }

    #[test]
    fn test_database_name_strips_schema() {
        assert_eq!(info(DbType::Mssql, "sales/reporting", None).database_name(), "sales");
        assert_eq!(info(DbType::Mysql, "sales", None).database_name(), "sales");
    }
}
