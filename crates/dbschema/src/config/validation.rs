//! Configuration validation.

use super::Config;
use crate::core::conn::DbType;
use crate::error::{DbError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    let conn = &config.connection;

    let db_type: DbType = conn.r#type.parse().map_err(|_| {
        DbError::Config(format!(
            "connection.type must be 'mysql' or 'mssql', got '{}'",
            conn.r#type
        ))
    })?;

    if conn.host.is_empty() {
        return Err(DbError::Config("connection.host is required".into()));
    }
    if conn.database.is_empty() {
        return Err(DbError::Config("connection.database is required".into()));
    }
    if conn.user.is_empty() {
        return Err(DbError::Config("connection.user is required".into()));
    }
    if conn.max_connections == 0 {
        return Err(DbError::Config(
            "connection.max_connections must be at least 1".into(),
        ));
    }
    if let Some(0) = conn.port {
        return Err(DbError::Config("connection.port must not be 0".into()));
    }

    if !db_type.has_schemas() {
        if conn.schema.as_deref().is_some_and(|s| !s.is_empty()) {
            return Err(DbError::Config(format!(
                "connection.schema is not supported for {}",
                db_type
            )));
        }
        if conn.database.contains('/') {
            return Err(DbError::Config(format!(
                "connection.database cannot carry a schema suffix for {}",
                db_type
            )));
        }
    }

    Ok(())
}
