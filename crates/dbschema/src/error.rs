//! Error types for the dialect engine.

use thiserror::Error;

/// Main error type for dialect and transfer operations.
#[derive(Error, Debug)]
pub enum DbError {
    /// The connection or driver rejected a statement.
    #[error("Query error: {0}")]
    Query(String),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Introspection returned nothing for a named table.
    #[error("Table does not exist: {0}")]
    TableNotFound(String),

    /// The dialect does not implement a capability.
    #[error("{db_type} does not support {operation}")]
    UnsupportedOperation { db_type: String, operation: String },

    /// Unknown metadata query key.
    #[error("Metadata query '{key}' not found in {file}")]
    MetaSql { file: String, key: String },

    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Identifier rejected before quoting.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Backup/restore tool failure.
    #[error("Program error: {0}")]
    Program(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Operation was cancelled (SIGINT, token, etc.)
    #[error("Operation cancelled")]
    Cancelled,
}

impl From<tiberius::error::Error> for DbError {
    fn from(e: tiberius::error::Error) -> Self {
        DbError::Query(e.to_string())
    }
}

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        DbError::Query(e.to_string())
    }
}

impl DbError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        DbError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create an UnsupportedOperation error.
    pub fn unsupported(db_type: impl Into<String>, operation: impl Into<String>) -> Self {
        DbError::UnsupportedOperation {
            db_type: db_type.into(),
            operation: operation.into(),
        }
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            DbError::Config(_) | DbError::Yaml(_) => 2,
            DbError::TableNotFound(_) => 3,
            DbError::UnsupportedOperation { .. } => 4,
            DbError::Cancelled => 130,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for dialect operations.
pub type Result<T> = std::result::Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_message() {
        let err = DbError::unsupported("mysql", "schemas");
        assert_eq!(err.to_string(), "mysql does not support schemas");
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_format_detailed_includes_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.yaml");
        let err = DbError::from(io);
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: IO error: missing.yaml"));
    }
}
