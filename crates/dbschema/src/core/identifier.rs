//! Centralized identifier quoting and literal escaping.
//!
//! Every generated statement routes table, column, index and schema names
//! through this module. Identifiers cannot be bound as parameters, so they
//! are validated, stripped of any quoting the caller already applied, and
//! re-quoted for the target dialect. Literal escaping here is only for text
//! embedded in generated DDL (comments, defaults); row data is always bound.

use crate::error::{DbError, Result};

/// Maximum identifier length (conservative limit across databases).
/// - SQL Server: 128 characters
/// - MySQL: 64 characters
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier for security issues.
///
/// Rejects:
/// - Empty identifiers
/// - Identifiers containing null bytes (injection vector)
/// - Identifiers exceeding maximum length
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(DbError::InvalidIdentifier(
            "identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(DbError::InvalidIdentifier(format!(
            "identifier contains null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(DbError::InvalidIdentifier(format!(
            "identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Strip one level of surrounding quotes (`` ` ``, `[]` or `"`).
///
/// Callers frequently hand over names copied from a SQL editor that are
/// already quoted; quoting them again would produce `` `\`t\`` `` style names.
pub fn unquote_ident(name: &str) -> &str {
    let trimmed = name.trim();
    let pairs = [('`', '`'), ('[', ']'), ('"', '"')];
    for (open, close) in pairs {
        if trimmed.len() >= 2 && trimmed.starts_with(open) && trimmed.ends_with(close) {
            return &trimmed[1..trimmed.len() - 1];
        }
    }
    trimmed
}

/// Quote a MySQL identifier using backticks.
///
/// Escapes backticks by doubling them and wraps in backticks.
///
/// ```ignore
/// assert_eq!(quote_mysql("users")?, "`users`");
/// assert_eq!(quote_mysql("table`name")?, "`table``name`");
/// ```
pub fn quote_mysql(name: &str) -> Result<String> {
    let name = unquote_ident(name);
    validate_identifier(name)?;
    Ok(format!("`{}`", name.replace('`', "``")))
}

/// Quote a SQL Server identifier using brackets.
///
/// Escapes closing brackets by doubling them and wraps in brackets.
///
/// ```ignore
/// assert_eq!(quote_mssql("users")?, "[users]");
/// assert_eq!(quote_mssql("table]name")?, "[table]]name]");
/// ```
pub fn quote_mssql(name: &str) -> Result<String> {
    let name = unquote_ident(name);
    validate_identifier(name)?;
    Ok(format!("[{}]", name.replace(']', "]]")))
}

/// Qualify a SQL Server table name with schema.
pub fn qualify_mssql(schema: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_mssql(schema)?, quote_mssql(table)?))
}

/// Escape text for a single-quoted literal.
///
/// Single quotes are doubled. When `escape_backslash` is set (MySQL's
/// default `sql_mode`), backslashes are doubled first.
pub fn escape_literal(text: &str, escape_backslash: bool) -> String {
    let text = if escape_backslash {
        text.replace('\\', "\\\\")
    } else {
        text.to_string()
    };
    text.replace('\'', "''")
}
