//! Configuration type definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database the dialect is bound to.
    pub connection: ConnectionConfig,

    /// External backup/restore tools.
    #[serde(default)]
    pub program: ProgramConfig,
}

/// Connection settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database type: mysql | mssql (aliases: mariadb, sqlserver, sql_server).
    pub r#type: String,

    /// Database host.
    pub host: String,

    /// Database port (default: 3306 for mysql, 1433 for mssql).
    #[serde(default)]
    pub port: Option<u16>,

    /// Database name. SQL Server also accepts `db/schema`.
    pub database: String,

    /// Schema (SQL Server only). Overrides a `db/schema` suffix.
    #[serde(default)]
    pub schema: Option<String>,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Encrypt connection (SQL Server, default: true).
    #[serde(default = "default_true")]
    pub encrypt: bool,

    /// Trust server certificate (SQL Server, default: false).
    #[serde(default)]
    pub trust_server_cert: bool,

    /// Maximum pooled connections (default: 5).
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("type", &self.r#type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("encrypt", &self.encrypt)
            .field("trust_server_cert", &self.trust_server_cert)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// Paths of the client tools used for backup/restore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramConfig {
    /// `mysqldump` executable (default: found on PATH).
    #[serde(default = "default_mysqldump")]
    pub mysqldump_path: String,

    /// `mysql` client executable (default: found on PATH).
    #[serde(default = "default_mysql")]
    pub mysql_path: String,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            mysqldump_path: default_mysqldump(),
            mysql_path: default_mysql(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_connections() -> u32 {
    5
}

fn default_mysqldump() -> String {
    "mysqldump".to_string()
}

fn default_mysql() -> String {
    "mysql".to_string()
}
