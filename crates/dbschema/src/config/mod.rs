//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use std::path::Path;

use crate::core::conn::{DbInfo, DbType};
use crate::error::Result;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl ConnectionConfig {
    /// Parsed database type.
    pub fn db_type(&self) -> Result<DbType> {
        self.r#type.parse()
    }

    /// Port, defaulted per database type.
    pub fn port_or_default(&self) -> Result<u16> {
        Ok(match self.port {
            Some(p) => p,
            None => self.db_type()?.default_port(),
        })
    }

    /// Connection target handed to the dialect.
    pub fn db_info(&self) -> Result<DbInfo> {
        Ok(DbInfo {
            db_type: self.db_type()?,
            host: self.host.clone(),
            port: self.port_or_default()?,
            database: self.database.clone(),
            schema: self.schema.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_yaml_defaults() {
        let yaml = r#"
connection:
  type: sqlserver
  host: db.local
  database: sales/reporting
  user: sa
  password: secret
"#;
        let config = Config::from_yaml(yaml).unwrap();
        let info = config.connection.db_info().unwrap();
        assert_eq!(info.db_type, DbType::Mssql);
        assert_eq!(info.port, 1433);
        assert_eq!(info.current_schema().as_deref(), Some("reporting"));
        assert!(config.connection.encrypt);
        assert_eq!(config.connection.max_connections, 5);
        assert_eq!(config.program.mysqldump_path, "mysqldump");
    }

    #[test]
    fn test_from_yaml_rejects_invalid() {
        let yaml = r#"
connection:
  type: oracle
  host: db.local
  database: sales
  user: scott
"#;
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "connection:\n  type: mysql\n  host: localhost\n  port: 3307\n  database: app\n  user: root\n",
        )
        .unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.connection.port_or_default().unwrap(), 3307);
    }
}
