//! Logical backup and restore through the MySQL client tools.
//!
//! The password reaches the child process through `MYSQL_PWD`, never argv,
//! so it does not show up in process listings.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::ProgramConfig;
use crate::core::conn::DbInfo;
use crate::core::identifier::{unquote_ident, validate_identifier};
use crate::core::traits::{BackupOptions, DbProgram};
use crate::error::{DbError, Result};

/// `mysqldump` / `mysql` driver for one database.
#[derive(Clone)]
pub struct MysqlProgram {
    info: Arc<DbInfo>,
    tools: ProgramConfig,
    user: String,
    password: String,
}

impl MysqlProgram {
    pub fn new(info: Arc<DbInfo>, tools: ProgramConfig, user: String, password: String) -> Self {
        Self {
            info,
            tools,
            user,
            password,
        }
    }

    fn connection_args(&self) -> Vec<String> {
        vec![
            format!("--host={}", self.info.host),
            format!("--port={}", self.info.port),
            format!("--user={}", self.user),
        ]
    }

    /// Arguments for `mysqldump`.
    pub fn backup_args(&self, opts: &BackupOptions) -> Result<Vec<String>> {
        let mut args = self.connection_args();
        args.extend([
            "--single-transaction".to_string(),
            "--routines".to_string(),
            "--triggers".to_string(),
            "--default-character-set=utf8mb4".to_string(),
        ]);
        if opts.no_data {
            args.push("--no-data".to_string());
        }
        args.push(format!("--result-file={}", opts.output.display()));
        args.push(self.info.database_name().to_string());

        for table in &opts.tables {
            let table = unquote_ident(table);
            validate_identifier(table)?;
            if table.starts_with('-') {
                return Err(DbError::InvalidIdentifier(format!(
                    "table name cannot start with '-': {:?}",
                    table
                )));
            }
            args.push(table.to_string());
        }
        Ok(args)
    }

    fn command(&self, program: &str) -> Command {
        let mut cmd = Command::new(program);
        cmd.env("MYSQL_PWD", &self.password)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

async fn wait(program: &str, mut cmd: Command) -> Result<()> {
    let output = cmd
        .output()
        .await
        .map_err(|e| DbError::Program(format!("failed to start {}: {}", program, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DbError::Program(format!(
            "{} exited with {}: {}",
            program,
            output.status,
            stderr.trim()
        )));
    }
    Ok(())
}

#[async_trait]
impl DbProgram for MysqlProgram {
    async fn backup(&self, opts: &BackupOptions) -> Result<PathBuf> {
        if let Some(parent) = opts.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let args = self.backup_args(opts)?;
        debug!("Running {} for {}", self.tools.mysqldump_path, self.info.database_name());

        let mut cmd = self.command(&self.tools.mysqldump_path);
        cmd.args(&args);
        wait(&self.tools.mysqldump_path, cmd).await?;

        info!(
            "Backed up {} to {}",
            self.info.database_name(),
            opts.output.display()
        );
        Ok(opts.output.clone())
    }

    async fn restore(&self, file: &Path) -> Result<()> {
        let input = tokio::fs::File::open(file).await?.into_std().await;

        let mut cmd = self.command(&self.tools.mysql_path);
        cmd.args(self.connection_args())
            .arg(self.info.database_name())
            .stdin(Stdio::from(input));
        wait(&self.tools.mysql_path, cmd).await?;

        info!("Restored {} from {}", self.info.database_name(), file.display());
        Ok(())
    }
}
