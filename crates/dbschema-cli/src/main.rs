//! dbschema CLI - inspect, copy and load MySQL / SQL Server tables.

use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dbschema::{
    BackupOptions, Config, DbCopyTable, DbDialect, DbError, DuplicateStrategy, Row, SqlValue,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};

/// Rows handed to one batch insert call by `import`.
const IMPORT_BATCH_ROWS: usize = 1000;

#[derive(Parser)]
#[command(name = "dbschema")]
#[command(about = "Inspect, copy and load MySQL / SQL Server tables")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Database password, overriding the configuration file
    #[arg(long, env = "DBSCHEMA_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the server version
    ServerInfo,

    /// List databases on the server
    Databases,

    /// List schemas of the current database (SQL Server only)
    Schemas,

    /// List tables, optionally restricted to the given names
    Tables {
        /// Table names to include
        names: Vec<String>,
    },

    /// List columns of one or more tables
    Columns {
        /// Table names
        #[arg(required = true)]
        tables: Vec<String>,
    },

    /// List secondary indexes of a table
    Indexes {
        /// Table name
        table: String,
    },

    /// Show the identifying column of a table
    PrimaryKey {
        /// Table name
        table: String,
    },

    /// Print the DDL recreating a table
    Ddl {
        /// Table name
        table: String,

        /// Emit the DDL under another table name
        #[arg(long)]
        new_name: Option<String>,
    },

    /// Create a timestamped copy of a table
    CopyTable {
        /// Table name
        table: String,

        /// Also copy the rows, waiting for the copy to finish
        #[arg(long)]
        copy_data: bool,
    },

    /// Stream every row of a table to stdout as JSON lines (Ctrl-C stops)
    Export {
        /// Table name
        table: String,
    },

    /// Insert JSON-lines rows from a file into a table
    Import {
        /// Table name
        table: String,

        /// JSON-lines file, one object per row
        file: PathBuf,

        /// Duplicate handling: none, ignore or update
        #[arg(long, default_value = "none")]
        strategy: DuplicateStrategy,
    },

    /// Dump the database with the engine's backup tool
    Backup {
        /// Output file
        output: PathBuf,

        /// Only dump these tables
        #[arg(long, num_args = 1..)]
        tables: Vec<String>,

        /// Dump structure only
        #[arg(long)]
        no_data: bool,
    },

    /// Load a dump produced by `backup`
    Restore {
        /// Dump file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), DbError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = Config::load(&cli.config)?;
    if let Some(password) = cli.password {
        config.connection.password = password;
    }
    info!("Loaded configuration from {:?}", cli.config);

    let dialect = dbschema::connect(&config).await?;
    let result = execute(dialect.as_ref(), cli.command, cli.output_json).await;
    dialect.conn().pool.close().await;
    result
}

async fn execute(dialect: &dyn DbDialect, command: Commands, json: bool) -> Result<(), DbError> {
    match command {
        Commands::ServerInfo => {
            let server = dialect.get_db_server().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&server)?);
            } else {
                println!("{} {}", dialect.db_type(), server.version);
            }
        }

        Commands::Databases => print_names(&dialect.get_db_names().await?, json)?,

        Commands::Schemas => print_names(&dialect.get_schemas().await?, json)?,

        Commands::Tables { names } => {
            let tables = dialect.get_tables(&names).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tables)?);
            } else {
                for t in &tables {
                    println!("{}\t{} rows\t{}", t.name, t.row_count, t.comment);
                }
            }
        }

        Commands::Columns { tables } => {
            let columns = dialect.get_columns(&tables).await?;
            if columns.is_empty() {
                return Err(DbError::TableNotFound(tables.join(", ")));
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&columns)?);
            } else {
                for c in &columns {
                    println!(
                        "{}.{}\t{}\t{}{}",
                        c.table_name,
                        c.column_name,
                        c.full_type(),
                        if c.nullable { "NULL" } else { "NOT NULL" },
                        if c.is_primary_key { "\tPK" } else { "" }
                    );
                }
            }
        }

        Commands::Indexes { table } => {
            let indexes = dialect.get_table_index(&table).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&indexes)?);
            } else {
                for i in &indexes {
                    let kind = if i.is_unique { "UNIQUE" } else { "INDEX" };
                    println!("{}\t{}\t({})", i.index_name, kind, i.column_name);
                }
            }
        }

        Commands::PrimaryKey { table } => {
            let pk = dialect.get_primary_key(&table).await?;
            if json {
                println!("{}", serde_json::json!({ "table": table, "primary_key": pk }));
            } else {
                println!("{}", pk);
            }
        }

        Commands::Ddl { table, new_name } => {
            let ddl = match new_name {
                Some(name) => dialect.copy_table_ddl(&table, &name).await?,
                None => dialect.get_table_ddl(&table).await?,
            };
            println!("{}", ddl);
        }

        Commands::CopyTable { table, copy_data } => {
            // The copy runs in the foreground here; a detached task would be
            // dropped when the process exits.
            let spec = DbCopyTable {
                table_name: table.clone(),
                copy_data: false,
            };
            let new_table = dialect.copy_table(&spec).await?;
            if copy_data {
                dialect.copy_table_data(&table, &new_table).await?;
            }
            if json {
                println!(
                    "{}",
                    serde_json::json!({ "table": table, "new_table": new_table, "copied_data": copy_data })
                );
            } else {
                println!("{}", new_table);
            }
        }

        Commands::Export { table } => export(dialect, &table).await?,

        Commands::Import {
            table,
            file,
            strategy,
        } => {
            let affected = import(dialect, &table, &file, strategy).await?;
            if json {
                println!("{}", serde_json::json!({ "table": table, "affected": affected }));
            } else {
                println!("{} rows affected", affected);
            }
        }

        Commands::Backup {
            output,
            tables,
            no_data,
        } => {
            let program = dialect.get_db_program()?;
            let opts = BackupOptions {
                output,
                tables,
                no_data,
            };
            let path = program.backup(&opts).await?;
            println!("{}", path.display());
        }

        Commands::Restore { file } => {
            dialect.get_db_program()?.restore(&file).await?;
            println!("Restored {}", file.display());
        }
    }

    Ok(())
}

fn print_names(names: &[String], json: bool) -> Result<(), DbError> {
    if json {
        println!("{}", serde_json::to_string_pretty(names)?);
    } else {
        for name in names {
            println!("{}", name);
        }
    }
    Ok(())
}

async fn export(dialect: &dyn DbDialect, table: &str) -> Result<(), DbError> {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Stopping export...");
            token.cancel();
        }
    });

    let mut out = BufWriter::new(std::io::stdout());
    let mut count = 0u64;
    dialect
        .walk_table_record(table, &cancel, &mut |row: Row| -> dbschema::Result<()> {
            serde_json::to_writer(&mut out, &row.to_json())?;
            out.write_all(b"\n")?;
            count += 1;
            Ok(())
        })
        .await?;
    out.flush()?;

    info!("Exported {} rows from {}", count, table);
    Ok(())
}

/// Map a JSON scalar onto a bind value; nested values are stored as text.
fn json_value(value: &serde_json::Value) -> SqlValue {
    match value {
        serde_json::Value::Null => SqlValue::Null,
        serde_json::Value::Bool(b) => SqlValue::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::I64(i),
            None => n.as_f64().map(SqlValue::F64).unwrap_or(SqlValue::Null),
        },
        serde_json::Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

async fn import(
    dialect: &dyn DbDialect,
    table: &str,
    file: &Path,
    strategy: DuplicateStrategy,
) -> Result<u64, DbError> {
    let reader = std::io::BufReader::new(std::fs::File::open(file)?);

    let mut columns: Option<Arc<[String]>> = None;
    let mut batch: Vec<Vec<SqlValue>> = Vec::with_capacity(IMPORT_BATCH_ROWS);
    let mut affected = 0;

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let object = match serde_json::from_str::<serde_json::Value>(&line)? {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(DbError::Config(format!(
                    "expected one JSON object per line, got {}",
                    other
                )))
            }
        };

        let cols = columns.get_or_insert_with(|| object.keys().cloned().collect::<Vec<_>>().into());
        batch.push(
            cols.iter()
                .map(|c| object.get(c).map(json_value).unwrap_or(SqlValue::Null))
                .collect(),
        );

        if batch.len() == IMPORT_BATCH_ROWS {
            affected += dialect
                .batch_insert(None, table, &cols[..], &batch, strategy)
                .await?;
            batch.clear();
        }
    }

    if let Some(cols) = &columns {
        if !batch.is_empty() {
            affected += dialect
                .batch_insert(None, table, &cols[..], &batch, strategy)
                .await?;
        }
    }

    info!("Imported into {} with strategy {}", table, strategy);
    Ok(affected)
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
