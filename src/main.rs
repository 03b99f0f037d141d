//! Database Backup/Restore Toolkit
//!
//! Provides CLI interface for SQL Server, MySQL, PostgreSQL, MongoDB and SQLite
//! backup and restore operations

// databasetoolkit/src/main.rs
mod config;
mod errors;
mod sqlserver;
mod tools;

use anyhow::{Context, Result, bail};
use config::AppConfig;
use sqlserver::SqlServerToolkit;
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tools::SystemToolRunner;
use tools::mongodb::MongoDbToolkit;
use tools::mysql::MySqlToolkit;
use tools::postgresql::PostgreSqlToolkit;
use tools::sqlite::SqliteToolkit;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Engine {
    SqlServer,
    MySql,
    PostgreSql,
    MongoDb,
    Sqlite,
}

impl Engine {
    fn parse(choice: &str) -> Result<Self> {
        match choice.trim().to_ascii_lowercase().as_str() {
            "1" | "sqlserver" | "mssql" => Ok(Engine::SqlServer),
            "2" | "mysql" => Ok(Engine::MySql),
            "3" | "postgresql" | "postgres" => Ok(Engine::PostgreSql),
            "4" | "mongodb" | "mongo" => Ok(Engine::MongoDb),
            "5" | "sqlite" => Ok(Engine::Sqlite),
            other => bail!(
                "Invalid engine '{}'. Expected sqlserver, mysql, postgresql, mongodb or sqlite.",
                other
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Backup,
    Restore,
}

impl Operation {
    fn parse(choice: &str) -> Result<Self> {
        match choice.trim().to_ascii_lowercase().as_str() {
            "1" | "backup" => Ok(Operation::Backup),
            "2" | "restore" => Ok(Operation::Restore),
            other => bail!("Invalid operation '{}'. Expected backup or restore.", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Command {
    engine: Engine,
    operation: Operation,
    /// Database name, or the database file for SQLite.
    database: String,
    path: Option<String>,
    with_authentication: bool,
}

impl Command {
    fn from_args(args: &[String]) -> Result<Self> {
        let with_authentication = args.iter().any(|a| a == "--auth");
        let positional: Vec<&String> = args.iter().filter(|a| *a != "--auth").collect();

        let (engine, operation, database) = match positional.as_slice() {
            [engine, operation, database, ..] => (engine, operation, database),
            _ => bail!("Usage: databasetoolkit <engine> <backup|restore> <database> [path] [--auth]"),
        };
        if positional.len() > 4 {
            bail!("Unexpected argument '{}'", positional[4]);
        }

        Ok(Command {
            engine: Engine::parse(engine)?,
            operation: Operation::parse(operation)?,
            database: database.to_string(),
            path: positional.get(3).map(|p| p.to_string()),
            with_authentication,
        })
    }

    /// Only SQL Server can derive a default path; every other engine needs one.
    fn required_path(&self) -> Result<&Path> {
        match self.path.as_deref() {
            Some(path) => Ok(Path::new(path)),
            None => bail!("A backup file path is required for {:?}", self.engine),
        }
    }
}

/// Main entry point for the backup/restore toolkit
#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run_app().await {
        Ok(_) => {
            println!("✅ Operation completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_app() -> Result<()> {
    dotenv::dotenv().ok();

    // Expects config.json in the working directory (the project root with `cargo run`).
    let config_path = PathBuf::from("config.json");
    let app_config = AppConfig::load_from_json(&config_path)
        .context(format!("Failed to load application configuration from {}", config_path.display()))?;
    info!("{} v{}", app_config.application_name, app_config.version);

    let args: Vec<String> = env::args().skip(1).collect();
    let command = if args.is_empty() {
        prompt_command()?
    } else {
        Command::from_args(&args)?
    };

    execute(&app_config, &command).await
}

async fn execute(app_config: &AppConfig, command: &Command) -> Result<()> {
    let database = command.database.as_str();
    match (command.engine, command.operation) {
        (Engine::SqlServer, operation) => {
            let toolkit = SqlServerToolkit::from_config(&app_config.sql_server()?);
            match operation {
                Operation::Backup => toolkit
                    .backup_database(database, command.path.as_deref())
                    .await
                    .context("SQL Server backup failed")?,
                Operation::Restore => toolkit
                    .restore_database(database, command.path.as_deref())
                    .await
                    .context("SQL Server restore failed")?,
            }
        }
        (Engine::MySql, operation) => {
            let toolkit = MySqlToolkit::new(&app_config.mysql()?, SystemToolRunner);
            let path = command.required_path()?;
            match operation {
                Operation::Backup => toolkit.backup_database(database, path).context("MySQL backup failed")?,
                Operation::Restore => toolkit.restore_database(database, path).context("MySQL restore failed")?,
            }
        }
        (Engine::PostgreSql, operation) => {
            let toolkit = PostgreSqlToolkit::new(&app_config.postgresql()?, SystemToolRunner);
            let path = command.required_path()?;
            match operation {
                Operation::Backup => toolkit
                    .backup_database(database, path)
                    .context("PostgreSQL backup failed")?,
                Operation::Restore => toolkit
                    .restore_database(database, path)
                    .context("PostgreSQL restore failed")?,
            }
        }
        (Engine::MongoDb, operation) => {
            let toolkit = MongoDbToolkit::new(&app_config.mongodb(), SystemToolRunner);
            let path = command.required_path()?;
            match operation {
                Operation::Backup => toolkit
                    .backup_database(database, path, command.with_authentication)
                    .context("MongoDB backup failed")?,
                Operation::Restore => toolkit
                    .restore_database(path, command.with_authentication)
                    .context("MongoDB restore failed")?,
            }
        }
        (Engine::Sqlite, operation) => {
            let toolkit = SqliteToolkit::new(SystemToolRunner);
            let path = command.required_path()?;
            match operation {
                Operation::Backup => toolkit
                    .backup_database(Path::new(database), path)
                    .context("SQLite backup failed")?,
                Operation::Restore => toolkit
                    .restore_database(Path::new(database), path)
                    .context("SQLite restore failed")?,
            }
        }
    }
    Ok(())
}

/// Prompts the user for engine, operation, database and path
fn prompt_command() -> Result<Command> {
    println!("Select a database engine:");
    println!("1. SQL Server (or type 'sqlserver')");
    println!("2. MySQL (or type 'mysql')");
    println!("3. PostgreSQL (or type 'postgresql')");
    println!("4. MongoDB (or type 'mongodb')");
    println!("5. SQLite (or type 'sqlite')");
    let engine = Engine::parse(&prompt("Enter your choice: ")?)?;

    println!("Select an operation:");
    println!("1. Take Backup (or type 'backup')");
    println!("2. Restore Backup (or type 'restore')");
    let operation = Operation::parse(&prompt("Enter your choice: ")?)?;

    let database = match engine {
        Engine::Sqlite => prompt("Database file: ")?,
        _ => prompt("Database name: ")?,
    };
    let path = match engine {
        Engine::SqlServer => prompt("Backup file path (leave empty for the default): ")?,
        _ => prompt("Backup file path: ")?,
    };
    let with_authentication = match engine {
        Engine::MongoDb => prompt("Use authentication? (y/N): ")?.eq_ignore_ascii_case("y"),
        _ => false,
    };

    Ok(Command {
        engine,
        operation,
        database,
        path: Some(path).filter(|p| !p.is_empty()),
        with_authentication,
    })
}

fn prompt(message: &str) -> Result<String> {
    use std::io::{Write, stdin, stdout};

    print!("{}", message);
    stdout().flush().context("Failed to flush stdout")?;

    let mut input = String::new();
    stdin().read_line(&mut input).context("Failed to read user input")?;
    Ok(input.trim().to_string())
}
