// databasetoolkit/src/sqlserver/statements.rs
use std::time::Duration;

use crate::errors::{Result, ToolkitError};

/// Restores and backups of large databases routinely run for hours.
pub const LONG_COMMAND_TIMEOUT: Duration = Duration::from_secs(7200);

/// SQL Server's `sysname` limit; longer names cannot be quoted.
const MAX_IDENTIFIER_LEN: usize = 128;

/// A T-SQL statement with positional `@P1..@Pn` parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<String>,
    pub timeout: Option<Duration>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Statement {
            sql: sql.into(),
            params: Vec::new(),
            timeout: None,
        }
    }

    pub fn bind(mut self, value: impl Into<String>) -> Self {
        self.params.push(value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Quotes a database name for DDL that cannot take parameters, like `QUOTENAME`.
pub fn quote_identifier(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(ToolkitError::InvalidArgument(
            "database name must not be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_IDENTIFIER_LEN {
        return Err(ToolkitError::InvalidArgument(format!(
            "database name is longer than {} characters",
            MAX_IDENTIFIER_LEN
        )));
    }
    Ok(format!("[{}]", name.replace(']', "]]")))
}

pub fn file_list(backup_path: &str) -> Statement {
    Statement::new("RESTORE FILELISTONLY FROM DISK = @P1").bind(backup_path)
}

pub fn set_single_user(quoted_database: &str) -> Statement {
    Statement::new(format!(
        "ALTER DATABASE {} SET SINGLE_USER WITH ROLLBACK IMMEDIATE",
        quoted_database
    ))
}

pub fn set_multi_user(quoted_database: &str) -> Statement {
    Statement::new(format!("ALTER DATABASE {} SET MULTI_USER", quoted_database))
        .with_timeout(LONG_COMMAND_TIMEOUT)
}

pub fn restore_with_move(
    database_name: &str,
    backup_path: &str,
    data_logical_name: &str,
    data_file_path: &str,
    log_logical_name: &str,
    log_file_path: &str,
) -> Statement {
    Statement::new(
        "RESTORE DATABASE @P1 FROM DISK = @P2 WITH REPLACE, MOVE @P3 TO @P4, MOVE @P5 TO @P6",
    )
    .bind(database_name)
    .bind(backup_path)
    .bind(data_logical_name)
    .bind(data_file_path)
    .bind(log_logical_name)
    .bind(log_file_path)
    .with_timeout(LONG_COMMAND_TIMEOUT)
}

pub fn backup_with_format(database_name: &str, backup_path: &str) -> Statement {
    Statement::new(
        "BACKUP DATABASE @P1 TO DISK = @P2 WITH FORMAT, MEDIANAME = @P3, NAME = @P4",
    )
    .bind(database_name)
    .bind(backup_path)
    .bind(format!("DatabaseToolkitBackup_{}", database_name))
    .bind(format!("Full Backup of {}", database_name))
    .with_timeout(LONG_COMMAND_TIMEOUT)
}
