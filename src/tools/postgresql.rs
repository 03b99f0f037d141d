// databasetoolkit/src/tools/postgresql.rs
use std::path::Path;
use tracing::info;

use super::{ToolInvocation, ToolRunner, require};
use crate::config::PostgreSqlConfig;
use crate::errors::Result;

/// PostgreSQL backups with `pg_dump` (custom format) and restores with `pg_restore`.
///
/// Passwords are never passed on the command line: host, port, user and
/// database must match an entry in the user's pgpass file.
pub struct PostgreSqlToolkit<R: ToolRunner> {
    config: PostgreSqlConfig,
    runner: R,
}

impl<R: ToolRunner> PostgreSqlToolkit<R> {
    pub fn new(config: &PostgreSqlConfig, runner: R) -> Self {
        PostgreSqlToolkit {
            config: config.clone(),
            runner,
        }
    }

    fn with_connection_args(&self, invocation: ToolInvocation) -> ToolInvocation {
        invocation
            .arg("--host")
            .arg(&self.config.host)
            .arg("--port")
            .arg(self.config.port.to_string())
            .arg("--username")
            .arg(&self.config.user)
            .arg("--no-password")
    }

    pub fn backup_invocation(&self, database_name: &str, backup_path: &Path) -> Result<ToolInvocation> {
        require(database_name, "database name")?;
        require(&backup_path.to_string_lossy(), "backup path")?;

        Ok(self
            .with_connection_args(ToolInvocation::new("pg_dump"))
            .arg("--format=custom")
            .arg("--file")
            .arg(backup_path.display().to_string())
            .arg(database_name))
    }

    pub fn restore_invocation(&self, database_name: &str, backup_path: &Path) -> Result<ToolInvocation> {
        require(database_name, "database name")?;
        require(&backup_path.to_string_lossy(), "backup path")?;

        Ok(self
            .with_connection_args(ToolInvocation::new("pg_restore"))
            .arg("--clean")
            .arg("--if-exists")
            .arg("--dbname")
            .arg(database_name)
            .arg(backup_path.display().to_string()))
    }

    pub fn backup_database(&self, database_name: &str, backup_path: &Path) -> Result<()> {
        let invocation = self.backup_invocation(database_name, backup_path)?;
        info!(
            "🚀 Dumping PostgreSQL database {} on {}:{} to {}",
            database_name,
            self.config.host,
            self.config.port,
            backup_path.display()
        );
        self.runner.run(&invocation)?;
        info!("✅ PostgreSQL backup of {} complete", database_name);
        Ok(())
    }

    pub fn restore_database(&self, database_name: &str, backup_path: &Path) -> Result<()> {
        let invocation = self.restore_invocation(database_name, backup_path)?;
        info!(
            "🔄 Restoring PostgreSQL database {} on {}:{} from {}",
            database_name,
            self.config.host,
            self.config.port,
            backup_path.display()
        );
        self.runner.run(&invocation)?;
        info!("✅ PostgreSQL restore of {} complete", database_name);
        Ok(())
    }
}
