// databasetoolkit/src/tools/sqlite.rs
use std::path::Path;
use tracing::info;

use super::{ToolInvocation, ToolRunner, require};
use crate::errors::Result;

/// SQLite backups and restores with the `sqlite3` shell's `.backup`/`.restore` commands.
pub struct SqliteToolkit<R: ToolRunner> {
    runner: R,
}

/// Quotes a path as a dot-command argument; the sqlite3 shell treats `\` as an escape.
fn dot_command_path(path: &Path) -> String {
    let escaped = path
        .display()
        .to_string()
        .replace('\\', "\\\\")
        .replace('\'', "''");
    format!("'{}'", escaped)
}

impl<R: ToolRunner> SqliteToolkit<R> {
    pub fn new(runner: R) -> Self {
        SqliteToolkit { runner }
    }

    fn invocation(&self, command: &str, database_file: &Path, backup_path: &Path) -> Result<ToolInvocation> {
        require(&database_file.to_string_lossy(), "database file")?;
        require(&backup_path.to_string_lossy(), "backup path")?;

        Ok(ToolInvocation::new("sqlite3")
            .arg(database_file.display().to_string())
            .arg(format!("{} {}", command, dot_command_path(backup_path))))
    }

    pub fn backup_invocation(&self, database_file: &Path, backup_path: &Path) -> Result<ToolInvocation> {
        self.invocation(".backup", database_file, backup_path)
    }

    pub fn restore_invocation(&self, database_file: &Path, backup_path: &Path) -> Result<ToolInvocation> {
        self.invocation(".restore", database_file, backup_path)
    }

    pub fn backup_database(&self, database_file: &Path, backup_path: &Path) -> Result<()> {
        let invocation = self.backup_invocation(database_file, backup_path)?;
        info!("🚀 Backing up SQLite database {} to {}", database_file.display(), backup_path.display());
        self.runner.run(&invocation)?;
        info!("✅ SQLite backup of {} complete", database_file.display());
        Ok(())
    }

    pub fn restore_database(&self, database_file: &Path, backup_path: &Path) -> Result<()> {
        let invocation = self.restore_invocation(database_file, backup_path)?;
        info!("🔄 Restoring SQLite database {} from {}", database_file.display(), backup_path.display());
        self.runner.run(&invocation)?;
        info!("✅ SQLite restore of {} complete", database_file.display());
        Ok(())
    }
}
