// databasetoolkit/src/tools/mysql.rs
use std::path::{Path, PathBuf};
use tracing::info;

use super::{StdinSource, ToolInvocation, ToolRunner, require};
use crate::config::MySqlConfig;
use crate::errors::Result;

/// MySQL backups with `mysqldump` and restores with `mysql`.
///
/// Credentials come from the defaults file (`my.cnf` / `my.ini`) named in the config.
pub struct MySqlToolkit<R: ToolRunner> {
    config: MySqlConfig,
    runner: R,
}

impl<R: ToolRunner> MySqlToolkit<R> {
    pub fn new(config: &MySqlConfig, runner: R) -> Self {
        MySqlToolkit {
            config: config.clone(),
            runner,
        }
    }

    fn defaults_file_arg(&self) -> String {
        format!("--defaults-file={}", self.config.defaults_file_path)
    }

    pub fn backup_invocation(&self, database_name: &str, backup_path: &Path) -> Result<ToolInvocation> {
        require(database_name, "database name")?;
        require(&backup_path.to_string_lossy(), "backup path")?;

        // --defaults-file has to come first for mysqldump to accept it
        Ok(ToolInvocation::new(&self.config.dump_path)
            .arg(self.defaults_file_arg())
            .arg(format!("--result-file={}", backup_path.display()))
            .arg(database_name))
    }

    pub fn restore_invocation(&self, database_name: &str, backup_path: &Path) -> Result<ToolInvocation> {
        require(database_name, "database name")?;
        require(&backup_path.to_string_lossy(), "backup path")?;

        Ok(ToolInvocation::new("mysql")
            .arg(self.defaults_file_arg())
            .arg(database_name)
            .stdin(StdinSource::File(PathBuf::from(backup_path))))
    }

    pub fn backup_database(&self, database_name: &str, backup_path: &Path) -> Result<()> {
        let invocation = self.backup_invocation(database_name, backup_path)?;
        info!("🚀 Dumping MySQL database {} to {}", database_name, backup_path.display());
        self.runner.run(&invocation)?;
        info!("✅ MySQL backup of {} complete", database_name);
        Ok(())
    }

    pub fn restore_database(&self, database_name: &str, backup_path: &Path) -> Result<()> {
        let invocation = self.restore_invocation(database_name, backup_path)?;
        info!("🔄 Restoring MySQL database {} from {}", database_name, backup_path.display());
        self.runner.run(&invocation)?;
        info!("✅ MySQL restore of {} complete", database_name);
        Ok(())
    }
}
