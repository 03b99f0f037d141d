// databasetoolkit/src/tools/mongodb.rs
use std::path::Path;
use tracing::info;

use super::{StdinSource, ToolInvocation, ToolRunner, require};
use crate::config::MongoDbConfig;
use crate::errors::{Result, ToolkitError};

/// MongoDB gzip archive backups with `mongodump` and restores with `mongorestore`.
pub struct MongoDbToolkit<R: ToolRunner> {
    config: MongoDbConfig,
    runner: R,
}

impl<R: ToolRunner> MongoDbToolkit<R> {
    pub fn new(config: &MongoDbConfig, runner: R) -> Self {
        MongoDbToolkit {
            config: config.clone(),
            runner,
        }
    }

    /// Adds `--username`/`--authenticationDatabase` and sends the password on stdin.
    fn authenticate(&self, invocation: ToolInvocation) -> Result<ToolInvocation> {
        let (Some(user), Some(password), Some(auth_db)) = (
            self.config.user.as_ref(),
            self.config.password.as_ref(),
            self.config.authentication_database.as_ref(),
        ) else {
            return Err(ToolkitError::Config(
                "mongodb.user, mongodb.password and mongodb.authentication_database must be set in config.json to use authentication".to_string(),
            ));
        };

        Ok(invocation
            .arg(format!("--username={}", user))
            .arg(format!("--authenticationDatabase={}", auth_db))
            .stdin(StdinSource::Text(password.clone())))
    }

    pub fn backup_invocation(
        &self,
        database_name: &str,
        backup_path: &Path,
        with_authentication: bool,
    ) -> Result<ToolInvocation> {
        require(database_name, "database name")?;
        require(&backup_path.to_string_lossy(), "backup path")?;

        let invocation = ToolInvocation::new("mongodump")
            .arg(format!("--db={}", database_name))
            .arg(format!("--archive={}", backup_path.display()))
            .arg("--gzip");
        if with_authentication {
            self.authenticate(invocation)
        } else {
            Ok(invocation)
        }
    }

    /// The archive records which databases it holds, so no name is needed here.
    pub fn restore_invocation(&self, backup_path: &Path, with_authentication: bool) -> Result<ToolInvocation> {
        require(&backup_path.to_string_lossy(), "backup path")?;

        let invocation = ToolInvocation::new("mongorestore")
            .arg(format!("--archive={}", backup_path.display()))
            .arg("--gzip");
        if with_authentication {
            self.authenticate(invocation)
        } else {
            Ok(invocation)
        }
    }

    pub fn backup_database(&self, database_name: &str, backup_path: &Path, with_authentication: bool) -> Result<()> {
        let invocation = self.backup_invocation(database_name, backup_path, with_authentication)?;
        info!("🚀 Dumping MongoDB database {} to {}", database_name, backup_path.display());
        self.runner.run(&invocation)?;
        info!("✅ MongoDB backup of {} complete", database_name);
        Ok(())
    }

    pub fn restore_database(&self, backup_path: &Path, with_authentication: bool) -> Result<()> {
        let invocation = self.restore_invocation(backup_path, with_authentication)?;
        info!("🔄 Restoring MongoDB archive {}", backup_path.display());
        self.runner.run(&invocation)?;
        info!("✅ MongoDB restore from {} complete", backup_path.display());
        Ok(())
    }
}
