// databasetoolkit/src/sqlserver/mod.rs
pub(crate) mod access;
pub(crate) mod connection;
pub(crate) mod manifest;
pub(crate) mod statements;

#[cfg(test)]
pub(crate) mod fake;

use chrono::Local;
use std::time::Duration;
use tracing::{error, info};

use crate::config::SqlServerConfig;
use crate::errors::{Result, Stage, ToolkitError};
use access::ExclusiveAccess;
use connection::{SqlConnector, TiberiusConnector};
use manifest::BackupFileManifest;

const BACKUP_EXTENSION: &str = ".bak";

/// Joins path segments the way the SQL Server host expects them.
///
/// The separator follows the base path, so `C:\backups` keeps backslashes and
/// `/var/opt/mssql` keeps forward slashes regardless of where the tool runs.
pub fn join_server_path(base_path: &str, segments: &[&str]) -> String {
    let separator = if base_path.contains('\\') && !base_path.contains('/') {
        '\\'
    } else {
        '/'
    };
    let mut path = base_path.trim_end_matches(['/', '\\']).to_string();
    for segment in segments {
        path.push(separator);
        path.push_str(segment);
    }
    path
}

/// A validated restore or backup target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreRequest {
    pub database_name: String,
    pub quoted_database: String,
    pub backup_path: String,
}

impl RestoreRequest {
    pub fn new(database_name: &str, backup_path: Option<&str>, base_path: &str) -> Result<Self> {
        if database_name.trim().is_empty() {
            return Err(ToolkitError::InvalidArgument(
                "database name must not be empty".to_string(),
            ));
        }
        let quoted_database = statements::quote_identifier(database_name)?;

        let backup_path = match backup_path {
            Some(path) if path.ends_with(BACKUP_EXTENSION) => path.to_string(),
            Some(path) => {
                return Err(ToolkitError::InvalidArgument(format!(
                    "backup path must end with {}: {}",
                    BACKUP_EXTENSION, path
                )));
            }
            None if database_name.contains(['/', '\\']) => {
                return Err(ToolkitError::InvalidArgument(format!(
                    "database name cannot be used in a default backup path: {}",
                    database_name
                )));
            }
            None => join_server_path(
                base_path,
                &["Backup", &format!("{}{}", database_name, BACKUP_EXTENSION)],
            ),
        };

        Ok(RestoreRequest {
            database_name: database_name.to_string(),
            quoted_database,
            backup_path,
        })
    }
}

/// Where the restored data and log files are placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestorePlan {
    pub data_file_path: String,
    pub log_file_path: String,
}

impl RestorePlan {
    pub fn new(base_path: &str, manifest: &BackupFileManifest) -> Self {
        RestorePlan {
            data_file_path: join_server_path(
                base_path,
                &["DATA", &format!("{}.mdf", manifest.data_logical_name)],
            ),
            log_file_path: join_server_path(
                base_path,
                &["DATA", &format!("{}.ldf", manifest.log_logical_name)],
            ),
        }
    }
}

/// Backs up and restores SQL Server databases with T-SQL over a driver connection.
pub struct SqlServerToolkit<C: SqlConnector> {
    connector: C,
    base_path: String,
    command_timeout: Duration,
}

impl SqlServerToolkit<TiberiusConnector> {
    pub fn from_config(config: &SqlServerConfig) -> Self {
        Self::new(config, TiberiusConnector::new(config.connection_string.clone()))
    }
}

impl<C: SqlConnector> SqlServerToolkit<C> {
    pub fn new(config: &SqlServerConfig, connector: C) -> Self {
        SqlServerToolkit {
            connector,
            base_path: config.base_path.clone(),
            command_timeout: config.command_timeout,
        }
    }

    /// Restores `database_name` from a `.bak` file, replacing the existing database.
    ///
    /// Reads the logical file names from the backup, puts the database in
    /// single-user mode, restores `WITH REPLACE` while moving the data and log
    /// files under `{base}/DATA`, then returns the database to multi-user mode.
    /// Multi-user mode is restored even when the restore statement fails.
    ///
    /// Without `backup_path` the file is `{base}/Backup/{database_name}.bak`.
    pub async fn restore_database(&self, database_name: &str, backup_path: Option<&str>) -> Result<()> {
        let request = RestoreRequest::new(database_name, backup_path, &self.base_path)?;
        info!(
            "🔄 Restoring SQL Server database {} from {} (started {})",
            request.database_name,
            request.backup_path,
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );

        let manifest = self.discover_manifest(&request.backup_path).await?;
        let plan = RestorePlan::new(&self.base_path, &manifest);

        let result = self.run_restore(&request, &manifest, &plan).await;
        match &result {
            Ok(()) => info!(
                "✅ Restored {} (data: {}, log: {})",
                request.database_name, plan.data_file_path, plan.log_file_path
            ),
            Err(e) if e.stage() == Some(Stage::MultiUser) => error!(
                "❌ {} was restored but is still in SINGLE_USER mode: {}",
                request.database_name, e
            ),
            Err(e) => error!("❌ Restore of {} failed: {}", request.database_name, e),
        }
        result
    }

    /// Backs up `database_name` to a `.bak` file using `WITH FORMAT`.
    ///
    /// The media set at the destination is reinitialised, so any earlier
    /// backups stored in that file are lost.
    pub async fn backup_database(&self, database_name: &str, backup_path: Option<&str>) -> Result<()> {
        let request = RestoreRequest::new(database_name, backup_path, &self.base_path)?;
        info!(
            "🚀 Backing up SQL Server database {} to {} (started {})",
            request.database_name,
            request.backup_path,
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );

        let statement = statements::backup_with_format(&request.database_name, &request.backup_path)
            .with_timeout(self.command_timeout);
        let result = async {
            let mut session = self.connector.connect().await?;
            session.execute(&statement).await
        }
        .await
        .map(|_| ())
        .map_err(|e| ToolkitError::server(Stage::Backup, e));

        match &result {
            Ok(()) => info!("✅ Backup of {} written to {}", request.database_name, request.backup_path),
            Err(e) => error!("❌ Backup of {} failed: {}", request.database_name, e),
        }
        result
    }

    async fn discover_manifest(&self, backup_path: &str) -> Result<BackupFileManifest> {
        let rows = async {
            let mut session = self.connector.connect().await?;
            session.query(&statements::file_list(backup_path)).await
        }
        .await
        .map_err(|e| ToolkitError::server(Stage::FileList, e))?;

        let manifest = BackupFileManifest::from_rows(backup_path, &rows)?;
        info!(
            "Found logical files in {}: data={}, log={}",
            backup_path, manifest.data_logical_name, manifest.log_logical_name
        );
        Ok(manifest)
    }

    async fn run_restore(
        &self,
        request: &RestoreRequest,
        manifest: &BackupFileManifest,
        plan: &RestorePlan,
    ) -> Result<()> {
        let mut access =
            ExclusiveAccess::enter(&self.connector, &request.quoted_database, self.command_timeout).await?;
        let restored = access
            .restore(
                &statements::restore_with_move(
                    &request.database_name,
                    &request.backup_path,
                    &manifest.data_logical_name,
                    &plan.data_file_path,
                    &manifest.log_logical_name,
                    &plan.log_file_path,
                )
                .with_timeout(self.command_timeout),
            )
            .await;
        let released = access.release().await;

        match (restored, released) {
            (Ok(()), released) => released,
            (Err(restore_err), Ok(())) => Err(restore_err),
            (Err(restore_err), Err(release_err)) => Err(stranded(restore_err, release_err)),
        }
    }
}

/// Attaches a failed multi-user recovery to the restore error that caused it.
fn stranded(restore_err: ToolkitError, release_err: ToolkitError) -> ToolkitError {
    match restore_err {
        ToolkitError::Server { stage, source } => ToolkitError::Server {
            stage,
            source: source.context(format!(
                "database may remain in SINGLE_USER mode ({})",
                release_err
            )),
        },
        other => other,
    }
}
