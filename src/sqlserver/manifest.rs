// databasetoolkit/src/sqlserver/manifest.rs
use crate::errors::{Result, ToolkitError};

use super::connection::ResultRow;

const TYPE_COLUMN: &str = "Type";
const LOGICAL_NAME_COLUMN: &str = "LogicalName";

/// Logical file names stored inside a `.bak` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupFileManifest {
    pub data_logical_name: String,
    pub log_logical_name: String,
}

impl BackupFileManifest {
    /// Classifies `RESTORE FILELISTONLY` rows by their type marker.
    ///
    /// `D` rows name the data file and `L` rows the log file; a later row of
    /// the same type replaces an earlier one. Other types (full-text catalogs,
    /// filestream) are ignored. Both entries must be present.
    pub fn from_rows(backup_path: &str, rows: &[ResultRow]) -> Result<Self> {
        let mut data_logical_name = None;
        let mut log_logical_name = None;

        for row in rows {
            let Some(logical_name) = row.get(LOGICAL_NAME_COLUMN) else {
                continue;
            };
            match row.get(TYPE_COLUMN).map(str::trim) {
                Some("D") => data_logical_name = Some(logical_name.to_string()),
                Some("L") => log_logical_name = Some(logical_name.to_string()),
                _ => {}
            }
        }

        let data_logical_name = data_logical_name
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| ToolkitError::ManifestIncomplete {
                backup_path: backup_path.to_string(),
                missing: "data",
            })?;
        let log_logical_name = log_logical_name
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| ToolkitError::ManifestIncomplete {
                backup_path: backup_path.to_string(),
                missing: "log",
            })?;

        Ok(BackupFileManifest {
            data_logical_name,
            log_logical_name,
        })
    }
}
