use std::fmt;
use std::process::ExitStatus;
use thiserror::Error;

/// The statement stage a SQL Server operation was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FileList,
    SingleUser,
    Restore,
    MultiUser,
    Backup,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::FileList => "file list discovery",
            Stage::SingleUser => "single-user transition",
            Stage::Restore => "restore",
            Stage::MultiUser => "multi-user restoration",
            Stage::Backup => "backup",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum ToolkitError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Backup file list for {backup_path} has no {missing} file entry")]
    ManifestIncomplete {
        backup_path: String,
        missing: &'static str,
    },

    #[error("SQL Server {stage} failed: {source:#}")]
    Server {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{program} executable not found in PATH")]
    ToolNotFound { program: String },

    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ToolkitError {
    pub fn server(stage: Stage, source: anyhow::Error) -> Self {
        ToolkitError::Server { stage, source }
    }

    /// Stage of a server-side failure, if this is one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ToolkitError::Server { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ToolkitError>;
