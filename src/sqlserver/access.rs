// databasetoolkit/src/sqlserver/access.rs
use std::time::Duration;
use tracing::{info, warn};

use crate::errors::{Result, Stage, ToolkitError};

use super::connection::{SqlConnector, SqlSession, StatementTimeout};
use super::statements::{self, Statement};

/// Access mode of the target database as seen by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessState {
    Normal,
    SingleUser,
    Restoring,
}

/// Holds a database in single-user mode for the length of a restore.
///
/// The guard owns the session that put the database in single-user mode.
/// `release` must be awaited on every path once `enter` succeeded; the guard
/// warns on drop if the database was left in single-user mode.
pub struct ExclusiveAccess<'c> {
    connector: &'c dyn SqlConnector,
    session: Box<dyn SqlSession>,
    quoted_database: String,
    command_timeout: Duration,
    state: AccessState,
    /// Set when a statement timed out and its response is still pending.
    session_abandoned: bool,
}

impl<'c> ExclusiveAccess<'c> {
    /// Opens a session and switches the database to single-user mode, rolling back other sessions.
    pub async fn enter(
        connector: &'c dyn SqlConnector,
        quoted_database: &str,
        command_timeout: Duration,
    ) -> Result<Self> {
        let mut session = connector
            .connect()
            .await
            .map_err(|e| ToolkitError::server(Stage::SingleUser, e))?;
        session
            .execute(&statements::set_single_user(quoted_database))
            .await
            .map_err(|e| ToolkitError::server(Stage::SingleUser, e))?;
        info!("🔒 {} set to SINGLE_USER", quoted_database);

        Ok(ExclusiveAccess {
            connector,
            session,
            quoted_database: quoted_database.to_string(),
            command_timeout,
            state: AccessState::SingleUser,
            session_abandoned: false,
        })
    }

    #[cfg(test)]
    pub fn state(&self) -> AccessState {
        self.state
    }

    /// Runs the restore statement on the exclusive session.
    pub async fn restore(&mut self, statement: &Statement) -> Result<()> {
        self.state = AccessState::Restoring;
        let result = self.session.execute(statement).await;
        self.state = AccessState::SingleUser;
        if let Err(e) = &result {
            self.session_abandoned = e.is::<StatementTimeout>();
        }
        result
            .map(|_| ())
            .map_err(|e| ToolkitError::server(Stage::Restore, e))
    }

    /// Returns the database to multi-user mode.
    ///
    /// After a timed-out restore the old session still owes the server's
    /// response, so the statement goes out on a fresh session instead.
    pub async fn release(mut self) -> Result<()> {
        if self.session_abandoned {
            warn!(
                "⚠️ Restore of {} timed out; returning it to MULTI_USER on a new connection",
                self.quoted_database
            );
            self.session = self
                .connector
                .connect()
                .await
                .map_err(|e| ToolkitError::server(Stage::MultiUser, e))?;
            self.session_abandoned = false;
        }

        self.session
            .execute(&statements::set_multi_user(&self.quoted_database).with_timeout(self.command_timeout))
            .await
            .map_err(|e| ToolkitError::server(Stage::MultiUser, e))?;
        self.state = AccessState::Normal;
        info!("🔓 {} set back to MULTI_USER", self.quoted_database);
        Ok(())
    }
}

impl Drop for ExclusiveAccess<'_> {
    fn drop(&mut self) {
        if self.state != AccessState::Normal {
            warn!(
                "⚠️ {} may still be in SINGLE_USER mode. Run `ALTER DATABASE {} SET MULTI_USER` to recover.",
                self.quoted_database, self.quoted_database
            );
        }
    }
}
