// databasetoolkit/src/sqlserver/connection.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tiberius::{Client, Config, ToSql};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use super::statements::Statement;

/// One result row, keeping only the columns that decode as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultRow {
    columns: HashMap<String, String>,
}

impl ResultRow {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns.get(column).map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ResultRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        ResultRow {
            columns: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Opens sessions against one SQL Server instance.
#[async_trait]
pub trait SqlConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn SqlSession>>;
}

/// An open connection. Dropping it closes the connection.
#[async_trait]
pub trait SqlSession: Send {
    /// Runs a statement that returns no rows and reports the rows affected.
    async fn execute(&mut self, statement: &Statement) -> Result<u64>;

    /// Runs a statement and collects the rows of its first result set.
    async fn query(&mut self, statement: &Statement) -> Result<Vec<ResultRow>>;
}

/// `SqlConnector` backed by tiberius over a tokio TCP stream.
pub struct TiberiusConnector {
    connection_string: String,
}

impl TiberiusConnector {
    pub fn new(connection_string: impl Into<String>) -> Self {
        TiberiusConnector {
            connection_string: connection_string.into(),
        }
    }
}

#[async_trait]
impl SqlConnector for TiberiusConnector {
    async fn connect(&self) -> Result<Box<dyn SqlSession>> {
        let config = Config::from_ado_string(&self.connection_string)
            .context("Invalid SQL Server connection string")?;
        let addr = config.get_addr();

        let tcp = TcpStream::connect(addr.clone())
            .await
            .with_context(|| format!("Failed to reach SQL Server at {}", addr))?;
        tcp.set_nodelay(true)?;

        let client = Client::connect(config, tcp.compat_write())
            .await
            .with_context(|| format!("Failed to log in to SQL Server at {}", addr))?;

        Ok(Box::new(TiberiusSession { client }))
    }
}

struct TiberiusSession {
    client: Client<Compat<TcpStream>>,
}

#[async_trait]
impl SqlSession for TiberiusSession {
    async fn execute(&mut self, statement: &Statement) -> Result<u64> {
        let params: Vec<&dyn ToSql> = statement.params.iter().map(|p| p as &dyn ToSql).collect();
        let result = with_timeout(statement, async {
            self.client
                .execute(statement.sql.as_str(), &params)
                .await
                .map_err(anyhow::Error::from)
        })
        .await?;
        Ok(result.total())
    }

    async fn query(&mut self, statement: &Statement) -> Result<Vec<ResultRow>> {
        let params: Vec<&dyn ToSql> = statement.params.iter().map(|p| p as &dyn ToSql).collect();
        let rows = with_timeout(statement, async {
            self.client
                .query(statement.sql.as_str(), &params)
                .await?
                .into_first_result()
                .await
                .map_err(anyhow::Error::from)
        })
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                row.columns()
                    .iter()
                    .enumerate()
                    .filter_map(|(idx, column)| {
                        row.try_get::<&str, usize>(idx)
                            .ok()
                            .flatten()
                            .map(|value| (column.name().to_string(), value.to_string()))
                    })
                    .collect()
            })
            .collect())
    }
}

/// The server did not answer within the statement's command timeout.
///
/// The request may still be running and its response is unread, so the
/// session it was sent on cannot be used for another statement.
#[derive(Debug, thiserror::Error)]
#[error("Statement timed out after {:?}", .0)]
pub struct StatementTimeout(pub Duration);

/// Applies the statement's command timeout, if it has one.
pub(crate) async fn with_timeout<T>(
    statement: &Statement,
    fut: impl Future<Output = Result<T>> + Send,
) -> Result<T> {
    match statement.timeout {
        Some(limit) => match timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(StatementTimeout(limit).into()),
        },
        None => fut.await,
    }
}
