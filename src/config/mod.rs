// databasetoolkit/src/config/mod.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::sqlserver::statements::LONG_COMMAND_TIMEOUT;

/// Environment variable (and `connection_strings` key) holding the SQL Server connection string.
pub const CONNECTION_STRING_KEY: &str = "Database";

// Structs for deserializing config.json
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawJsonConfig {
    pub application_name: Option<String>,
    pub version: Option<String>,
    #[serde(default)]
    pub connection_strings: HashMap<String, String>,
    pub sql_server_base_path: Option<String>,
    pub sql_server_command_timeout_seconds: Option<u64>,
    pub mysql: Option<JsonMySqlConfig>,
    pub postgresql: Option<JsonPostgreSqlConfig>,
    pub mongodb: Option<JsonMongoDbConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonMySqlConfig {
    pub dump_path: Option<String>,
    pub defaults_file_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonPostgreSqlConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonMongoDbConfig {
    pub user: Option<String>,
    pub password: Option<String>,
    pub authentication_database: Option<String>,
}

// Application's internal configuration structs
#[derive(Debug, Clone)]
pub struct SqlServerConfig {
    pub connection_string: String,
    /// Root on the SQL Server host containing `Backup` and `DATA`.
    pub base_path: String,
    /// Limit for RESTORE, BACKUP and the return to MULTI_USER.
    pub command_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct MySqlConfig {
    pub dump_path: String,
    pub defaults_file_path: String,
}

#[derive(Debug, Clone)]
pub struct PostgreSqlConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
}

#[derive(Debug, Clone, Default)]
pub struct MongoDbConfig {
    pub user: Option<String>,
    pub password: Option<String>,
    pub authentication_database: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub application_name: String,
    pub version: String,
    pub raw_json_config: RawJsonConfig,
    /// Value of the `Database` environment variable at load time.
    pub connection_string_override: Option<String>,
}

impl AppConfig {
    pub fn load_from_json(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
        let raw_json_config: RawJsonConfig = serde_json::from_str(&config_content)
            .with_context(|| {
                format!(
                    "Failed to parse JSON from config file at {}",
                    config_path.display()
                )
            })?;

        let connection_string_override = env::var(CONNECTION_STRING_KEY)
            .ok()
            .filter(|s| !s.trim().is_empty());

        Ok(Self::from_raw(raw_json_config, connection_string_override))
    }

    pub fn from_raw(raw_json_config: RawJsonConfig, connection_string_override: Option<String>) -> Self {
        AppConfig {
            application_name: raw_json_config
                .application_name
                .clone()
                .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string()),
            version: raw_json_config
                .version
                .clone()
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            raw_json_config,
            connection_string_override,
        }
    }

    /// The SQL Server connection string; the environment variable wins over `connection_strings`.
    pub fn connection_string(&self) -> Result<String> {
        resolve_connection_string(
            self.connection_string_override.as_deref(),
            &self.raw_json_config.connection_strings,
        )
    }

    pub fn sql_server(&self) -> Result<SqlServerConfig> {
        let base_path = self
            .raw_json_config
            .sql_server_base_path
            .as_ref()
            .context("sql_server_base_path must be set in config.json for SQL Server operations")?
            .trim()
            .to_string();

        if base_path.is_empty() {
            return Err(anyhow::anyhow!(
                "sql_server_base_path cannot be empty in config.json."
            ));
        }

        let command_timeout = match self.raw_json_config.sql_server_command_timeout_seconds {
            Some(0) => {
                return Err(anyhow::anyhow!(
                    "sql_server_command_timeout_seconds must be greater than zero in config.json."
                ));
            }
            Some(seconds) => Duration::from_secs(seconds),
            None => LONG_COMMAND_TIMEOUT,
        };

        Ok(SqlServerConfig {
            connection_string: self.connection_string()?,
            base_path,
            command_timeout,
        })
    }

    pub fn mysql(&self) -> Result<MySqlConfig> {
        let raw = self
            .raw_json_config
            .mysql
            .as_ref()
            .context("mysql section must be defined in config.json for MySQL operations")?;
        let defaults_file_path = raw
            .defaults_file_path
            .clone()
            .filter(|s| !s.trim().is_empty())
            .context("mysql.defaults_file_path must be set in config.json")?;

        Ok(MySqlConfig {
            dump_path: raw
                .dump_path
                .clone()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "mysqldump".to_string()),
            defaults_file_path,
        })
    }

    pub fn postgresql(&self) -> Result<PostgreSqlConfig> {
        let raw = self
            .raw_json_config
            .postgresql
            .as_ref()
            .context("postgresql section must be defined in config.json for PostgreSQL operations")?;

        Ok(PostgreSqlConfig {
            host: raw
                .host
                .clone()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "localhost".to_string()),
            port: raw.port.unwrap_or(5432),
            user: raw
                .user
                .clone()
                .filter(|s| !s.trim().is_empty())
                .context("postgresql.user must be set in config.json (it must match your pgpass entry)")?,
        })
    }

    /// MongoDB credentials are only checked when authentication is requested.
    pub fn mongodb(&self) -> MongoDbConfig {
        let raw = self.raw_json_config.mongodb.clone().unwrap_or_default();
        MongoDbConfig {
            user: raw.user.filter(|s| !s.is_empty()),
            password: raw.password.filter(|s| !s.is_empty()),
            authentication_database: raw.authentication_database.filter(|s| !s.is_empty()),
        }
    }
}

fn resolve_connection_string(
    env_value: Option<&str>,
    connection_strings: &HashMap<String, String>,
) -> Result<String> {
    if let Some(value) = env_value.filter(|v| !v.trim().is_empty()) {
        return Ok(value.to_string());
    }

    connection_strings
        .get(CONNECTION_STRING_KEY)
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .with_context(|| {
            format!(
                "No SQL Server connection string: set the {} environment variable or connection_strings.{} in config.json",
                CONNECTION_STRING_KEY, CONNECTION_STRING_KEY
            )
        })
}
