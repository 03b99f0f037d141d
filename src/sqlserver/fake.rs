// databasetoolkit/src/sqlserver/fake.rs
//! In-memory SQL Server used by the coordinator tests.
//!
//! It understands exactly the statements the toolkit issues and keeps enough
//! server state (access modes, file placement, backup media) to check their
//! effects.
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::connection::{ResultRow, SqlConnector, SqlSession, with_timeout};
use super::statements::Statement;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    SingleUser,
    MultiUser,
}

#[derive(Debug, Clone)]
pub struct FakeDatabase {
    pub mode: AccessMode,
    pub data_logical_name: String,
    pub log_logical_name: String,
    pub data_file: Option<String>,
    pub log_file: Option<String>,
    pub contents: String,
}

#[derive(Debug, Clone)]
pub struct FakeBackupSet {
    pub media_name: String,
    pub name: String,
    pub file_list: Vec<ResultRow>,
    pub data_logical_name: String,
    pub log_logical_name: String,
    pub contents: String,
}

#[derive(Default)]
struct FakeState {
    databases: HashMap<String, FakeDatabase>,
    media: HashMap<String, Vec<FakeBackupSet>>,
    statements: Vec<Statement>,
    fail_fragments: Vec<String>,
    hang_fragments: Vec<String>,
    opened: usize,
    open_now: usize,
}

#[derive(Clone, Default)]
pub struct FakeServer {
    state: Arc<Mutex<FakeState>>,
}

fn file_list_rows(data_logical_name: &str, log_logical_name: &str) -> Vec<ResultRow> {
    vec![
        [("LogicalName", data_logical_name), ("Type", "D")].into_iter().collect(),
        [("LogicalName", log_logical_name), ("Type", "L")].into_iter().collect(),
    ]
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn with_database(self, name: &str, data_logical_name: &str, log_logical_name: &str, contents: &str) -> Self {
        self.lock().databases.insert(
            name.to_string(),
            FakeDatabase {
                mode: AccessMode::MultiUser,
                data_logical_name: data_logical_name.to_string(),
                log_logical_name: log_logical_name.to_string(),
                data_file: None,
                log_file: None,
                contents: contents.to_string(),
            },
        );
        self
    }

    /// Seeds a media file holding one backup set with the given file list.
    pub fn with_backup_file(self, path: &str, file_list: Vec<ResultRow>, contents: &str) -> Self {
        let data = find_logical(&file_list, "D");
        let log = find_logical(&file_list, "L");
        self.lock().media.insert(
            path.to_string(),
            vec![FakeBackupSet {
                media_name: String::new(),
                name: String::new(),
                file_list,
                data_logical_name: data,
                log_logical_name: log,
                contents: contents.to_string(),
            }],
        );
        self
    }

    pub fn with_standard_backup(self, path: &str, data_logical_name: &str, log_logical_name: &str, contents: &str) -> Self {
        self.with_backup_file(path, file_list_rows(data_logical_name, log_logical_name), contents)
    }

    /// Makes every statement whose SQL contains `fragment` fail.
    pub fn fail_when(self, fragment: &str) -> Self {
        self.lock().fail_fragments.push(fragment.to_string());
        self
    }

    /// Makes every statement whose SQL contains `fragment` never complete.
    ///
    /// The session it ran on stays busy, like a driver still waiting for the
    /// response, and hangs on every later statement.
    pub fn hang_when(self, fragment: &str) -> Self {
        self.lock().hang_fragments.push(fragment.to_string());
        self
    }

    pub fn set_contents(&self, database: &str, contents: &str) {
        if let Some(db) = self.lock().databases.get_mut(database) {
            db.contents = contents.to_string();
        }
    }

    pub fn mode(&self, database: &str) -> Option<AccessMode> {
        self.lock().databases.get(database).map(|db| db.mode)
    }

    pub fn database(&self, database: &str) -> Option<FakeDatabase> {
        self.lock().databases.get(database).cloned()
    }

    pub fn media(&self, path: &str) -> Vec<FakeBackupSet> {
        self.lock().media.get(path).cloned().unwrap_or_default()
    }

    pub fn statements(&self) -> Vec<Statement> {
        self.lock().statements.clone()
    }

    /// Short label of every statement run, in order.
    pub fn statement_kinds(&self) -> Vec<String> {
        self.lock()
            .statements
            .iter()
            .map(|s| {
                if s.sql.contains("SINGLE_USER") {
                    "SINGLE_USER".to_string()
                } else if s.sql.contains("MULTI_USER") {
                    "MULTI_USER".to_string()
                } else if s.sql.starts_with("RESTORE FILELISTONLY") {
                    "FILELISTONLY".to_string()
                } else if s.sql.starts_with("RESTORE DATABASE") {
                    "RESTORE".to_string()
                } else if s.sql.starts_with("BACKUP DATABASE") {
                    "BACKUP".to_string()
                } else {
                    s.sql.clone()
                }
            })
            .collect()
    }

    pub fn connections_opened(&self) -> usize {
        self.lock().opened
    }

    pub fn connections_open_now(&self) -> usize {
        self.lock().open_now
    }
}

fn find_logical(file_list: &[ResultRow], file_type: &str) -> String {
    file_list
        .iter()
        .rev()
        .find(|row| row.get("Type") == Some(file_type))
        .and_then(|row| row.get("LogicalName"))
        .unwrap_or_default()
        .to_string()
}

fn unquote(quoted: &str) -> String {
    quoted
        .trim_start_matches('[')
        .trim_end_matches(']')
        .replace("]]", "]")
}

fn param(statement: &Statement, idx: usize) -> Result<&str> {
    statement
        .params
        .get(idx)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("Must declare the scalar variable \"@P{}\"", idx + 1))
}

#[async_trait]
impl SqlConnector for FakeServer {
    async fn connect(&self) -> Result<Box<dyn SqlSession>> {
        {
            let mut state = self.lock();
            state.opened += 1;
            state.open_now += 1;
        }
        Ok(Box::new(FakeSession {
            server: self.clone(),
            busy: false,
        }))
    }
}

struct FakeSession {
    server: FakeServer,
    busy: bool,
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.server.lock().open_now -= 1;
    }
}

impl FakeSession {
    /// Records the statement and reports whether it will never be answered.
    fn hangs_on(&mut self, statement: &Statement) -> bool {
        let mut state = self.server.lock();
        self.busy = self.busy
            || state
                .hang_fragments
                .iter()
                .any(|fragment| statement.sql.contains(fragment.as_str()));
        if self.busy {
            state.statements.push(statement.clone());
        }
        self.busy
    }

    fn record(&self, statement: &Statement) -> Result<MutexGuard<'_, FakeState>> {
        let mut state = self.server.lock();
        state.statements.push(statement.clone());
        if state
            .fail_fragments
            .iter()
            .any(|fragment| statement.sql.contains(fragment.as_str()))
        {
            return Err(anyhow!("injected failure for: {}", statement.sql));
        }
        Ok(state)
    }
}

#[async_trait]
impl SqlSession for FakeSession {
    async fn execute(&mut self, statement: &Statement) -> Result<u64> {
        if self.hangs_on(statement) {
            return with_timeout(statement, std::future::pending()).await;
        }
        self.apply(statement)
    }

    async fn query(&mut self, statement: &Statement) -> Result<Vec<ResultRow>> {
        if self.hangs_on(statement) {
            return with_timeout(statement, std::future::pending()).await;
        }
        let state = self.record(statement)?;
        if statement.sql.starts_with("RESTORE FILELISTONLY") {
            let path = param(statement, 0)?;
            return state
                .media
                .get(path)
                .and_then(|sets| sets.last())
                .map(|set| set.file_list.clone())
                .ok_or_else(|| anyhow!("Cannot open backup device '{}'", path));
        }
        Err(anyhow!("Unsupported query: {}", statement.sql))
    }
}

impl FakeSession {
    fn apply(&self, statement: &Statement) -> Result<u64> {
        let mut state = self.record(statement)?;
        let sql = statement.sql.as_str();

        if let Some(rest) = sql.strip_prefix("ALTER DATABASE ") {
            let (quoted, setting) = rest
                .split_once(" SET ")
                .ok_or_else(|| anyhow!("Incorrect syntax near 'ALTER DATABASE'"))?;
            let name = unquote(quoted);
            let db = state
                .databases
                .get_mut(&name)
                .ok_or_else(|| anyhow!("Database '{}' does not exist", name))?;
            db.mode = if setting.starts_with("SINGLE_USER") {
                AccessMode::SingleUser
            } else {
                AccessMode::MultiUser
            };
            return Ok(0);
        }

        if sql.starts_with("RESTORE DATABASE") {
            let name = param(statement, 0)?.to_string();
            let path = param(statement, 1)?;
            let set = state
                .media
                .get(path)
                .and_then(|sets| sets.last())
                .cloned()
                .ok_or_else(|| anyhow!("Cannot open backup device '{}'", path))?;
            let data_file = param(statement, 3)?.to_string();
            let log_file = param(statement, 5)?.to_string();
            if param(statement, 2)? != set.data_logical_name || param(statement, 4)? != set.log_logical_name {
                return Err(anyhow!("Logical file is not part of database '{}'", name));
            }

            let db = state.databases.entry(name).or_insert_with(|| FakeDatabase {
                mode: AccessMode::MultiUser,
                data_logical_name: set.data_logical_name.clone(),
                log_logical_name: set.log_logical_name.clone(),
                data_file: None,
                log_file: None,
                contents: String::new(),
            });
            db.contents = set.contents;
            db.data_logical_name = set.data_logical_name;
            db.log_logical_name = set.log_logical_name;
            db.data_file = Some(data_file);
            db.log_file = Some(log_file);
            return Ok(0);
        }

        if sql.starts_with("BACKUP DATABASE") {
            let name = param(statement, 0)?;
            let path = param(statement, 1)?.to_string();
            let db = state
                .databases
                .get(name)
                .cloned()
                .ok_or_else(|| anyhow!("Database '{}' does not exist", name))?;
            let set = FakeBackupSet {
                media_name: param(statement, 2)?.to_string(),
                name: param(statement, 3)?.to_string(),
                file_list: file_list_rows(&db.data_logical_name, &db.log_logical_name),
                data_logical_name: db.data_logical_name,
                log_logical_name: db.log_logical_name,
                contents: db.contents,
            };
            let sets = state.media.entry(path).or_default();
            if sql.contains("WITH FORMAT") {
                sets.clear();
            }
            sets.push(set);
            return Ok(0);
        }

        Err(anyhow!("Unsupported statement: {}", sql))
    }
}
