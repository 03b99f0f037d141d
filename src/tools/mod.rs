// databasetoolkit/src/tools/mod.rs
pub(crate) mod mongodb;
pub(crate) mod mysql;
pub(crate) mod postgresql;
pub(crate) mod sqlite;

#[cfg(test)]
pub(crate) mod recording;

use std::fs::File;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use tracing::{debug, info};
use which::which;

use crate::errors::{Result, ToolkitError};

/// What a tool reads on standard input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StdinSource {
    /// Written to the tool's stdin, then stdin is closed. Never logged.
    Text(String),
    File(PathBuf),
}

/// One run of an engine's native backup or restore program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<StdinSource>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<String>) -> Self {
        ToolInvocation {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn stdin(mut self, source: StdinSource) -> Self {
        self.stdin = Some(source);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Runs external programs to completion.
pub trait ToolRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput>;
}

impl<R: ToolRunner + ?Sized> ToolRunner for &R {
    fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput> {
        (**self).run(invocation)
    }
}

/// Runs tools as child processes found on `PATH`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemToolRunner;

impl SystemToolRunner {
    /// Paths that already exist are used as-is; bare names are looked up on `PATH`.
    fn find_executable(program: &str) -> Result<PathBuf> {
        let candidate = Path::new(program);
        if candidate.components().count() > 1 && candidate.exists() {
            return Ok(candidate.to_path_buf());
        }
        which(program).map_err(|_| ToolkitError::ToolNotFound {
            program: program.to_string(),
        })
    }
}

impl ToolRunner for SystemToolRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput> {
        let executable = Self::find_executable(&invocation.program)?;
        debug!("Found {} at {}", invocation.program, executable.display());

        let mut command = Command::new(&executable);
        command.args(&invocation.args).stderr(Stdio::piped());

        match &invocation.stdin {
            Some(StdinSource::Text(_)) => {
                command.stdin(Stdio::piped());
            }
            Some(StdinSource::File(path)) => {
                command.stdin(File::open(path)?);
            }
            None => {
                command.stdin(Stdio::null());
            }
        }
        command.stdout(Stdio::piped());

        info!("Running {} {}", invocation.program, invocation.args.join(" "));
        let mut child = command.spawn()?;
        if let (Some(StdinSource::Text(text)), Some(mut stdin)) = (&invocation.stdin, child.stdin.take()) {
            // A tool that exits before reading stdin still reports through its exit status.
            match writeln!(stdin, "{}", text) {
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                    debug!("{} closed stdin before reading it", invocation.program);
                }
                written => written?,
            }
        }
        let output = child.wait_with_output()?;

        let result = ToolOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !result.status.success() {
            return Err(ToolkitError::CommandFailed {
                program: invocation.program.clone(),
                status: result.status,
                stderr: result.stderr.trim().to_string(),
            });
        }
        if !result.stdout.trim().is_empty() {
            debug!("{} output: {}", invocation.program, result.stdout.trim());
        }
        Ok(result)
    }
}

/// Rejects empty database names and paths before any tool is started.
pub(crate) fn require(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ToolkitError::InvalidArgument(format!("{} must not be empty", what)));
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program_is_reported() {
        let err = SystemToolRunner
            .run(&ToolInvocation::new("definitely-not-a-database-tool-xyz"))
            .unwrap_err();
        assert!(matches!(err, ToolkitError::ToolNotFound { .. }));
    }

    #[test]
    fn test_stdout_is_captured() -> anyhow::Result<()> {
        let output = SystemToolRunner.run(&ToolInvocation::new("echo").arg("CREATE TABLE t;"))?;
        assert!(output.status.success());
        assert_eq!(output.stdout, "CREATE TABLE t;\n");
        Ok(())
    }

    #[test]
    fn test_stdin_sources_reach_the_tool() -> anyhow::Result<()> {
        let output = SystemToolRunner.run(
            &ToolInvocation::new("cat").stdin(StdinSource::Text("secret".to_string())),
        )?;
        assert_eq!(output.stdout, "secret\n");

        let dir = tempfile::tempdir()?;
        let input = dir.path().join("restore.sql");
        std::fs::write(&input, "INSERT INTO t VALUES (1);")?;
        let output = SystemToolRunner.run(&ToolInvocation::new("cat").stdin(StdinSource::File(input)))?;
        assert_eq!(output.stdout, "INSERT INTO t VALUES (1);");
        Ok(())
    }

    #[test]
    fn test_non_zero_exit_is_a_command_failure() {
        let err = SystemToolRunner
            .run(&ToolInvocation::new("sh").arg("-c").arg("echo boom >&2; exit 3"))
            .unwrap_err();
        match err {
            ToolkitError::CommandFailed { program, status, stderr } => {
                assert_eq!(program, "sh");
                assert_eq!(status.code(), Some(3));
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_tool_that_closes_stdin_still_reports_its_exit_status() {
        let invocation = ToolInvocation::new("sh")
            .arg("-c")
            .arg("exec 0<&-; echo 'auth failed' >&2; exit 3")
            .stdin(StdinSource::Text("x".repeat(200_000)));

        match SystemToolRunner.run(&invocation).unwrap_err() {
            ToolkitError::CommandFailed { status, stderr, .. } => {
                assert_eq!(status.code(), Some(3));
                assert_eq!(stderr, "auth failed");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_require_rejects_blank_values() {
        assert!(require("sakila", "database name").is_ok());
        assert!(matches!(
            require("  ", "database name"),
            Err(ToolkitError::InvalidArgument(_))
        ));
    }
}
