// databasetoolkit/src/tools/recording.rs
use std::cell::RefCell;
use std::process::ExitStatus;

use super::{ToolInvocation, ToolOutput, ToolRunner};
use crate::errors::{Result, ToolkitError};

/// Records invocations instead of starting processes.
#[derive(Default)]
pub struct RecordingRunner {
    invocations: RefCell<Vec<ToolInvocation>>,
    missing: Option<String>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretends `program` is not installed.
    pub fn without(program: &str) -> Self {
        RecordingRunner {
            invocations: RefCell::default(),
            missing: Some(program.to_string()),
        }
    }

    pub fn invocations(&self) -> Vec<ToolInvocation> {
        self.invocations.borrow().clone()
    }
}

impl ToolRunner for RecordingRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput> {
        self.invocations.borrow_mut().push(invocation.clone());
        if self.missing.as_deref() == Some(invocation.program.as_str()) {
            return Err(ToolkitError::ToolNotFound {
                program: invocation.program.clone(),
            });
        }
        Ok(ToolOutput {
            status: ExitStatus::default(),
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}
