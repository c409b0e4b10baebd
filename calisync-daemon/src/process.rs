//! Streaming runner for the external sync tool.
//!
//! [`ProcessRunner::spawn`] starts the command with stdout piped and returns
//! a [`SyncProcess`]. Lines are read as the child writes them.
//! [`SyncProcess::finish`] consumes the handle, drains whatever output is
//! left and only then reaps the child, so the pipe can never fill up and
//! wedge a child that is still writing.

use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};

use crate::error::RunError;

/// Spawns one configured command per call.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    command: Vec<String>,
}

impl ProcessRunner {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }

    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }

    /// Start the command. Array form, no shell.
    pub fn spawn(&self) -> Result<SyncProcess, RunError> {
        let (program, args) = self.command.split_first().ok_or(RunError::EmptyCommand)?;
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunError::Spawn {
                command: self.command_line(),
                source,
            })?;
        let stdout = child.stdout.take().map(BufReader::new);

        Ok(SyncProcess {
            command: self.command_line(),
            child,
            stdout,
            buf: Vec::new(),
        })
    }
}

/// A running sync tool. Dropping it kills the child.
#[derive(Debug)]
pub struct SyncProcess {
    command: String,
    child: Child,
    stdout: Option<BufReader<ChildStdout>>,
    buf: Vec<u8>,
}

impl SyncProcess {
    /// Next stdout line with surrounding whitespace trimmed, or `None` once
    /// the child closes its stdout. Invalid UTF-8 is replaced, not fatal.
    pub async fn next_line(&mut self) -> Result<Option<String>, RunError> {
        let Some(reader) = self.stdout.as_mut() else {
            return Ok(None);
        };
        self.buf.clear();
        let read = reader
            .read_until(b'\n', &mut self.buf)
            .await
            .map_err(|source| RunError::Io {
                command: self.command.clone(),
                source,
            })?;
        if read == 0 {
            self.stdout = None;
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&self.buf).trim().to_string()))
    }

    /// Drain remaining output, wait for exit and classify the status.
    pub async fn finish(mut self) -> Result<(), RunError> {
        while self.next_line().await?.is_some() {}
        let status = self.child.wait().await.map_err(|source| RunError::Io {
            command: self.command.clone(),
            source,
        })?;
        classify(&self.command, status)
    }
}

fn classify(command: &str, status: ExitStatus) -> Result<(), RunError> {
    if status.success() {
        Ok(())
    } else {
        Err(RunError::ProcessFailure {
            command: command.to_string(),
            exit_code: status.code(),
        })
    }
}
