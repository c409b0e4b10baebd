use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Startup-level failures. Everything that happens inside a cycle is logged
/// and never surfaces here.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(#[from] calisync_core::ConfigError),
}

/// Failure of one sync tool run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("sync command is empty")]
    EmptyCommand,

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool exited unsuccessfully. This is the only exit classification;
    /// stderr is never inspected.
    #[error("command `{command}` {}", describe_exit(.exit_code))]
    ProcessFailure {
        command: String,
        exit_code: Option<i32>,
    },

    #[error("I/O error while running `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command `{command}` timed out after {}s", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },
}

/// The watched file could not be stat'ed.
#[derive(Debug, Error)]
#[error("cannot read modification time of {}: {source}", .path.display())]
pub struct StatError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// A reload notification that did not end in HTTP 200.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReloadError {
    #[error("reconnect returned status {status}")]
    Status { status: u16 },

    #[error("{message}")]
    Transport { message: String },
}

/// The content server executable could not be launched.
#[derive(Debug, Error)]
#[error("{}: {source}", .path.display())]
pub struct StartError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("returned non-zero exit status {code}"),
        None => "was terminated by a signal".to_string(),
    }
}
