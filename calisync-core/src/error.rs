//! Error types for calisync-core.

use thiserror::Error;

/// Rejections raised by [`crate::SyncConfig::validate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The scheduler delay must be a positive number of seconds.
    #[error("sync interval must be at least 1 second")]
    ZeroInterval,

    /// The sync command vector has no program to run.
    #[error("sync command is empty")]
    EmptySyncCommand,

    #[error("server host is empty")]
    EmptyHost,

    /// A timeout was configured as zero seconds.
    #[error("{name} timeout must be at least 1 second")]
    ZeroTimeout { name: &'static str },
}
