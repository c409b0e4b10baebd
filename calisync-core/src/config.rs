//! Process-wide configuration for the sync orchestrator.
//!
//! A [`SyncConfig`] is built once at startup (see `calisync-cli`), validated,
//! and then handed by reference to every component. Nothing reads ambient
//! global state after that point.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Reload endpoint port used when `PORT_CALIBRE_WEB` is unset.
pub const DEFAULT_PORT: u16 = 8083;

/// Scheduler delay used when `TIME_CHECK_ONEDRIVE_SECOND` is unset.
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_METADATA_DB_PATH: &str = "path/to/metadata.db";
pub const DEFAULT_CPS_PATH: &str = "path/to/cps";
pub const DEFAULT_LOG_PATH: &str = "sync.log";
pub const DEFAULT_RELOAD_TIMEOUT_SECS: u64 = 30;

/// The sync tool invocation, in array form (never passed through a shell).
pub const DEFAULT_SYNC_COMMAND: [&str; 2] = ["onedrive", "--synchronize"];

/// Flags passed to the content server executable on start.
pub const SERVER_ARGS: [&str; 1] = ["-r"];

/// Path of the reload endpoint on the content server.
pub const RECONNECT_PATH: &str = "/reconnect";

/// Immutable orchestrator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Program and arguments of the external sync tool.
    pub sync_command: Vec<String>,
    /// Database file whose modification time is polled after each sync.
    pub metadata_db_path: PathBuf,
    /// Content server executable, started once with [`SERVER_ARGS`].
    pub cps_path: PathBuf,
    pub server_host: String,
    pub server_port: u16,
    /// Delay between one cycle's completion and the next cycle's start.
    pub interval_secs: u64,
    /// Append log lines to [`SyncConfig::log_path`] in addition to stdout.
    pub log_enabled: bool,
    pub log_path: PathBuf,
    /// Upper bound on a single sync tool run. `None` waits indefinitely.
    pub sync_timeout_secs: Option<u64>,
    pub reload_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_command: DEFAULT_SYNC_COMMAND.iter().map(|s| s.to_string()).collect(),
            metadata_db_path: PathBuf::from(DEFAULT_METADATA_DB_PATH),
            cps_path: PathBuf::from(DEFAULT_CPS_PATH),
            server_host: DEFAULT_HOST.to_string(),
            server_port: DEFAULT_PORT,
            interval_secs: DEFAULT_INTERVAL_SECS,
            log_enabled: true,
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
            sync_timeout_secs: None,
            reload_timeout_secs: DEFAULT_RELOAD_TIMEOUT_SECS,
        }
    }
}

impl SyncConfig {
    /// Check the invariants every component relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.sync_command.first().map_or(true, |program| program.trim().is_empty()) {
            return Err(ConfigError::EmptySyncCommand);
        }
        if self.server_host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.reload_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout { name: "reload" });
        }
        if self.sync_timeout_secs == Some(0) {
            return Err(ConfigError::ZeroTimeout { name: "sync" });
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn sync_timeout(&self) -> Option<Duration> {
        self.sync_timeout_secs.map(Duration::from_secs)
    }

    pub fn reload_timeout(&self) -> Duration {
        Duration::from_secs(self.reload_timeout_secs)
    }

    /// Full URL of the reload endpoint, e.g. `http://localhost:8083/reconnect`.
    pub fn reconnect_url(&self) -> String {
        format!(
            "http://{}:{}{}",
            self.server_host, self.server_port, RECONNECT_PATH
        )
    }

    /// Human-readable rendering of the sync command for log lines.
    pub fn sync_command_line(&self) -> String {
        self.sync_command.join(" ")
    }
}
