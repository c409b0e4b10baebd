//! Configuration surface shared by every subcommand.

use std::convert::Infallible;
use std::path::PathBuf;

use clap::{ArgAction, Args};

use calisync_core::config::{
    DEFAULT_CPS_PATH, DEFAULT_HOST, DEFAULT_INTERVAL_SECS, DEFAULT_LOG_PATH,
    DEFAULT_METADATA_DB_PATH, DEFAULT_PORT, DEFAULT_RELOAD_TIMEOUT_SECS, DEFAULT_SYNC_COMMAND,
};
use calisync_core::SyncConfig;

#[derive(Args, Debug, Clone)]
pub struct SettingsArgs {
    /// Calibre-Web port; the reload endpoint lives here.
    #[arg(long = "port", env = "PORT_CALIBRE_WEB", default_value_t = DEFAULT_PORT)]
    pub port_calibre_web: u16,

    /// Seconds between the end of one sync and the start of the next.
    #[arg(
        long = "interval",
        env = "TIME_CHECK_ONEDRIVE_SECOND",
        default_value_t = DEFAULT_INTERVAL_SECS
    )]
    pub time_check_onedrive_second: u64,

    /// Calibre `metadata.db` whose modification time is polled.
    #[arg(long = "metadata-db", env = "METADATA_DB_PATH", default_value = DEFAULT_METADATA_DB_PATH)]
    pub metadata_db_path: PathBuf,

    /// Calibre-Web `cps` executable.
    #[arg(long = "cps", env = "CPS_PATH", default_value = DEFAULT_CPS_PATH)]
    pub cps_path: PathBuf,

    /// Also append log lines to the log file (true/1/yes enable it).
    #[arg(
        long = "log",
        env = "LOG",
        default_value = "true",
        value_parser = parse_flag,
        action = ArgAction::Set
    )]
    pub log: bool,

    #[arg(long, env = "LOG_PATH", default_value = DEFAULT_LOG_PATH)]
    pub log_path: PathBuf,

    /// Host the reload request is sent to.
    #[arg(long = "host", env = "CALIBRE_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Sync tool command line, split on spaces (no shell).
    #[arg(
        long,
        env = "SYNC_COMMAND",
        value_delimiter = ' ',
        default_values = DEFAULT_SYNC_COMMAND
    )]
    pub sync_command: Vec<String>,

    /// Kill the sync tool if a run takes longer than this many seconds.
    #[arg(long = "sync-timeout", env = "SYNC_TIMEOUT_SECOND")]
    pub sync_timeout: Option<u64>,

    #[arg(
        long = "reload-timeout",
        env = "RELOAD_TIMEOUT_SECOND",
        default_value_t = DEFAULT_RELOAD_TIMEOUT_SECS
    )]
    pub reload_timeout: u64,
}

impl SettingsArgs {
    pub fn into_config(self) -> SyncConfig {
        SyncConfig {
            sync_command: self
                .sync_command
                .into_iter()
                .filter(|part| !part.is_empty())
                .collect(),
            metadata_db_path: self.metadata_db_path,
            cps_path: self.cps_path,
            server_host: self.host,
            server_port: self.port_calibre_web,
            interval_secs: self.time_check_onedrive_second,
            log_enabled: self.log,
            log_path: self.log_path,
            sync_timeout_secs: self.sync_timeout,
            reload_timeout_secs: self.reload_timeout,
        }
    }
}

/// Anything other than true/1/yes (any case) disables the flag.
fn parse_flag(raw: &str) -> Result<bool, Infallible> {
    Ok(matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes"
    ))
}
