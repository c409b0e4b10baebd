//! `calisync run` — start the content server and drive the sync schedule.

use anyhow::{Context, Result};
use clap::Args;

use calisync_daemon::{start_blocking, RunOptions};

use crate::settings::SettingsArgs;

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub settings: SettingsArgs,

    /// Stop after this many cycles instead of running until killed.
    #[arg(long)]
    pub max_cycles: Option<u64>,

    /// Do not kill the process currently bound to the server port.
    #[arg(long)]
    pub keep_port: bool,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let options = RunOptions {
            max_cycles: self.max_cycles,
            free_port: !self.keep_port,
        };
        start_blocking(self.settings.into_config(), options)
            .context("sync daemon exited with error")
    }
}
