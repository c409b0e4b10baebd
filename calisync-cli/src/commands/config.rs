//! `calisync config` — show the configuration a `run` would use.

use anyhow::{Context, Result};
use clap::Args;

use crate::settings::SettingsArgs;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub settings: SettingsArgs,
}

impl ConfigArgs {
    pub fn run(self) -> Result<()> {
        let config = self.settings.into_config();
        config.validate().context("invalid configuration")?;
        println!(
            "{}",
            serde_json::to_string_pretty(&config).context("failed to render configuration JSON")?
        );
        Ok(())
    }
}
