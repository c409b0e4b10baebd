//! calisync — keep a Calibre-Web library in step with OneDrive.
//!
//! # Usage
//!
//! ```text
//! calisync run [--max-cycles N] [--keep-port] [settings...]
//! calisync config [settings...]
//! ```
//!
//! Every setting can also come from the environment or a `.env` file in the
//! working directory (`PORT_CALIBRE_WEB`, `TIME_CHECK_ONEDRIVE_SECOND`,
//! `METADATA_DB_PATH`, `CPS_PATH`, `LOG`, ...). Flags win over both.

mod commands;
mod settings;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{config::ConfigArgs, run::RunArgs};

#[derive(Parser, Debug)]
#[command(
    name = "calisync",
    version,
    about = "Periodically sync OneDrive and reload Calibre-Web when metadata.db changes",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the content server and run the sync schedule in the foreground.
    Run(RunArgs),

    /// Print the resolved configuration as JSON.
    Config(ConfigArgs),
}

fn main() -> Result<()> {
    // A missing .env is normal; real env vars always take precedence.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => args.run(),
        Commands::Config(args) => args.run(),
    }
}
