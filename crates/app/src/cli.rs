use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::{
    control::{self, ControlCliArgs, ControlConfig},
    estimate::{self, EstimateArgs},
};

/// Move the OS cursor with hand landmarks and click by pinching.
#[derive(Debug, Parser)]
#[command(name = "handcursor", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Drive the cursor from a landmark recording or a live UDP feed.
    Run(ControlCliArgs),
    /// Derive calibration parameters offline from recorded phases.
    Estimate(EstimateArgs),
}

pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run(args) => {
            let config = ControlConfig::try_from(args)?;
            control::run(config)
        }
        Command::Estimate(args) => estimate::run(args),
    }
}
