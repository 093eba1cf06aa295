//! Driver command group.

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::{cancel::CancelRx, cluster::ClientFactory};

pub mod config;

#[derive(Args)]
pub struct DriverArgs {
	#[command(subcommand)]
	pub command: DriverCommands,
}

#[derive(Subcommand)]
pub enum DriverCommands {
	/// Configure a driver for future usages and update the agent configuration
	Config(config::ConfigArgs),
}

pub async fn run(args: DriverArgs, factory: &dyn ClientFactory, cancel: &mut CancelRx) -> Result<()> {
	match args.command {
		DriverCommands::Config(args) => config::run(args, factory, cancel).await,
	}
}
