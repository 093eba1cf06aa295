//! Driver config command handler.
//!
//! Stores the selected driver for later use by other driver commands and, unless
//! told otherwise, commits the driver type into the configuration the running
//! agent reads: the local Falco config file, or the deployment ConfigMaps when a
//! namespace is given. Only agents whose engine is a driver are touched.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Args};
use tracing::{debug, info, instrument};

use crate::{
	cancel::CancelRx,
	cluster::ClientFactory,
	commit::{commit, CommitTarget},
	driver_type::DriverType,
	local::DEFAULT_FALCO_CONFIG,
	store::{load_driver, store_driver, DriverConfig, DEFAULT_CONFIG_FILE},
};

#[derive(Debug, Args)]
pub struct ConfigArgs {
	/// Driver type to use
	#[arg(long = "type", value_enum)]
	pub driver_type: Option<DriverType>,

	/// Driver name
	#[arg(long)]
	pub name: Option<String>,

	/// Driver version
	#[arg(long)]
	pub version: Option<String>,

	/// Driver host root, where the host filesystem is mounted
	#[arg(long)]
	pub host_root: Option<String>,

	/// Driver repository to download prebuilt drivers from (repeatable)
	#[arg(long = "repo")]
	pub repos: Vec<String>,

	/// Whether to update Falco config/configmap
	#[arg(long, default_value_t = true, action = ArgAction::Set)]
	pub update_falco: bool,

	/// Kubernetes namespace of the Falco deployment; the local config is updated when empty
	#[arg(long, default_value = "")]
	pub namespace: String,

	/// Kubernetes config; in-cluster credentials are used when unset
	#[arg(long)]
	pub kubeconfig: Option<PathBuf>,

	/// Local Falco configuration file
	#[arg(long, default_value = DEFAULT_FALCO_CONFIG)]
	pub falco_config: PathBuf,

	/// Config file the driver selection is stored in
	#[arg(long, env = "DRIVERCTL_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
	pub config: PathBuf,
}

/// Merge command-line flags over the stored selection, then fill defaults.
fn resolve_driver(args: &ConfigArgs, stored: Option<DriverConfig>) -> Result<(DriverConfig, DriverType)> {
	let mut driver = stored.unwrap_or_default();
	if let Some(driver_type) = args.driver_type {
		driver.driver_type = Some(driver_type);
	}
	if let Some(name) = &args.name {
		driver.name.clone_from(name);
	}
	if let Some(version) = &args.version {
		driver.version.clone_from(version);
	}
	if let Some(host_root) = &args.host_root {
		driver.host_root.clone_from(host_root);
	}
	if !args.repos.is_empty() {
		driver.repos.clone_from(&args.repos);
	}
	let driver = driver.with_defaults();

	let driver_type = driver.driver_type.with_context(|| {
		format!(
			"no driver type selected: pass --type or store one in {}",
			args.config.display()
		)
	})?;
	Ok((driver, driver_type))
}

/// Run the driver config command.
#[instrument(skip_all)]
pub async fn run(args: ConfigArgs, factory: &dyn ClientFactory, cancel: &mut CancelRx) -> Result<()> {
	let stored = load_driver(&args.config)
		.with_context(|| format!("loading driver configuration from {}", args.config.display()))?;
	let (driver, driver_type) = resolve_driver(&args, stored)?;

	info!(
		name = %driver.name,
		version = %driver.version,
		driver_type = %driver_type,
		host_root = %driver.host_root,
		repos = %driver.repos.join(","),
		"running driver config"
	);

	if args.update_falco {
		let target = CommitTarget::resolve(
			&args.namespace,
			args.kubeconfig.clone(),
			args.falco_config.clone(),
		);
		let report = commit(&target, driver_type, factory, cancel)
			.await
			.context("updating Falco configuration")?;
		info!(
			applied = report.applied().count(),
			skipped = report.skipped().count(),
			"committed driver type"
		);
	} else {
		debug!("leaving Falco configuration untouched");
	}

	store_driver(&driver, &args.config)
		.with_context(|| format!("storing driver configuration in {}", args.config.display()))?;
	Ok(())
}
