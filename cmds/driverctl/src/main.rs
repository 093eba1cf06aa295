use anyhow::Result;
use clap::{Parser, Subcommand};
use driverctl::{
	cancel::create_cancel_signal,
	cluster::KubeClientFactory,
	commands,
	telemetry::{self, LogFormat},
};
use tracing::{warn, Level};

#[cfg(all(
	target_os = "linux",
	feature = "mimalloc",
	not(feature = "system-alloc")
))]
#[global_allocator]
static GLOBAL: mimallocator::Mimalloc = mimallocator::Mimalloc;

#[derive(Parser)]
#[command(name = "driverctl")]
#[command(about = "Manage the kernel driver of the Falco agent", long_about = None)]
#[command(version = env!("DRIVERCTL_VERSION"))]
struct Cli {
	/// Log level: trace, debug, info, warn or error. Falls back to RUST_LOG
	#[arg(long, global = true)]
	log_level: Option<Level>,

	/// Log output format
	#[arg(long, global = true, value_enum, default_value_t = LogFormat::Auto)]
	log_format: LogFormat,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Interact with the kernel driver
	Driver(commands::driver::DriverArgs),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
	let cli = Cli::parse();
	telemetry::init(cli.log_level, cli.log_format);

	let (cancel_tx, mut cancel_rx) = create_cancel_signal();
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			warn!("interrupted, cancelling");
			let _ = cancel_tx.send(());
		}
	});

	match cli.command {
		Commands::Driver(args) => commands::driver::run(args, &KubeClientFactory, &mut cancel_rx).await,
	}
}
