//! Logging setup.

use std::io::IsTerminal;

use clap::ValueEnum;
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Output format of log lines on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
	/// Pretty when stderr is a terminal, JSON otherwise.
	#[default]
	Auto,
	Pretty,
	Json,
}

impl LogFormat {
	fn is_pretty(self) -> bool {
		match self {
			LogFormat::Auto => std::io::stderr().is_terminal(),
			LogFormat::Pretty => true,
			LogFormat::Json => false,
		}
	}
}

/// Build the level filter.
///
/// Priority for log level:
/// 1. `log_level` argument (from --log-level CLI flag)
/// 2. `RUST_LOG` environment variable
/// 3. Default: info
fn filter(log_level: Option<Level>) -> EnvFilter {
	match log_level {
		Some(level) => EnvFilter::new(level.as_str()),
		None => EnvFilter::builder()
			.with_default_directive(Level::INFO.into())
			.from_env_lossy(),
	}
}

/// Install the global tracing subscriber, writing to stderr.
pub fn init(log_level: Option<Level>, format: LogFormat) {
	let fmt_layer = if format.is_pretty() {
		tracing_subscriber::fmt::layer()
			.with_writer(std::io::stderr)
			.pretty()
			.boxed()
	} else {
		tracing_subscriber::fmt::layer()
			.with_writer(std::io::stderr)
			.json()
			.boxed()
	};

	tracing_subscriber::registry()
		.with(filter(log_level))
		.with(fmt_layer)
		.init();
}
