//! Kernel instrumentation driver types.

use std::{fmt, str::FromStr};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A kernel instrumentation technique the agent can ingest events from.
///
/// The canonical string form is both the value written into agent
/// configuration and the token an existing `engine.kind` is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverType {
	/// Kernel module.
	#[value(name = "kmod")]
	Kmod,

	/// Legacy eBPF probe.
	#[value(name = "ebpf")]
	Ebpf,

	/// CO-RE eBPF probe bundled into the agent.
	#[value(name = "modern_ebpf", alias = "modern-ebpf")]
	ModernEbpf,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported driver type: {value:?}")]
pub struct ParseDriverTypeError {
	pub value: String,
}

impl DriverType {
	pub const ALL: [DriverType; 3] = [DriverType::Kmod, DriverType::Ebpf, DriverType::ModernEbpf];

	pub fn as_str(self) -> &'static str {
		match self {
			DriverType::Kmod => "kmod",
			DriverType::Ebpf => "ebpf",
			DriverType::ModernEbpf => "modern_ebpf",
		}
	}
}

impl fmt::Display for DriverType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for DriverType {
	type Err = ParseDriverTypeError;

	/// Only canonical forms are accepted; `engine.kind` values are matched verbatim.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		DriverType::ALL
			.into_iter()
			.find(|t| t.as_str() == s)
			.ok_or_else(|| ParseDriverTypeError {
				value: s.to_string(),
			})
	}
}
