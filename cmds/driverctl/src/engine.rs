//! Precondition check shared by every configuration patcher.
//!
//! Only agents whose `engine.kind` names a driver are touched. Agents running
//! plugins, gVisor or anything else keep their configuration as-is, so a cluster
//! can mix driver-based and non-driver deployments safely.

use thiserror::Error;

use crate::driver_type::DriverType;

/// Key of the engine kind, both as a nested YAML path and as a flat ConfigMap key.
pub const ENGINE_KIND_KEY: &str = "engine.kind";

/// The observed engine kind does not correspond to any driver type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("engine.kind is not driver driven: {engine_kind}")]
pub struct NotDriverDriven {
	pub engine_kind: String,
}

/// Check that an agent with the given engine kind runs on a driver.
pub fn check_runs_with_driver(engine_kind: &str) -> Result<DriverType, NotDriverDriven> {
	engine_kind.parse().map_err(|_| NotDriverDriven {
		engine_kind: engine_kind.to_string(),
	})
}
