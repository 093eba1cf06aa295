//! ConfigMap patcher.
//!
//! Every ConfigMap belonging to the agent deployment is inspected in the order
//! the API server lists them. ConfigMaps whose agent does not run on a driver
//! are skipped and the batch goes on; the first rejected patch ends the batch,
//! leaving later ConfigMaps unattempted.

use std::path::PathBuf;

use tracing::{info, instrument, warn};

use json_patch::{jsonptr::PointerBuf, Patch, PatchOperation, ReplaceOperation};

use super::client::{ClientFactory, ConnectionError};
use crate::{
	cancel::{cancellable, CancelRx},
	driver_type::DriverType,
	engine::{check_runs_with_driver, ENGINE_KIND_KEY},
	error::CommitError,
	outcome::{CommitReport, PatchOutcome, SkipReason},
};

/// Selects the ConfigMaps of an agent deployment.
pub const DISCOVERY_LABEL_SELECTOR: &str = "app.kubernetes.io/instance=falco";

/// A set of ConfigMaps to commit into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterTarget {
	pub namespace: String,
	pub label_selector: String,
	/// Explicit credentials; in-cluster credentials are used when unset.
	pub kubeconfig: Option<PathBuf>,
}

impl ClusterTarget {
	pub fn new(namespace: impl Into<String>, kubeconfig: Option<PathBuf>) -> Self {
		Self {
			namespace: namespace.into(),
			label_selector: DISCOVERY_LABEL_SELECTOR.to_string(),
			kubeconfig,
		}
	}
}

/// The patch replacing the engine kind of a ConfigMap.
pub fn engine_kind_patch(driver_type: DriverType) -> Patch {
	Patch(vec![PatchOperation::Replace(ReplaceOperation {
		path: PointerBuf::from_tokens(["data", ENGINE_KIND_KEY]),
		value: driver_type.as_str().into(),
	})])
}

/// Write `driver_type` into every driver-driven ConfigMap of `target`.
///
/// Credential, listing and empty-listing failures are returned as errors. A
/// rejected patch is recorded as the last entry of the report, as
/// [`PatchOutcome::Failed`]; use [`CommitReport::into_result`] to surface it.
#[instrument(skip(factory, cancel), fields(namespace = %target.namespace, selector = %target.label_selector))]
pub async fn patch_config_maps(
	factory: &dyn ClientFactory,
	target: &ClusterTarget,
	driver_type: DriverType,
	cancel: &mut CancelRx,
) -> Result<CommitReport, CommitError> {
	let client = cancellable(cancel, factory.connect(target.kubeconfig.as_deref())).await??;

	let config_maps = cancellable(
		cancel,
		client.list_config_maps(&target.namespace, &target.label_selector),
	)
	.await?
	.map_err(|source| ConnectionError::List {
		namespace: target.namespace.clone(),
		source,
	})?;

	if config_maps.is_empty() {
		return Err(CommitError::NotFound {
			namespace: target.namespace.clone(),
			selector: target.label_selector.clone(),
		});
	}

	let patch = engine_kind_patch(driver_type);
	let mut report = CommitReport::default();

	for config_map in config_maps {
		let name = config_map.metadata.name.unwrap_or_default();
		let namespace = config_map
			.metadata
			.namespace
			.unwrap_or_else(|| target.namespace.clone());
		let engine_kind = config_map
			.data
			.as_ref()
			.and_then(|data| data.get(ENGINE_KIND_KEY))
			.map(String::as_str)
			.unwrap_or_default();

		if let Err(reason) = check_runs_with_driver(engine_kind) {
			warn!(config_map = %name, %reason, "avoid updating Falco configmap");
			report.push(name, PatchOutcome::Skipped(SkipReason::NotDriverDriven(reason)));
			continue;
		}

		match cancellable(cancel, client.patch_config_map(&namespace, &name, &patch)).await? {
			Ok(()) => {
				info!(config_map = %name, from = engine_kind, to = %driver_type, "updated Falco configmap");
				report.push(name, PatchOutcome::Applied);
			}
			Err(source) => {
				report.push(
					name.clone(),
					PatchOutcome::Failed(CommitError::PatchApply {
						namespace,
						name,
						source,
					}),
				);
				break;
			}
		}
	}

	Ok(report)
}
