//! Commit dispatcher.

use std::path::PathBuf;

use tracing::instrument;

use crate::{
	cancel::CancelRx,
	cluster::{patch_config_maps, ClientFactory, ClusterTarget},
	driver_type::DriverType,
	error::CommitError,
	local::patch_falco_config,
	outcome::CommitReport,
};

/// The configuration store the running agent reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitTarget {
	LocalFile { path: PathBuf },
	ClusterResourceSet(ClusterTarget),
}

impl CommitTarget {
	/// A non-empty namespace means the agent runs on Kubernetes.
	pub fn resolve(namespace: &str, kubeconfig: Option<PathBuf>, falco_config: PathBuf) -> Self {
		if namespace.is_empty() {
			CommitTarget::LocalFile { path: falco_config }
		} else {
			CommitTarget::ClusterResourceSet(ClusterTarget::new(namespace, kubeconfig))
		}
	}
}

/// Propagate `driver_type` into `target`.
///
/// Skipped targets do not fail the commit; the first failure does.
#[instrument(skip(factory, cancel))]
pub async fn commit(
	target: &CommitTarget,
	driver_type: DriverType,
	factory: &dyn ClientFactory,
	cancel: &mut CancelRx,
) -> Result<CommitReport, CommitError> {
	let report = match target {
		CommitTarget::LocalFile { path } => {
			let mut report = CommitReport::default();
			report.push(
				path.display().to_string(),
				patch_falco_config(path, driver_type)?,
			);
			report
		}
		CommitTarget::ClusterResourceSet(cluster) => {
			patch_config_maps(factory, cluster, driver_type, cancel).await?
		}
	};
	report.into_result()
}
