//! Errors that abort a commit.

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::{
	cancel::Cancelled,
	cluster::{ClusterApiError, ConnectionError},
};

/// Every failure that aborts a commit.
///
/// Agents that do not run on a driver are never reported here: they are
/// skipped and recorded as [`crate::outcome::PatchOutcome::Skipped`].
#[derive(Debug, Error)]
pub enum CommitError {
	#[error("reading {}", path.display())]
	ReadConfig {
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	#[error("parsing {}", path.display())]
	ParseConfig {
		path: PathBuf,
		#[source]
		source: serde_yaml_with_quirks::Error,
	},

	#[error("writing {}", path.display())]
	WriteConfig {
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	#[error(transparent)]
	Connection(#[from] ConnectionError),

	#[error("no configmaps matching {selector:?} label were found in namespace {namespace:?}")]
	NotFound { namespace: String, selector: String },

	#[error("patching configmap {namespace}/{name}")]
	PatchApply {
		namespace: String,
		name: String,
		#[source]
		source: ClusterApiError,
	},

	#[error("commit cancelled")]
	Cancelled,
}

impl From<Cancelled> for CommitError {
	fn from(_: Cancelled) -> Self {
		CommitError::Cancelled
	}
}
