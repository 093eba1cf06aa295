//! Kubernetes cluster connection and ConfigMap access.

use std::{
	path::{Path, PathBuf},
	time::Duration,
};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{
	api::{Api, ListParams, Patch, PatchParams},
	config::{InClusterError, KubeConfigOptions, Kubeconfig, KubeconfigError},
	Client, Config,
};
use thiserror::Error;
use tracing::instrument;

/// Default timeout for Kubernetes API requests.
const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur while resolving credentials or reaching the API server.
#[derive(Debug, Error)]
pub enum ConnectionError {
	#[error("loading kubeconfig {}", path.display())]
	Kubeconfig {
		path: PathBuf,
		#[source]
		source: KubeconfigError,
	},

	#[error("loading in-cluster configuration")]
	InCluster(#[source] InClusterError),

	#[error("building kubernetes client")]
	Client(#[source] kube::Error),

	#[error("listing configmaps in namespace {namespace:?}")]
	List {
		namespace: String,
		#[source]
		source: ClusterApiError,
	},
}

/// Errors returned by a single ConfigMap API call.
#[derive(Debug, Error)]
pub enum ClusterApiError {
	#[error(transparent)]
	Kube(#[from] kube::Error),
}

/// ConfigMap operations needed to commit a driver type.
#[async_trait]
pub trait ConfigMapClient: Send + Sync {
	/// List ConfigMaps in `namespace` matching `label_selector`, in API order.
	async fn list_config_maps(
		&self,
		namespace: &str,
		label_selector: &str,
	) -> Result<Vec<ConfigMap>, ClusterApiError>;

	/// Submit `patch` as an `application/json-patch+json` patch against a single ConfigMap.
	async fn patch_config_map(
		&self,
		namespace: &str,
		name: &str,
		patch: &json_patch::Patch,
	) -> Result<(), ClusterApiError>;
}

/// Acquires a [`ConfigMapClient`] from pre-resolved credentials.
#[async_trait]
pub trait ClientFactory: Send + Sync {
	/// Connect using `kubeconfig` when given, otherwise ambient in-cluster credentials.
	async fn connect(
		&self,
		kubeconfig: Option<&Path>,
	) -> Result<Box<dyn ConfigMapClient>, ConnectionError>;
}

/// Factory backed by kube-rs.
#[derive(Debug, Clone, Copy, Default)]
pub struct KubeClientFactory;

#[async_trait]
impl ClientFactory for KubeClientFactory {
	#[instrument(skip_all, fields(kubeconfig = ?kubeconfig))]
	async fn connect(
		&self,
		kubeconfig: Option<&Path>,
	) -> Result<Box<dyn ConfigMapClient>, ConnectionError> {
		let config = match kubeconfig {
			Some(path) => {
				let kubeconfig =
					Kubeconfig::read_from(path).map_err(|source| ConnectionError::Kubeconfig {
						path: path.to_path_buf(),
						source,
					})?;
				config_from_kubeconfig(kubeconfig)
					.await
					.map_err(|source| ConnectionError::Kubeconfig {
						path: path.to_path_buf(),
						source,
					})?
			}
			None => {
				tracing::debug!("no kubeconfig given, using in-cluster credentials");
				Config::incluster().map_err(ConnectionError::InCluster)?
			}
		};

		Ok(Box::new(KubeConfigMapClient::from_config(config)?))
	}
}

async fn config_from_kubeconfig(kubeconfig: Kubeconfig) -> Result<Config, KubeconfigError> {
	Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await
}

/// [`ConfigMapClient`] talking to a real API server.
#[derive(Clone)]
pub struct KubeConfigMapClient {
	client: Client,
}

impl std::fmt::Debug for KubeConfigMapClient {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("KubeConfigMapClient")
			.field("default_namespace", &self.client.default_namespace())
			.finish_non_exhaustive()
	}
}

impl KubeConfigMapClient {
	pub fn from_config(mut config: Config) -> Result<Self, ConnectionError> {
		config.read_timeout = Some(DEFAULT_API_TIMEOUT);
		let client = Client::try_from(config).map_err(ConnectionError::Client)?;
		Ok(Self { client })
	}
}

#[async_trait]
impl ConfigMapClient for KubeConfigMapClient {
	#[instrument(skip(self))]
	async fn list_config_maps(
		&self,
		namespace: &str,
		label_selector: &str,
	) -> Result<Vec<ConfigMap>, ClusterApiError> {
		let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
		let list = api
			.list(&ListParams::default().labels(label_selector))
			.await?;
		Ok(list.items)
	}

	#[instrument(skip(self, patch))]
	async fn patch_config_map(
		&self,
		namespace: &str,
		name: &str,
		patch: &json_patch::Patch,
	) -> Result<(), ClusterApiError> {
		let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
		api.patch(name, &PatchParams::default(), &Patch::Json::<()>(patch.clone()))
			.await?;
		Ok(())
	}
}
