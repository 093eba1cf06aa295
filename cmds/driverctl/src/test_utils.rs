//! Common test utilities.

use std::{
	collections::{BTreeMap, HashSet},
	path::{Path, PathBuf},
	sync::{Arc, Mutex},
};

use async_trait::async_trait;
use k8s_openapi::{api::core::v1::ConfigMap, apimachinery::pkg::apis::meta::v1::ObjectMeta};

use crate::{
	cluster::{ClientFactory, ClusterApiError, ConfigMapClient, ConnectionError},
	engine::ENGINE_KIND_KEY,
};

/// Build a ConfigMap, optionally carrying an `engine.kind` entry.
pub fn config_map(name: &str, engine_kind: Option<&str>) -> ConfigMap {
	let data = engine_kind.map(|kind| {
		BTreeMap::from([
			(ENGINE_KIND_KEY.to_string(), kind.to_string()),
			("falco.yaml".to_string(), "rules_files: []\n".to_string()),
		])
	});
	ConfigMap {
		metadata: ObjectMeta {
			name: Some(name.to_string()),
			namespace: Some("falco".to_string()),
			..ObjectMeta::default()
		},
		data,
		..ConfigMap::default()
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
	pub namespace: String,
	pub name: String,
	pub patch: json_patch::Patch,
}

#[derive(Default)]
struct FakeState {
	config_maps: Vec<ConfigMap>,
	failing: HashSet<String>,
	list_fails: bool,
	list_hangs: bool,
	patch_hangs: bool,
	lists: Vec<(String, String)>,
	patches: Vec<RecordedCall>,
}

/// In-memory [`ConfigMapClient`] that records every call.
///
/// Clones share state, so a test can keep one handle while the code under test
/// owns another through [`FakeClientFactory`].
#[derive(Clone, Default)]
pub struct FakeConfigMapClient {
	state: Arc<Mutex<FakeState>>,
}

impl FakeConfigMapClient {
	pub fn new(config_maps: Vec<ConfigMap>) -> Self {
		let client = Self::default();
		client.state.lock().unwrap().config_maps = config_maps;
		client
	}

	/// Make every patch against `name` fail.
	pub fn fail_patch(self, name: &str) -> Self {
		self.state.lock().unwrap().failing.insert(name.to_string());
		self
	}

	pub fn fail_list(self) -> Self {
		self.state.lock().unwrap().list_fails = true;
		self
	}

	/// Make listing block until cancelled.
	pub fn hang_list(self) -> Self {
		self.state.lock().unwrap().list_hangs = true;
		self
	}

	/// Make every patch block until cancelled, after being recorded.
	pub fn hang_patch(self) -> Self {
		self.state.lock().unwrap().patch_hangs = true;
		self
	}

	pub fn lists(&self) -> Vec<(String, String)> {
		self.state.lock().unwrap().lists.clone()
	}

	pub fn patches(&self) -> Vec<RecordedCall> {
		self.state.lock().unwrap().patches.clone()
	}

	pub fn patched_names(&self) -> Vec<String> {
		self.patches().into_iter().map(|p| p.name).collect()
	}
}

fn service_error(message: &str) -> ClusterApiError {
	ClusterApiError::Kube(kube::Error::Service(message.to_string().into()))
}

#[async_trait]
impl ConfigMapClient for FakeConfigMapClient {
	async fn list_config_maps(
		&self,
		namespace: &str,
		label_selector: &str,
	) -> Result<Vec<ConfigMap>, ClusterApiError> {
		let hangs = {
			let mut state = self.state.lock().unwrap();
			state
				.lists
				.push((namespace.to_string(), label_selector.to_string()));
			if state.list_fails {
				return Err(service_error("connection refused"));
			}
			state.list_hangs
		};
		if hangs {
			std::future::pending::<()>().await;
		}
		Ok(self.state.lock().unwrap().config_maps.clone())
	}

	async fn patch_config_map(
		&self,
		namespace: &str,
		name: &str,
		patch: &json_patch::Patch,
	) -> Result<(), ClusterApiError> {
		let hangs = {
			let mut state = self.state.lock().unwrap();
			state.patches.push(RecordedCall {
				namespace: namespace.to_string(),
				name: name.to_string(),
				patch: patch.clone(),
			});
			if state.failing.contains(name) {
				return Err(service_error("admission webhook denied the request"));
			}
			state.patch_hangs
		};
		if hangs {
			std::future::pending::<()>().await;
		}
		Ok(())
	}
}

/// [`ClientFactory`] handing out a shared [`FakeConfigMapClient`].
#[derive(Clone, Default)]
pub struct FakeClientFactory {
	client: FakeConfigMapClient,
	refuse: bool,
	requested: Arc<Mutex<Vec<Option<PathBuf>>>>,
}

impl FakeClientFactory {
	pub fn new(client: FakeConfigMapClient) -> Self {
		Self {
			client,
			..Self::default()
		}
	}

	/// A factory whose credential resolution always fails.
	pub fn refusing() -> Self {
		Self {
			refuse: true,
			..Self::default()
		}
	}

	/// Kubeconfig paths passed to every `connect` call.
	pub fn requested(&self) -> Vec<Option<PathBuf>> {
		self.requested.lock().unwrap().clone()
	}
}

#[async_trait]
impl ClientFactory for FakeClientFactory {
	async fn connect(
		&self,
		kubeconfig: Option<&Path>,
	) -> Result<Box<dyn ConfigMapClient>, ConnectionError> {
		self.requested
			.lock()
			.unwrap()
			.push(kubeconfig.map(Path::to_path_buf));
		if self.refuse {
			return Err(ConnectionError::Client(kube::Error::Service(
				"no route to host".into(),
			)));
		}
		Ok(Box::new(self.client.clone()))
	}
}
