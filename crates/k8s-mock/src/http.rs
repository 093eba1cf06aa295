//! HTTP-based mock Kubernetes server using wiremock.
//!
//! This provides a real HTTP server that can be used with actual kubeconfig-based
//! connections. Only the namespaced ConfigMap endpoints are served.

use std::{
	collections::HashSet,
	path::Path,
	sync::{Arc, RwLock},
};

use bon::Builder;
use kube::config::{
	AuthInfo, Cluster, Context, Kubeconfig, NamedAuthInfo, NamedCluster, NamedContext,
};
use tracing::{debug, trace};
use wiremock::{
	matchers::{method, path_regex},
	Mock, MockServer, Request, ResponseTemplate,
};

use super::helpers::matches_selector;

const CONFIG_MAPS_PATH: &str = r"^/api/v1/namespaces/[^/]+/configmaps$";
const CONFIG_MAP_PATH: &str = r"^/api/v1/namespaces/[^/]+/configmaps/[^/]+$";
const JSON_PATCH_CONTENT_TYPE: &str = "application/json-patch+json";

/// A PATCH request received by the server, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPatch {
	pub namespace: String,
	pub name: String,
	pub content_type: Option<String>,
	pub body: serde_json::Value,
}

#[derive(Default)]
struct MockState {
	/// ConfigMaps in creation order, which is also the listing order.
	config_maps: Vec<serde_json::Value>,
	failing_patches: HashSet<String>,
	patches: Vec<RecordedPatch>,
}

impl MockState {
	fn find_mut(&mut self, namespace: &str, name: &str) -> Option<&mut serde_json::Value> {
		self.config_maps.iter_mut().find(|cm| {
			cm.pointer("/metadata/namespace").and_then(|v| v.as_str()) == Some(namespace)
				&& cm.pointer("/metadata/name").and_then(|v| v.as_str()) == Some(name)
		})
	}
}

/// Type alias for the shared mutable server state.
type SharedState = Arc<RwLock<MockState>>;

/// A mock Kubernetes server exposed over HTTP.
#[derive(Builder)]
pub struct HttpMockK8sServer {
	/// ConfigMap manifests to serve, listed in this order.
	#[builder(default)]
	config_maps: Vec<serde_json::Value>,
	/// Names of ConfigMaps whose patches are rejected as invalid.
	#[builder(default)]
	failing_patches: Vec<String>,
}

/// A running HTTP mock server instance.
pub struct RunningHttpMockK8sServer {
	server: MockServer,
	state: SharedState,
}

impl HttpMockK8sServer {
	/// Start the mock server with all configured resources.
	pub async fn start(self) -> RunningHttpMockK8sServer {
		let server = MockServer::start().await;
		debug!(uri = %server.uri(), "Started mock K8s server");

		let state = Arc::new(RwLock::new(MockState {
			config_maps: self.config_maps,
			failing_patches: self.failing_patches.into_iter().collect(),
			patches: Vec::new(),
		}));

		mount_list(&server, &state).await;
		mount_patch(&server, &state).await;

		RunningHttpMockK8sServer { server, state }
	}
}

impl RunningHttpMockK8sServer {
	/// Get the server's URI (e.g., "http://127.0.0.1:12345").
	pub fn uri(&self) -> String {
		self.server.uri()
	}

	/// Create a Kubeconfig pointing to this mock server.
	pub fn kubeconfig(&self) -> Kubeconfig {
		let context_name = "mock-context";
		let cluster_name = "mock-cluster";
		let user_name = "mock-user";

		Kubeconfig {
			clusters: vec![NamedCluster {
				name: cluster_name.to_string(),
				cluster: Some(Cluster {
					server: Some(self.uri()),
					insecure_skip_tls_verify: Some(true),
					..Default::default()
				}),
			}],
			contexts: vec![NamedContext {
				name: context_name.to_string(),
				context: Some(Context {
					cluster: cluster_name.to_string(),
					user: Some(user_name.to_string()),
					namespace: Some("default".to_string()),
					..Default::default()
				}),
			}],
			auth_infos: vec![NamedAuthInfo {
				name: user_name.to_string(),
				auth_info: Some(AuthInfo::default()),
			}],
			current_context: Some(context_name.to_string()),
			..Default::default()
		}
	}

	/// Write [`Self::kubeconfig`] to `path`, as JSON (a YAML subset kubeconfig loaders accept).
	pub fn write_kubeconfig(&self, path: &Path) -> std::io::Result<()> {
		let contents = serde_json::to_vec_pretty(&self.kubeconfig())?;
		std::fs::write(path, contents)
	}

	/// All PATCH requests received so far.
	pub fn patches(&self) -> Vec<RecordedPatch> {
		self.state.read().unwrap().patches.clone()
	}

	/// Current state of a ConfigMap.
	pub fn config_map(&self, namespace: &str, name: &str) -> Option<serde_json::Value> {
		self.state
			.write()
			.unwrap()
			.find_mut(namespace, name)
			.cloned()
	}
}

/// Split `/api/v1/namespaces/<ns>/configmaps[/<name>]` into namespace and name.
fn parse_config_map_path(path: &str) -> (String, Option<String>) {
	let mut parts = path
		.trim_start_matches("/api/v1/namespaces/")
		.split('/');
	let namespace = parts.next().unwrap_or_default().to_string();
	let name = parts.nth(1).map(str::to_string);
	(namespace, name)
}

fn status(code: u16, reason: &str, message: String) -> ResponseTemplate {
	ResponseTemplate::new(code).set_body_json(serde_json::json!({
		"kind": "Status",
		"apiVersion": "v1",
		"metadata": {},
		"status": "Failure",
		"message": message,
		"reason": reason,
		"code": code
	}))
}

async fn mount_list(server: &MockServer, state: &SharedState) {
	let state = Arc::clone(state);

	Mock::given(method("GET"))
		.and(path_regex(CONFIG_MAPS_PATH))
		.respond_with(move |req: &Request| {
			let (namespace, _) = parse_config_map_path(req.url.path());
			let selector = req
				.url
				.query_pairs()
				.find(|(k, _)| k == "labelSelector")
				.map(|(_, v)| v.into_owned())
				.unwrap_or_default();

			let state = state.read().unwrap();
			let items: Vec<_> = state
				.config_maps
				.iter()
				.filter(|cm| {
					cm.pointer("/metadata/namespace").and_then(|v| v.as_str()) == Some(&namespace)
				})
				.filter(|cm| matches_selector(cm.pointer("/metadata/labels"), &selector))
				.cloned()
				.collect();
			trace!(namespace = %namespace, selector = %selector, count = items.len(), "Listed configmaps");

			ResponseTemplate::new(200).set_body_json(serde_json::json!({
				"kind": "ConfigMapList",
				"apiVersion": "v1",
				"metadata": {"resourceVersion": "1"},
				"items": items
			}))
		})
		.mount(server)
		.await;
}

async fn mount_patch(server: &MockServer, state: &SharedState) {
	let state = Arc::clone(state);

	// PATCH endpoint - apply a JSON patch to the stored ConfigMap and persist it
	Mock::given(method("PATCH"))
		.and(path_regex(CONFIG_MAP_PATH))
		.respond_with(move |req: &Request| {
			let (namespace, name) = parse_config_map_path(req.url.path());
			let name = name.unwrap_or_default();
			let content_type = req
				.headers
				.get("content-type")
				.and_then(|v| v.to_str().ok())
				.map(str::to_string);
			let body: serde_json::Value =
				serde_json::from_slice(&req.body).unwrap_or(serde_json::Value::Null);

			let mut state = state.write().unwrap();
			state.patches.push(RecordedPatch {
				namespace: namespace.clone(),
				name: name.clone(),
				content_type: content_type.clone(),
				body: body.clone(),
			});

			if content_type.as_deref() != Some(JSON_PATCH_CONTENT_TYPE) {
				return status(415, "UnsupportedMediaType", format!("unsupported patch type {content_type:?}"));
			}
			if state.failing_patches.contains(&name) {
				return status(422, "Invalid", format!("configmaps \"{name}\" is invalid"));
			}
			let patch: json_patch::Patch = match serde_json::from_value(body) {
				Ok(patch) => patch,
				Err(e) => return status(400, "BadRequest", e.to_string()),
			};
			let Some(existing) = state.find_mut(&namespace, &name) else {
				return status(404, "NotFound", format!("configmaps \"{name}\" not found"));
			};

			let mut patched = existing.clone();
			if let Err(e) = json_patch::patch(&mut patched, &patch) {
				return status(422, "Invalid", e.to_string());
			}
			*existing = patched.clone();
			trace!(namespace = %namespace, name = %name, "Patched configmap");

			ResponseTemplate::new(200).set_body_json(patched)
		})
		.mount(server)
		.await;
}
