//! Mock Kubernetes API server for testing.
//!
//! Provides an HTTP server that can be used with kubeconfig-based connections.
//! It serves the namespaced ConfigMap list and patch endpoints, records every
//! patch it receives, and can be told to reject patches for given ConfigMaps.

mod helpers;
pub mod http;

pub use http::{HttpMockK8sServer, RecordedPatch, RunningHttpMockK8sServer};

/// Build a ConfigMap manifest with the given labels and data.
pub fn config_map(
	namespace: &str,
	name: &str,
	labels: &[(&str, &str)],
	data: &[(&str, &str)],
) -> serde_json::Value {
	let labels: serde_json::Map<_, _> = labels
		.iter()
		.map(|(k, v)| (k.to_string(), serde_json::Value::from(*v)))
		.collect();
	let data: serde_json::Map<_, _> = data
		.iter()
		.map(|(k, v)| (k.to_string(), serde_json::Value::from(*v)))
		.collect();
	serde_json::json!({
		"apiVersion": "v1",
		"kind": "ConfigMap",
		"metadata": {
			"name": name,
			"namespace": namespace,
			"labels": labels,
		},
		"data": data,
	})
}
