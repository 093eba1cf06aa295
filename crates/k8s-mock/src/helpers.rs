//! Helper functions for mock Kubernetes testing.

use serde_json::Value;

/// Check whether `labels` satisfy an equality-based label selector.
///
/// Supports `k=v`, `k==v`, `k!=v`, `k` (exists) and `!k` (absent), joined by commas.
pub fn matches_selector(labels: Option<&Value>, selector: &str) -> bool {
	let label = |key: &str| labels.and_then(|l| l.get(key)).and_then(Value::as_str);

	selector
		.split(',')
		.map(str::trim)
		.filter(|term| !term.is_empty())
		.all(|term| {
			if let Some((key, value)) = term.split_once("!=") {
				label(key.trim()) != Some(value.trim())
			} else if let Some((key, value)) = term.split_once("==").or_else(|| term.split_once('=')) {
				label(key.trim()) == Some(value.trim())
			} else if let Some(key) = term.strip_prefix('!') {
				label(key.trim()).is_none()
			} else {
				label(term).is_some()
			}
		})
}
