//! Persistent storage of the selected driver.
//!
//! The selection lives under the `driver` key of the tool's YAML config file.
//! Other top-level keys of that file are preserved on write.

use std::{
	fs, io,
	path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use serde_yaml_with_quirks::{Mapping, Value};
use thiserror::Error;

use crate::driver_type::DriverType;

/// Default location of the tool's config file.
pub const DEFAULT_CONFIG_FILE: &str = "/etc/driverctl/driverctl.yaml";

/// Default driver name, matching the agent's own.
pub const DEFAULT_DRIVER_NAME: &str = "falco";

/// Default repository prebuilt drivers are fetched from.
pub const DEFAULT_DRIVER_REPO: &str = "https://download.falco.org/driver";

/// Default host root, for running inside a container that mounts the host elsewhere.
pub const DEFAULT_HOST_ROOT: &str = "/";

const DRIVER_KEY: &str = "driver";

#[derive(Debug, Error)]
pub enum StoreError {
	#[error("reading {}", path.display())]
	Read {
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	#[error("parsing {}", path.display())]
	Parse {
		path: PathBuf,
		#[source]
		source: serde_yaml_with_quirks::Error,
	},

	#[error("{} is not a YAML mapping", path.display())]
	NotAMapping { path: PathBuf },

	#[error("encoding driver configuration")]
	Encode(#[source] serde_yaml_with_quirks::Error),

	#[error("writing {}", path.display())]
	Write {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
}

/// The selected driver and where to get it from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverConfig {
	#[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
	pub driver_type: Option<DriverType>,
	#[serde(default)]
	pub name: String,
	#[serde(default)]
	pub version: String,
	#[serde(default)]
	pub repos: Vec<String>,
	#[serde(default, rename = "hostroot")]
	pub host_root: String,
}

impl DriverConfig {
	/// Fill unset fields with the tool defaults.
	pub fn with_defaults(mut self) -> Self {
		if self.name.is_empty() {
			self.name = DEFAULT_DRIVER_NAME.to_string();
		}
		if self.repos.is_empty() {
			self.repos = vec![DEFAULT_DRIVER_REPO.to_string()];
		}
		if self.host_root.is_empty() {
			self.host_root = DEFAULT_HOST_ROOT.to_string();
		}
		self
	}
}

/// Read the whole config document; a missing or empty file is an empty mapping.
fn load_document(path: &Path) -> Result<Mapping, StoreError> {
	let contents = match fs::read_to_string(path) {
		Ok(contents) => contents,
		Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Mapping::new()),
		Err(source) => {
			return Err(StoreError::Read {
				path: path.to_path_buf(),
				source,
			})
		}
	};
	if contents.trim().is_empty() {
		return Ok(Mapping::new());
	}

	let value: Value =
		serde_yaml_with_quirks::from_str(&contents).map_err(|source| StoreError::Parse {
			path: path.to_path_buf(),
			source,
		})?;
	match value {
		Value::Mapping(mapping) => Ok(mapping),
		Value::Null => Ok(Mapping::new()),
		_ => Err(StoreError::NotAMapping {
			path: path.to_path_buf(),
		}),
	}
}

/// Load the stored driver selection, if any.
pub fn load_driver(path: &Path) -> Result<Option<DriverConfig>, StoreError> {
	let document = load_document(path)?;
	match document.get(&Value::String(DRIVER_KEY.to_string())) {
		None | Some(Value::Null) => Ok(None),
		Some(value) => serde_yaml_with_quirks::from_value(value.clone())
			.map(Some)
			.map_err(|source| StoreError::Parse {
				path: path.to_path_buf(),
				source,
			}),
	}
}

/// Store `driver` under the `driver` key of the config file at `path`.
pub fn store_driver(driver: &DriverConfig, path: &Path) -> Result<(), StoreError> {
	let mut document = load_document(path)?;
	let value = serde_yaml_with_quirks::to_value(driver).map_err(StoreError::Encode)?;
	document.insert(Value::String(DRIVER_KEY.to_string()), value);

	let contents =
		serde_yaml_with_quirks::to_string(&Value::Mapping(document)).map_err(StoreError::Encode)?;

	let write_err = |source: io::Error| StoreError::Write {
		path: path.to_path_buf(),
		source,
	};
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		fs::create_dir_all(parent).map_err(write_err)?;
	}
	fs::write(path, contents).map_err(write_err)?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;
	use indoc::indoc;
	use tempfile::TempDir;

	use super::*;

	fn sample() -> DriverConfig {
		DriverConfig {
			driver_type: Some(DriverType::ModernEbpf),
			name: "falco".to_string(),
			version: "7.0.0+driver".to_string(),
			repos: vec!["https://download.falco.org/driver".to_string()],
			host_root: "/host".to_string(),
		}
	}

	#[test]
	fn test_load_missing_file_is_none() {
		let dir = TempDir::new().unwrap();
		assert_eq!(load_driver(&dir.path().join("absent.yaml")).unwrap(), None);
	}

	#[test]
	fn test_store_creates_file_and_parents() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("nested/driverctl.yaml");

		store_driver(&sample(), &path).unwrap();

		assert_eq!(load_driver(&path).unwrap(), Some(sample()));
	}

	#[test]
	fn test_store_preserves_other_keys() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("driverctl.yaml");
		fs::write(
			&path,
			indoc! {"
				artifact:
				  follow:
				    every: 6h
				driver:
				  type: kmod
				  name: old
			"},
		)
		.unwrap();

		store_driver(&sample(), &path).unwrap();

		let document = load_document(&path).unwrap();
		let follow = document
			.get(&Value::String("artifact".to_string()))
			.and_then(|a| a.get("follow"))
			.and_then(|f| f.get("every"))
			.and_then(Value::as_str);
		assert_eq!(follow, Some("6h"));
		assert_eq!(load_driver(&path).unwrap(), Some(sample()));
	}

	#[test]
	fn test_stored_keys_match_layout() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("driverctl.yaml");

		store_driver(&sample(), &path).unwrap();

		let contents = fs::read_to_string(&path).unwrap();
		assert!(contents.contains("type: modern_ebpf"), "{contents}");
		assert!(contents.contains("hostroot: /host"), "{contents}");
	}

	#[test]
	fn test_partial_driver_section_loads() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("driverctl.yaml");
		fs::write(&path, "driver:\n  type: ebpf\n").unwrap();

		let driver = load_driver(&path).unwrap().unwrap();
		assert_eq!(driver.driver_type, Some(DriverType::Ebpf));
		assert!(driver.name.is_empty());
	}

	#[test]
	fn test_non_mapping_document_errors() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("driverctl.yaml");
		fs::write(&path, "- a\n- b\n").unwrap();

		assert_matches!(load_driver(&path), Err(StoreError::NotAMapping { .. }));
	}

	#[test]
	fn test_with_defaults_fills_only_unset() {
		let driver = DriverConfig {
			name: "custom".to_string(),
			..DriverConfig::default()
		}
		.with_defaults();

		assert_eq!(driver.name, "custom");
		assert_eq!(driver.repos, vec![DEFAULT_DRIVER_REPO.to_string()]);
		assert_eq!(driver.host_root, "/");
	}
}
