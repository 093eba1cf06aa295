//! Local Falco configuration patcher.
//!
//! The new driver type is written with a literal, first-occurrence substitution
//! of the `kind: <old>` line instead of re-serializing the document, so comments,
//! key order and formatting of the rest of the file survive byte for byte. The
//! price is that a `kind` line written differently (extra spaces, quotes, flow
//! style) is not found; that case is reported as a skip and the file is left
//! untouched.

use std::{
	fs,
	path::{Path, PathBuf},
};

use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::{
	driver_type::DriverType,
	engine::check_runs_with_driver,
	error::CommitError,
	outcome::{PatchOutcome, SkipReason},
};

/// Where the agent reads its configuration from on a host install.
pub const DEFAULT_FALCO_CONFIG: &str = "/etc/falco/falco.yaml";

const KIND_LINE_PREFIX: &str = "kind: ";

#[derive(Debug, Default, Deserialize)]
struct FalcoConfig {
	#[serde(default)]
	engine: EngineConfig,
}

#[derive(Debug, Default, Deserialize)]
struct EngineConfig {
	#[serde(default)]
	kind: String,
}

fn read_engine_kind(path: &Path, contents: &str) -> Result<String, CommitError> {
	if contents.trim().is_empty() {
		return Ok(String::new());
	}
	let config: FalcoConfig =
		serde_yaml_with_quirks::from_str(contents).map_err(|source| CommitError::ParseConfig {
			path: path.to_path_buf(),
			source,
		})?;
	Ok(config.engine.kind)
}

/// Write `driver_type` into the Falco configuration at `path`.
///
/// Returns [`PatchOutcome::Skipped`] when the configured engine is not a driver.
#[instrument(skip_all, fields(config = %path.display(), driver_type = %driver_type))]
pub fn patch_falco_config(path: &Path, driver_type: DriverType) -> Result<PatchOutcome, CommitError> {
	let contents = fs::read_to_string(path).map_err(|source| CommitError::ReadConfig {
		path: path.to_path_buf(),
		source,
	})?;
	let engine_kind = read_engine_kind(path, &contents)?;

	if let Err(reason) = check_runs_with_driver(&engine_kind) {
		warn!(%reason, "avoid updating Falco configuration");
		return Ok(PatchOutcome::Skipped(SkipReason::NotDriverDriven(reason)));
	}

	let old_line = format!("{KIND_LINE_PREFIX}{engine_kind}");
	if !contents.contains(&old_line) {
		warn!(line = %old_line, "engine kind line not written verbatim, leaving Falco configuration untouched");
		return Ok(PatchOutcome::Skipped(SkipReason::KindLineNotFound {
			line: old_line,
		}));
	}
	let patched = contents.replacen(&old_line, &format!("{KIND_LINE_PREFIX}{driver_type}"), 1);

	write_preserving_mode(path, &patched)?;
	info!(from = %engine_kind, to = %driver_type, "updated Falco configuration");
	Ok(PatchOutcome::Applied)
}

/// Overwrite `path` in place (no rename), keeping its permission bits.
fn write_preserving_mode(path: &Path, contents: &str) -> Result<(), CommitError> {
	let write_err = |source: std::io::Error| CommitError::WriteConfig {
		path: PathBuf::from(path),
		source,
	};
	let permissions = fs::metadata(path).map_err(write_err)?.permissions();
	fs::write(path, contents).map_err(write_err)?;
	fs::set_permissions(path, permissions).map_err(write_err)?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;
	use indoc::indoc;
	use tempfile::TempDir;

	use super::*;

	fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
		let path = dir.path().join("falco.yaml");
		fs::write(&path, contents).unwrap();
		path
	}

	#[test]
	fn test_replaces_kind_line() {
		let dir = TempDir::new().unwrap();
		let path = write_config(&dir, "engine:\n  kind: kmod\n");

		let outcome = patch_falco_config(&path, DriverType::Ebpf).unwrap();

		assert!(outcome.is_applied());
		assert_eq!(fs::read_to_string(&path).unwrap(), "engine:\n  kind: ebpf\n");
	}

	#[test]
	fn test_preserves_every_other_byte() {
		let original = indoc! {"
			# Falco configuration
			rules_files:
			  - /etc/falco/falco_rules.yaml   # keep me
			engine:
			  kind: modern_ebpf
			  kmod:
			    buf_size_preset: 4
			  modern_ebpf:
			    cpus_for_each_buffer: 2
			json_output: false
		"};
		let dir = TempDir::new().unwrap();
		let path = write_config(&dir, original);

		patch_falco_config(&path, DriverType::Kmod).unwrap();

		let expected = original.replace("  kind: modern_ebpf\n", "  kind: kmod\n");
		assert_eq!(fs::read_to_string(&path).unwrap(), expected);
	}

	#[test]
	fn test_replaces_first_occurrence_only() {
		let original = indoc! {"
			engine:
			  kind: ebpf
			other:
			  kind: ebpf
		"};
		let dir = TempDir::new().unwrap();
		let path = write_config(&dir, original);

		patch_falco_config(&path, DriverType::ModernEbpf).unwrap();

		assert_eq!(
			fs::read_to_string(&path).unwrap(),
			indoc! {"
				engine:
				  kind: modern_ebpf
				other:
				  kind: ebpf
			"}
		);
	}

	#[test]
	fn test_non_driver_engine_is_skipped_untouched() {
		let original = "engine:\n  kind: gvisor\n  gvisor:\n    config: /gvisor.yaml\n";
		let dir = TempDir::new().unwrap();
		let path = write_config(&dir, original);

		let outcome = patch_falco_config(&path, DriverType::Ebpf).unwrap();

		assert_matches!(
			outcome,
			PatchOutcome::Skipped(SkipReason::NotDriverDriven(reason)) if reason.engine_kind == "gvisor"
		);
		assert_eq!(fs::read_to_string(&path).unwrap(), original);
	}

	#[test]
	fn test_missing_engine_section_is_skipped() {
		let original = "json_output: true\n";
		let dir = TempDir::new().unwrap();
		let path = write_config(&dir, original);

		let outcome = patch_falco_config(&path, DriverType::Ebpf).unwrap();

		assert!(outcome.is_skipped());
		assert_eq!(fs::read_to_string(&path).unwrap(), original);
	}

	#[test]
	fn test_unmatched_kind_line_is_skipped_untouched() {
		let original = "engine:\n  kind:   kmod\n";
		let dir = TempDir::new().unwrap();
		let path = write_config(&dir, original);

		let outcome = patch_falco_config(&path, DriverType::Ebpf).unwrap();

		assert_matches!(
			outcome,
			PatchOutcome::Skipped(SkipReason::KindLineNotFound { line }) if line == "kind: kmod"
		);
		assert_eq!(fs::read_to_string(&path).unwrap(), original);
	}

	#[test]
	fn test_missing_file_is_read_error() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("absent.yaml");

		let result = patch_falco_config(&path, DriverType::Ebpf);
		assert_matches!(result, Err(CommitError::ReadConfig { path: p, .. }) if p == path);
	}

	#[test]
	fn test_malformed_yaml_is_parse_error() {
		let original = "engine: [kind: kmod\n";
		let dir = TempDir::new().unwrap();
		let path = write_config(&dir, original);

		let result = patch_falco_config(&path, DriverType::Ebpf);
		assert_matches!(result, Err(CommitError::ParseConfig { .. }));
		assert_eq!(fs::read_to_string(&path).unwrap(), original);
	}

	#[cfg(unix)]
	#[test]
	fn test_preserves_file_mode() {
		use std::os::unix::fs::PermissionsExt;

		let dir = TempDir::new().unwrap();
		let path = write_config(&dir, "engine:\n  kind: ebpf\n");
		fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

		patch_falco_config(&path, DriverType::Kmod).unwrap();

		let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
		assert_eq!(mode, 0o640);
	}

	#[cfg(unix)]
	#[test]
	fn test_read_only_file_is_write_error() {
		use std::os::unix::fs::PermissionsExt;

		let dir = TempDir::new().unwrap();
		let path = write_config(&dir, "engine:\n  kind: kmod\n");
		fs::set_permissions(&path, fs::Permissions::from_mode(0o444)).unwrap();
		if fs::OpenOptions::new().write(true).open(&path).is_ok() {
			// Permission bits are not enforced for root.
			return;
		}

		let result = patch_falco_config(&path, DriverType::Ebpf);

		assert_matches!(result, Err(CommitError::WriteConfig { path: p, .. }) if p == path);
		assert_eq!(fs::read_to_string(&path).unwrap(), "engine:\n  kind: kmod\n");
	}
}
