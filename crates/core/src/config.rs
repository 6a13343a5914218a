//! Supervisor configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::address::ListenAddress;
use crate::error::{Error, Result};

/// Settings consumed by the resolver, planner, supervisor and router.
///
/// Stored as camelCase JSON. Every field is optional in the file; missing
/// fields take the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
	/// Explicit Neovim binary; skips discovery when set.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub nvim_path: Option<PathBuf>,
	/// Terminal emulator name or path.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub terminal: Option<String>,
	pub listen_address: ListenAddress,
	pub supported_file_types: Vec<String>,
	pub composite_documents: bool,
	pub composite_marker: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub api_key: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub login_shell: Option<PathBuf>,
	/// Extra directories searched before the defaults.
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub search_paths: Vec<PathBuf>,
	/// Directory relative open requests are resolved against.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub base_dir: Option<PathBuf>,
	pub probe_timeout_ms: u64,
	pub liveness_grace_ms: u64,
	pub quit_timeout_ms: u64,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			nvim_path: None,
			terminal: None,
			listen_address: ListenAddress::default(),
			supported_file_types: vec!["md".into(), "txt".into()],
			composite_documents: false,
			composite_marker: "excalidraw".into(),
			api_key: None,
			login_shell: None,
			search_paths: Vec::new(),
			base_dir: None,
			probe_timeout_ms: 1000,
			liveness_grace_ms: 1500,
			quit_timeout_ms: 1000,
		}
	}
}

impl Config {
	/// `<config_dir>/vimhost/config.json`, when the platform has a config dir.
	pub fn default_path() -> Option<PathBuf> {
		dirs::config_dir().map(|dir| dir.join("vimhost").join("config.json"))
	}

	/// Loads `path`, or the default location when `None`.
	///
	/// A missing file yields [`Config::default`]; a malformed one is an error.
	pub fn load(path: Option<&Path>) -> Result<Self> {
		let path = match path {
			Some(path) => path.to_path_buf(),
			None => match Self::default_path() {
				Some(path) => path,
				None => return Ok(Self::default()),
			},
		};

		let content = match fs::read_to_string(&path) {
			Ok(content) => content,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				tracing::debug!(target = "vimhost.config", path = %path.display(), "no config file, using defaults");
				return Ok(Self::default());
			}
			Err(e) => return Err(Error::Io(e)),
		};

		serde_json::from_str(&content).map_err(|e| Error::Config {
			path: path.clone(),
			message: e.to_string(),
		})
	}

	/// Whether `extension` is in the supported list (case-insensitive, leading dot ignored).
	pub fn supports(&self, extension: &str) -> bool {
		let extension = extension.trim_start_matches('.');
		self.supported_file_types
			.iter()
			.any(|t| t.trim_start_matches('.').eq_ignore_ascii_case(extension))
	}

	pub fn probe_timeout(&self) -> Duration {
		Duration::from_millis(self.probe_timeout_ms)
	}

	pub fn liveness_grace(&self) -> Duration {
		Duration::from_millis(self.liveness_grace_ms)
	}

	pub fn quit_timeout(&self) -> Duration {
		Duration::from_millis(self.quit_timeout_ms)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn missing_file_yields_defaults() {
		let dir = tempfile::tempdir().unwrap();
		let config = Config::load(Some(&dir.path().join("absent.json"))).unwrap();
		assert_eq!(config, Config::default());
		assert_eq!(config.listen_address.as_str(), "127.0.0.1:2006");
		assert_eq!(config.supported_file_types, vec!["md", "txt"]);
		assert_eq!(config.liveness_grace(), Duration::from_millis(1500));
	}

	#[test]
	fn partial_file_keeps_other_defaults() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("config.json");
		fs::write(
			&path,
			r#"{"nvimPath": "/opt/nvim/bin/nvim", "listenAddress": "127.0.0.1:7777", "compositeDocuments": true}"#,
		)
		.unwrap();

		let config = Config::load(Some(&path)).unwrap();
		assert_eq!(config.nvim_path, Some(PathBuf::from("/opt/nvim/bin/nvim")));
		assert_eq!(config.listen_address.port(), Some(7777));
		assert!(config.composite_documents);
		assert_eq!(config.composite_marker, "excalidraw");
		assert_eq!(config.quit_timeout_ms, 1000);
	}

	#[test]
	fn malformed_file_is_reported_with_path() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("config.json");
		fs::write(&path, "{ not json").unwrap();

		let err = Config::load(Some(&path)).unwrap_err();
		assert!(matches!(err, Error::Config { .. }));
		assert!(err.to_string().contains("config.json"));
	}

	#[test]
	fn empty_listen_address_is_rejected() {
		let err = serde_json::from_str::<Config>(r#"{"listenAddress": ""}"#).unwrap_err();
		assert!(err.to_string().contains("listen address"));
	}

	#[test]
	fn supports_ignores_case_and_dot() {
		let config = Config {
			supported_file_types: vec![".md".into(), "TXT".into()],
			..Config::default()
		};
		assert!(config.supports("md"));
		assert!(config.supports("txt"));
		assert!(config.supports(".MD"));
		assert!(!config.supports("pdf"));
	}
}
