//! Locating the Neovim and terminal executables.
//!
//! Neovim is resolved in this order:
//! 1. A configured override path, trusted as-is (version `manual`)
//! 2. Every `nvim` found in the search directories that answers `--version`,
//!    highest version first
//!
//! Terminals are looked up by name with `which`, or accepted as a path when the
//! file exists.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use semver::Version;
use serde::Serialize;
use tracing::{debug, warn};

/// Version reported for an override path that was not probed.
pub const MANUAL_VERSION: &str = "manual";

/// File name of the Neovim executable on this platform.
pub const NVIM_BINARY: &str = if cfg!(windows) { "nvim.exe" } else { "nvim" };

/// Where a binary was found, or why it was not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryLocation {
	/// Empty when unresolved.
	pub path: PathBuf,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub version: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

impl BinaryLocation {
	pub fn manual(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			version: Some(MANUAL_VERSION.into()),
			error: None,
		}
	}

	pub fn unresolved(error: impl Into<String>) -> Self {
		Self {
			path: PathBuf::new(),
			version: None,
			error: Some(error.into()),
		}
	}

	pub fn is_resolved(&self) -> bool {
		!self.path.as_os_str().is_empty()
	}

	/// The resolved path, if any.
	pub fn resolved(&self) -> Option<&Path> {
		self.is_resolved().then_some(self.path.as_path())
	}
}

/// Resolves the Neovim executable.
///
/// Never fails: an unresolved result carries the reason in
/// [`BinaryLocation::error`].
pub fn resolve(override_path: Option<&Path>, search_paths: &[PathBuf]) -> BinaryLocation {
	if let Some(path) = override_path.filter(|p| !p.as_os_str().is_empty()) {
		debug!(target = "vimhost.resolver", path = %path.display(), "using configured Neovim path");
		return BinaryLocation::manual(path);
	}

	let mut seen = HashSet::new();
	let mut found: Vec<(PathBuf, Version, String)> = Vec::new();

	for dir in search_paths {
		let candidate = dir.join(NVIM_BINARY);
		if !seen.insert(candidate.clone()) || !candidate.is_file() {
			continue;
		}
		match probe_version(&candidate) {
			Some((version, label)) => {
				debug!(target = "vimhost.resolver", path = %candidate.display(), %version, "found Neovim candidate");
				found.push((candidate, version, label));
			}
			None => {
				warn!(target = "vimhost.resolver", path = %candidate.display(), "Neovim candidate is not runnable; skipping");
			}
		}
	}

	// Stable sort keeps search order for equal versions.
	found.sort_by(|a, b| b.1.cmp(&a.1));

	match found.into_iter().next() {
		Some((path, _, label)) => BinaryLocation {
			path,
			version: Some(label),
			error: None,
		},
		None => {
			let error = format!(
				"could not find `{NVIM_BINARY}` in {} search directories; set `nvimPath` to the Neovim executable",
				seen.len()
			);
			warn!(target = "vimhost.resolver", "{error}");
			BinaryLocation::unresolved(error)
		}
	}
}

/// Resolves a terminal emulator by name or path.
///
/// Returns `None` (with a warning) when nothing matches.
pub fn resolve_terminal(name_or_path: &str, search_paths: &[PathBuf]) -> Option<PathBuf> {
	let name_or_path = name_or_path.trim();
	if name_or_path.is_empty() {
		return None;
	}

	let as_path = Path::new(name_or_path);
	if as_path.components().count() > 1 || as_path.is_absolute() {
		if as_path.exists() {
			return Some(as_path.to_path_buf());
		}
		warn!(target = "vimhost.resolver", terminal = name_or_path, "terminal path does not exist");
		return None;
	}

	let lookup = std::env::join_paths(search_paths).ok();
	let cwd = std::env::current_dir().unwrap_or_default();
	match which::which_in(name_or_path, lookup, cwd) {
		Ok(path) => {
			debug!(target = "vimhost.resolver", terminal = name_or_path, path = %path.display(), "resolved terminal");
			Some(path)
		}
		Err(e) => {
			warn!(target = "vimhost.resolver", terminal = name_or_path, error = %e, "terminal emulator not found");
			None
		}
	}
}

/// `PATH` entries followed by the usual install locations for this platform.
///
/// `extra` is searched first.
pub fn default_search_paths(extra: &[PathBuf]) -> Vec<PathBuf> {
	let mut paths: Vec<PathBuf> = extra.to_vec();
	if let Some(path) = std::env::var_os("PATH") {
		paths.extend(std::env::split_paths(&path));
	}
	paths.extend(platform_dirs());

	let mut seen = HashSet::new();
	paths.retain(|p| !p.as_os_str().is_empty() && seen.insert(p.clone()));
	paths
}

#[cfg(not(windows))]
fn platform_dirs() -> Vec<PathBuf> {
	let mut candidates = Vec::new();
	if let Some(home) = dirs::home_dir() {
		candidates.push(home.join(".local").join("bin"));
	}
	candidates.extend(
		["/usr/local/bin", "/opt/homebrew/bin", "/usr/bin", "/snap/bin", "/opt/nvim/bin"]
			.into_iter()
			.map(PathBuf::from),
	);
	candidates
}

#[cfg(windows)]
fn platform_dirs() -> Vec<PathBuf> {
	let mut candidates = Vec::new();
	if let Ok(program_files) = std::env::var("ProgramFiles") {
		candidates.push(PathBuf::from(program_files).join("Neovim").join("bin"));
	}
	if let Ok(local) = std::env::var("LOCALAPPDATA") {
		candidates.push(PathBuf::from(local).join("Programs").join("Neovim").join("bin"));
	}
	if let Some(home) = dirs::home_dir() {
		candidates.push(home.join("scoop").join("shims"));
	}
	candidates.push(PathBuf::from(r"C:\tools\neovim\nvim-win64\bin"));
	candidates
}

/// Runs `<path> --version` and parses the first line.
fn probe_version(path: &Path) -> Option<(Version, String)> {
	let output = Command::new(path)
		.arg("--version")
		.stdin(Stdio::null())
		.stderr(Stdio::null())
		.output()
		.ok()?;
	if !output.status.success() {
		return None;
	}
	let stdout = String::from_utf8_lossy(&output.stdout);
	let first = stdout.lines().next()?;
	parse_version_line(first).map(|v| (v, first.trim().to_string()))
}

/// Parses `NVIM v0.10.2` style lines, dev builds included.
pub fn parse_version_line(line: &str) -> Option<Version> {
	let token = line
		.split_whitespace()
		.map(|t| t.trim_start_matches(['v', 'V']))
		.find(|t| t.chars().next().is_some_and(|c| c.is_ascii_digit()))?;

	if let Ok(version) = Version::parse(token) {
		return Some(version);
	}

	// Fall back to the leading numeric part, padding missing components.
	let end = token.find(|c: char| !c.is_ascii_digit() && c != '.').unwrap_or(token.len());
	let mut parts: Vec<&str> = token[..end].split('.').filter(|p| !p.is_empty()).collect();
	if parts.is_empty() || parts.len() > 3 {
		return None;
	}
	while parts.len() < 3 {
		parts.push("0");
	}
	Version::parse(&parts.join(".")).ok()
}
