//! Error taxonomy for the supervisor.
//!
//! None of these escape `launch`, `close` or `open_file`: each is converted to
//! a [`Notice`](crate::Notice) where it occurs and carried in the returned
//! outcome. They are still typed so hosts and tests can match on them.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type alias for fallible library operations (config loading, parsing).
pub type Result<T> = std::result::Result<T, Error>;

/// A required binary or setting is missing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
	#[error("Neovim executable not found: {0}")]
	TargetUnresolved(String),

	#[error("terminal emulator `{0}` not found; set `terminal` to an installed terminal")]
	TerminalUnresolved(String),

	#[error("listen address must not be empty")]
	EmptyListenAddress,
}

/// The OS refused to create the supervised process.
#[derive(Debug, Error)]
pub enum SpawnError {
	#[error("executable not found: {}", path.display())]
	NotFound { path: PathBuf },

	#[error("permission denied launching {}", path.display())]
	PermissionDenied { path: PathBuf },

	#[error("{} started without a process id", path.display())]
	MissingPid { path: PathBuf },

	#[error("failed to launch {}: {source}", path.display())]
	Other {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
}

impl SpawnError {
	/// Sorts an OS error into not-found, permission-denied or other.
	pub fn classify(path: &Path, source: io::Error) -> Self {
		let path = path.to_path_buf();
		match source.kind() {
			io::ErrorKind::NotFound => SpawnError::NotFound { path },
			io::ErrorKind::PermissionDenied => SpawnError::PermissionDenied { path },
			_ => SpawnError::Other { path, source },
		}
	}
}

/// A one-shot `--remote` invocation failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteOpenFailure {
	#[error("Neovim executable not found at {}", path.display())]
	NotFound { path: PathBuf },

	#[error("connection refused by Neovim at {address}")]
	ConnectionRefused { address: String },

	#[error("Neovim could not open {}: file does not exist", path.display())]
	RemoteFileMissing { path: PathBuf },

	#[error("remote open failed: {0}")]
	Generic(String),
}

/// Errors surfaced by the vimhost core.
#[derive(Debug, Error)]
pub enum Error {
	#[error(transparent)]
	Configuration(#[from] ConfigurationError),

	#[error(transparent)]
	Spawn(#[from] SpawnError),

	#[error("failed to attach control channel: {0}")]
	Attach(String),

	#[error("Neovim did not respond: {0}")]
	Probe(String),

	#[error("no Neovim instance found at {address}")]
	Unreachable { address: String },

	#[error(transparent)]
	RemoteOpen(#[from] RemoteOpenFailure),

	#[error("invalid config {}: {message}", path.display())]
	Config { path: PathBuf, message: String },

	#[error(transparent)]
	Rpc(#[from] vimhost_runtime::Error),

	#[error(transparent)]
	Io(#[from] io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),
}
