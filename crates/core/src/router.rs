//! Routing file-open requests to a running Neovim.
//!
//! A request is opened with a one-shot `nvim --server <addr> --remote <file>`
//! when either the supervisor owns a live instance or something answers on
//! the listen port. The router never launches anything and never retries.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::address::ListenAddress;
use crate::command::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner};
use crate::config::Config;
use crate::error::{ConfigurationError, Error, RemoteOpenFailure};
use crate::notice::{Notice, Notifier, TracingNotifier};
use crate::resolver::BinaryLocation;
use crate::supervisor::{InstanceView, Supervisor};

/// A file the host wants shown in Neovim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRequest {
	pub path: PathBuf,
	/// Lowercase extension without the dot.
	pub extension: String,
	/// `<name>.<marker>.<ext>` documents, such as `sketch.excalidraw.md`.
	pub composite: bool,
}

impl OpenRequest {
	/// Derives extension and composite flag from the file name.
	pub fn from_path(path: impl Into<PathBuf>, composite_marker: &str) -> Self {
		let path = path.into();
		let extension = path
			.extension()
			.map(|e| e.to_string_lossy().to_ascii_lowercase())
			.unwrap_or_default();
		let composite = !composite_marker.is_empty()
			&& path
				.file_stem()
				.map(Path::new)
				.and_then(Path::extension)
				.is_some_and(|inner| inner.to_string_lossy().eq_ignore_ascii_case(composite_marker));

		Self {
			path,
			extension,
			composite,
		}
	}
}

/// Result of [`Router::open_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
	Opened,
	/// Filtered out by file type; nothing was notified.
	Skipped,
	/// Nothing reachable at the listen address.
	NoInstance,
	/// The target binary is not resolved.
	Unconfigured(ConfigurationError),
	Failed(RemoteOpenFailure),
}

/// Dispatches open requests.
///
/// Cheap to clone.
#[derive(Clone)]
pub struct Router {
	file_types: Arc<Config>,
	listen: ListenAddress,
	base_dir: Option<PathBuf>,
	probe_timeout: Duration,
	target: BinaryLocation,
	instances: Option<InstanceView>,
	runner: Arc<dyn CommandRunner>,
	notifier: Arc<dyn Notifier>,
}

impl Router {
	pub fn new(config: &Config, target: BinaryLocation) -> Self {
		Self {
			file_types: Arc::new(config.clone()),
			listen: config.listen_address.clone(),
			base_dir: config.base_dir.clone(),
			probe_timeout: config.probe_timeout(),
			target,
			instances: None,
			runner: Arc::new(ProcessRunner),
			notifier: Arc::new(TracingNotifier),
		}
	}

	/// Router sharing the supervisor's target binary and owned instance.
	pub fn for_supervisor(config: &Config, supervisor: &Supervisor, notifier: Arc<dyn Notifier>) -> Self {
		Self::new(config, supervisor.target().clone())
			.with_instances(supervisor.instance_view())
			.with_notifier(notifier)
	}

	pub fn with_instances(mut self, view: InstanceView) -> Self {
		self.instances = Some(view);
		self
	}

	pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
		self.runner = runner;
		self
	}

	pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
		self.notifier = notifier;
		self
	}

	/// Overrides the directory relative paths are resolved against.
	pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
		self.base_dir = Some(base_dir.into());
		self
	}

	/// Whether `request` passes the file-type filter.
	pub fn accepts(&self, request: &OpenRequest) -> bool {
		let supported = self.file_types.supports(&request.extension);
		if request.composite {
			supported && self.file_types.composite_documents
		} else {
			supported
		}
	}

	/// Owned instance present, or something listening on the probe port.
	pub async fn is_reachable(&self) -> bool {
		if self.instances.as_ref().is_some_and(InstanceView::has_owned_instance) {
			trace!(target = "vimhost.router", "owned instance present");
			return true;
		}
		match self.listen.probe_target() {
			Some(addr) => is_listening(addr, self.probe_timeout).await,
			None => {
				debug!(target = "vimhost.router", listen = %self.listen, "listen address has no port to probe");
				false
			}
		}
	}

	/// Opens `request` in a reachable Neovim.
	pub async fn open_file(&self, request: &OpenRequest) -> OpenOutcome {
		if !self.accepts(request) {
			trace!(
				target = "vimhost.router",
				path = %request.path.display(),
				extension = %request.extension,
				composite = request.composite,
				"skipping unsupported file"
			);
			return OpenOutcome::Skipped;
		}

		let Some(nvim) = self.target.resolved() else {
			let error = ConfigurationError::TargetUnresolved(
				self.target
					.error
					.clone()
					.unwrap_or_else(|| "no Neovim executable configured".into()),
			);
			self.notifier.notify(Notice::error(error.to_string()));
			return OpenOutcome::Unconfigured(error);
		};

		if !self.is_reachable().await {
			let error = Error::Unreachable {
				address: self.listen.to_string(),
			};
			debug!(target = "vimhost.router", path = %request.path.display(), "{error}");
			self.notifier.notify(Notice::warning(error.to_string()));
			return OpenOutcome::NoInstance;
		}

		let absolute = self.absolute_path(&request.path);
		let spec = remote_open_command(nvim, &self.listen, &absolute);
		debug!(target = "vimhost.router", program = %spec.program.display(), args = ?spec.args, "remote open");

		let failure = match self.runner.run(spec).await {
			Ok(output) if output.success() => {
				info!(target = "vimhost.router", path = %absolute.display(), "opened in Neovim");
				self.notifier.notify(Notice::info(format!("Opened {} in Neovim", absolute.display())));
				return OpenOutcome::Opened;
			}
			Ok(output) => classify_output(&output, &self.listen, &absolute),
			Err(e) => classify_io(&e, nvim, &self.listen),
		};

		warn!(target = "vimhost.router", path = %absolute.display(), error = %failure, "remote open failed");
		self.notifier.notify(Notice::error(failure.to_string()));
		OpenOutcome::Failed(failure)
	}

	/// Runs [`open_file`](Self::open_file) in the background.
	pub fn spawn_open(&self, request: OpenRequest) -> JoinHandle<OpenOutcome> {
		let router = self.clone();
		tokio::spawn(async move { router.open_file(&request).await })
	}

	fn absolute_path(&self, path: &Path) -> PathBuf {
		if path.is_absolute() {
			return path.to_path_buf();
		}
		match &self.base_dir {
			Some(base) => base.join(path),
			None => std::env::current_dir().unwrap_or_default().join(path),
		}
	}
}

impl std::fmt::Debug for Router {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Router")
			.field("supported", &self.file_types.supported_file_types)
			.field("composite_documents", &self.file_types.composite_documents)
			.field("listen", &self.listen)
			.field("target", &self.target)
			.finish_non_exhaustive()
	}
}

/// `<nvim> --server <addr> --remote <file>`
pub fn remote_open_command(nvim: &Path, listen: &ListenAddress, file: &Path) -> CommandSpec {
	CommandSpec::new(
		nvim,
		[
			"--server".to_string(),
			listen.to_string(),
			"--remote".to_string(),
			file.to_string_lossy().into_owned(),
		],
	)
}

/// TCP connect within `timeout`; errors and timeouts both mean no.
pub async fn is_listening(addr: SocketAddr, timeout: Duration) -> bool {
	match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
		Ok(Ok(_)) => true,
		Ok(Err(e)) => {
			debug!(target = "vimhost.router", %addr, error = %e, "port probe failed");
			false
		}
		Err(_) => {
			debug!(target = "vimhost.router", %addr, "port probe timed out");
			false
		}
	}
}

fn classify_output(output: &CommandOutput, listen: &ListenAddress, file: &Path) -> RemoteOpenFailure {
	let stderr = output.stderr.trim();
	let lower = stderr.to_ascii_lowercase();

	if lower.contains("connection refused") || lower.contains("econnrefused") {
		RemoteOpenFailure::ConnectionRefused {
			address: listen.to_string(),
		}
	} else if lower.contains("no such file") || lower.contains("enoent") || lower.contains("does not exist") {
		RemoteOpenFailure::RemoteFileMissing { path: file.to_path_buf() }
	} else if stderr.is_empty() {
		RemoteOpenFailure::Generic(match output.code {
			Some(code) => format!("exit code {code}"),
			None => "terminated by signal".into(),
		})
	} else {
		RemoteOpenFailure::Generic(stderr.to_string())
	}
}

fn classify_io(error: &std::io::Error, nvim: &Path, listen: &ListenAddress) -> RemoteOpenFailure {
	match error.kind() {
		std::io::ErrorKind::NotFound => RemoteOpenFailure::NotFound { path: nvim.to_path_buf() },
		std::io::ErrorKind::ConnectionRefused => RemoteOpenFailure::ConnectionRefused {
			address: listen.to_string(),
		},
		_ => RemoteOpenFailure::Generic(error.to_string()),
	}
}
