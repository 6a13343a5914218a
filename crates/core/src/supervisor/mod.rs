//! Spawning and supervising the owned Neovim.
//!
//! # Launch sequence
//!
//! 1. Refuse if anything is running or launching
//! 2. Check that both the terminal and Neovim were resolved
//! 3. Reserve the state (`Launching`) and spawn the planned command
//! 4. Attach a control session over the child's stdio
//! 5. Commit to `Running`, start the process and channel watchers
//! 6. After the grace delay, probe liveness with a trivial `eval`; an error
//!    reply shuts the instance down, silence only warns
//!
//! Any failure in 3-4 returns the state to `Idle`. Lifecycle signals from the
//! watchers and the orderly shutdown in [`SessionManager::close`] both go
//! through [`OwnedState`], so whichever comes first wins and the rest are
//! no-ops.

mod state;

#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::process::Child;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

pub use state::{LifecycleEvent, Phase};
pub(crate) use state::{ControlSession, OwnedInstance, OwnedState, SupervisedProcess};

use crate::address::ListenAddress;
use crate::config::Config;
use crate::error::{ConfigurationError, Error, SpawnError};
use crate::notice::{Notice, Notifier, TracingNotifier};
use crate::planner::{self, LaunchPlan, PlanRequest, Platform};
use crate::resolver::{self, BinaryLocation};
use crate::session::{DisconnectFuture, PipeSessionFactory, SessionFactory, SessionManager};

/// Expression evaluated by the liveness probe.
const PROBE_EXPR: &str = "1";

/// Terminal used when none is configured.
pub fn default_terminal() -> &'static str {
	if cfg!(windows) {
		"wt.exe"
	} else if cfg!(target_os = "macos") {
		"kitty"
	} else {
		"alacritty"
	}
}

/// State shared by the supervisor, the session manager and the router.
pub(crate) struct Shared {
	pub(crate) state: Mutex<OwnedState>,
	phase_tx: watch::Sender<Phase>,
	notifier: Arc<dyn Notifier>,
	quit_timeout: Duration,
}

impl Shared {
	fn new(notifier: Arc<dyn Notifier>, quit_timeout: Duration) -> Self {
		let (phase_tx, _) = watch::channel(Phase::Idle);
		Self {
			state: Mutex::new(OwnedState::default()),
			phase_tx,
			notifier,
			quit_timeout,
		}
	}

	pub(crate) fn notify(&self, notice: Notice) {
		self.notifier.notify(notice);
	}

	fn publish(&self, phase: Phase) {
		self.phase_tx.send_replace(phase);
	}

	/// Applies a lifecycle signal; only the first one for a launch has an effect.
	pub(crate) fn on_lifecycle(&self, generation: u64, event: LifecycleEvent) {
		let teardown = {
			let mut state = self.state.lock();
			let teardown = state.apply(generation, &event);
			if teardown.is_some() {
				self.publish(state.phase());
			}
			teardown
		};

		let Some(teardown) = teardown else {
			trace!(target = "vimhost.supervisor", generation, %event, "ignoring lifecycle event");
			return;
		};

		let pid = teardown.instance.process.pid;
		info!(target = "vimhost.supervisor", pid, generation, %event, "owned Neovim ended");
		self.notify(match &event {
			LifecycleEvent::Error(kind) => Notice::error(format!("Neovim process error: {}", describe_io_kind(*kind))),
			LifecycleEvent::Exit(Some(code)) => Notice::info(format!("Neovim exited with code {code}")),
			LifecycleEvent::Exit(None) => Notice::info("Neovim exited"),
			LifecycleEvent::Close => Notice::info("Neovim closed"),
			LifecycleEvent::Disconnect => Notice::warning("Neovim control channel disconnected"),
		});
		// Dropping the process record kills the child if it is still alive.
		drop(teardown);
	}

	/// Quits and kills the running instance (only `generation`, when given).
	///
	/// Returns the pid that was shut down, or `None` when there was nothing to do.
	pub(crate) async fn shutdown(&self, generation: Option<u64>) -> Option<u32> {
		let teardown = {
			let mut state = self.state.lock();
			let teardown = state.begin_shutdown(generation)?;
			self.publish(state.phase());
			teardown
		};

		let generation = teardown.generation;
		let OwnedInstance { process, session } = teardown.instance;
		let pid = process.pid;
		debug!(target = "vimhost.supervisor", pid, generation, "shutting down owned Neovim");

		match tokio::time::timeout(self.quit_timeout, session.client.quit()).await {
			Ok(Ok(())) => debug!(target = "vimhost.supervisor", pid, "quit acknowledged"),
			Ok(Err(e)) => warn!(target = "vimhost.supervisor", pid, error = %e, "quit failed; killing"),
			Err(_) => warn!(target = "vimhost.supervisor", pid, "quit timed out; killing"),
		}
		drop(session);

		if !process.terminate(self.quit_timeout).await {
			warn!(target = "vimhost.supervisor", pid, "process was not reaped in time");
		}

		let mut state = self.state.lock();
		if state.finish_shutdown(generation) {
			self.publish(state.phase());
		}
		Some(pid)
	}
}

/// Result of [`Supervisor::launch`].
#[derive(Debug)]
pub enum LaunchOutcome {
	/// Spawned; `liveness` resolves once the post-launch probe has run.
	Started { pid: u32, liveness: JoinHandle<ProbeOutcome> },
	/// Nothing spawned because an instance is running or launching.
	AlreadyRunning { pid: Option<u32> },
	/// Nothing left running; the error has already been notified.
	Failed(Error),
}

impl LaunchOutcome {
	pub fn pid(&self) -> Option<u32> {
		match self {
			LaunchOutcome::Started { pid, .. } => Some(*pid),
			LaunchOutcome::AlreadyRunning { pid } => *pid,
			LaunchOutcome::Failed(_) => None,
		}
	}
}

/// Result of the post-launch liveness probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
	Connected,
	/// No answer within the probe timeout; the instance keeps running.
	Unconfirmed,
	/// The editor answered with an error and the instance was shut down.
	Failed(String),
	/// The instance was gone before the probe ran.
	Gone,
}

/// Snapshot returned by [`Supervisor::status`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
	pub phase: Phase,
	pub pid: Option<u32>,
	pub session_attached: bool,
	pub target: BinaryLocation,
	pub terminal: Option<PathBuf>,
	pub listen_address: ListenAddress,
}

/// Inputs resolved once at construction.
#[derive(Clone)]
struct LaunchSettings {
	target: BinaryLocation,
	terminal_name: String,
	terminal: Option<PathBuf>,
	listen: ListenAddress,
	platform: Platform,
	login_shell: Option<PathBuf>,
	working_dir: Option<PathBuf>,
	api_key: Option<String>,
	liveness_grace: Duration,
	probe_timeout: Duration,
}

/// Owns the spawned Neovim process and its control session.
///
/// Cheap to clone; clones share the same process.
#[derive(Clone)]
pub struct Supervisor {
	shared: Arc<Shared>,
	settings: Arc<LaunchSettings>,
	factory: Arc<dyn SessionFactory>,
}

impl Supervisor {
	/// Resolves both binaries from `config` and uses the default session factory.
	pub fn new(config: &Config, notifier: Arc<dyn Notifier>) -> Self {
		SupervisorBuilder::new(config).notifier(notifier).build()
	}

	pub fn builder(config: &Config) -> SupervisorBuilder {
		SupervisorBuilder::new(config)
	}

	pub fn sessions(&self) -> SessionManager {
		SessionManager::new(Arc::clone(&self.shared))
	}

	/// Read-only view for the router.
	pub fn instance_view(&self) -> InstanceView {
		InstanceView {
			shared: Arc::clone(&self.shared),
		}
	}

	pub fn target(&self) -> &BinaryLocation {
		&self.settings.target
	}

	pub fn terminal(&self) -> Option<&PathBuf> {
		self.settings.terminal.as_ref()
	}

	pub fn listen_address(&self) -> &ListenAddress {
		&self.settings.listen
	}

	pub fn phase(&self) -> Phase {
		self.shared.state.lock().phase()
	}

	/// Receives every phase change.
	pub fn subscribe(&self) -> watch::Receiver<Phase> {
		self.shared.phase_tx.subscribe()
	}

	pub fn status(&self) -> Status {
		let state = self.shared.state.lock();
		Status {
			phase: state.phase(),
			pid: state.pid(),
			session_attached: state.has_instance(),
			target: self.settings.target.clone(),
			terminal: self.settings.terminal.clone(),
			listen_address: self.settings.listen.clone(),
		}
	}

	/// Builds the launch plan without spawning anything.
	pub fn plan(&self) -> Result<LaunchPlan, ConfigurationError> {
		let settings = &self.settings;
		let target = settings.target.resolved().ok_or_else(|| {
			ConfigurationError::TargetUnresolved(
				settings
					.target
					.error
					.clone()
					.unwrap_or_else(|| "no Neovim executable configured".into()),
			)
		})?;
		let terminal = settings
			.terminal
			.as_deref()
			.ok_or_else(|| ConfigurationError::TerminalUnresolved(settings.terminal_name.clone()))?;

		Ok(planner::plan(&PlanRequest {
			terminal,
			target,
			listen: &settings.listen,
			platform: settings.platform,
			login_shell: settings.login_shell.as_deref(),
			working_dir: settings.working_dir.as_deref(),
			api_key: settings.api_key.as_deref(),
		}))
	}

	/// Launches the owned instance in a terminal.
	///
	/// Never spawns twice: while anything is running or launching this reports
	/// [`LaunchOutcome::AlreadyRunning`].
	pub async fn launch(&self) -> LaunchOutcome {
		let busy = {
			let state = self.shared.state.lock();
			(state.phase() != Phase::Idle).then(|| state.pid())
		};
		if let Some(pid) = busy {
			return self.already_running(pid);
		}

		let plan = match self.plan() {
			Ok(plan) => plan,
			Err(e) => return self.fail(None, e.into()),
		};

		let generation = {
			let mut state = self.shared.state.lock();
			match state.reserve() {
				Ok(generation) => {
					self.shared.publish(state.phase());
					generation
				}
				Err(pid) => {
					drop(state);
					return self.already_running(pid);
				}
			}
		};

		if plan.fallback {
			self.shared.notify(Notice::warning(format!(
				"Unrecognized terminal {}; launching with the generic `-e` form",
				plan.executable.display()
			)));
		}

		let (program, _) = plan.argv();
		debug!(
			target = "vimhost.supervisor",
			generation,
			program = %program.display(),
			command_line = %plan.command_line(),
			"spawning"
		);

		let mut child = match plan.command().spawn() {
			Ok(child) => child,
			Err(e) => return self.fail(Some(generation), SpawnError::classify(&program, e).into()),
		};

		let Some(pid) = child.id() else {
			let _ = child.start_kill();
			return self.fail(Some(generation), SpawnError::MissingPid { path: program }.into());
		};

		let attachment = match (child.stdin.take(), child.stdout.take()) {
			(Some(stdin), Some(stdout)) => self.factory.attach(stdin, stdout),
			_ => Err(Error::Attach("child stdio was not piped".into())),
		};
		let attachment = match attachment {
			Ok(attachment) => attachment,
			Err(e) => {
				let _ = child.start_kill();
				let e = match e {
					e @ Error::Attach(_) => e,
					other => Error::Attach(other.to_string()),
				};
				return self.fail(Some(generation), e);
			}
		};

		let (kill_tx, kill_rx) = oneshot::channel();
		let (exited_tx, exited_rx) = watch::channel(false);
		let instance = OwnedInstance {
			process: SupervisedProcess::new(pid, kill_tx, exited_rx),
			session: ControlSession {
				client: attachment.client,
			},
		};

		{
			let mut state = self.shared.state.lock();
			if let Err(instance) = state.commit(generation, instance) {
				drop(state);
				drop(instance);
				return self.fail(None, Error::Attach("launch was superseded".into()));
			}
			self.shared.publish(state.phase());
		}

		tokio::spawn(watch_process(Arc::clone(&self.shared), generation, child, kill_rx, exited_tx));
		tokio::spawn(watch_channel(Arc::clone(&self.shared), generation, attachment.disconnected));

		info!(target = "vimhost.supervisor", pid, generation, listen = %self.settings.listen, "Neovim started");
		self.shared.notify(Notice::info(format!("Neovim started (pid {pid})")));

		let liveness = tokio::spawn(probe_liveness(
			Arc::clone(&self.shared),
			generation,
			self.settings.liveness_grace,
			self.settings.probe_timeout,
		));

		LaunchOutcome::Started { pid, liveness }
	}

	fn already_running(&self, pid: Option<u32>) -> LaunchOutcome {
		debug!(target = "vimhost.supervisor", ?pid, "launch refused: already running");
		self.shared.notify(Notice::info("Neovim is already running"));
		LaunchOutcome::AlreadyRunning { pid }
	}

	/// Releases a reservation (if any), notifies and reports failure.
	fn fail(&self, generation: Option<u64>, error: Error) -> LaunchOutcome {
		if let Some(generation) = generation {
			let mut state = self.shared.state.lock();
			if state.abort_launch(generation) {
				self.shared.publish(state.phase());
			}
		}
		warn!(target = "vimhost.supervisor", error = %error, "launch failed");
		self.shared.notify(Notice::error(error.to_string()));
		LaunchOutcome::Failed(error)
	}
}

impl std::fmt::Debug for Supervisor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Supervisor")
			.field("target", &self.settings.target)
			.field("terminal", &self.settings.terminal)
			.field("phase", &self.phase())
			.finish_non_exhaustive()
	}
}

/// Read-only view of the owned instance.
#[derive(Clone)]
pub struct InstanceView {
	shared: Arc<Shared>,
}

impl InstanceView {
	/// True when both the process and its session are present.
	pub fn has_owned_instance(&self) -> bool {
		self.shared.state.lock().has_instance()
	}

	pub fn pid(&self) -> Option<u32> {
		self.shared.state.lock().pid()
	}
}

impl std::fmt::Debug for InstanceView {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("InstanceView")
			.field("owned", &self.has_owned_instance())
			.finish()
	}
}

/// Configures a [`Supervisor`].
///
/// Binaries are resolved from the config unless set explicitly.
pub struct SupervisorBuilder {
	config: Config,
	notifier: Arc<dyn Notifier>,
	factory: Arc<dyn SessionFactory>,
	platform: Platform,
	target: Option<BinaryLocation>,
	terminal: Option<Option<PathBuf>>,
}

impl SupervisorBuilder {
	pub fn new(config: &Config) -> Self {
		Self {
			config: config.clone(),
			notifier: Arc::new(TracingNotifier),
			factory: Arc::new(PipeSessionFactory),
			platform: Platform::current(),
			target: None,
			terminal: None,
		}
	}

	pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
		self.notifier = notifier;
		self
	}

	pub fn session_factory(mut self, factory: Arc<dyn SessionFactory>) -> Self {
		self.factory = factory;
		self
	}

	pub fn platform(mut self, platform: Platform) -> Self {
		self.platform = platform;
		self
	}

	/// Uses `target` instead of resolving Neovim.
	pub fn target(mut self, target: BinaryLocation) -> Self {
		self.target = Some(target);
		self
	}

	/// Uses `terminal` instead of resolving the configured terminal.
	pub fn terminal(mut self, terminal: Option<PathBuf>) -> Self {
		self.terminal = Some(terminal);
		self
	}

	pub fn build(self) -> Supervisor {
		let config = self.config;
		let search_paths = resolver::default_search_paths(&config.search_paths);

		let target = self
			.target
			.unwrap_or_else(|| resolver::resolve(config.nvim_path.as_deref(), &search_paths));
		let terminal_name = config.terminal.clone().unwrap_or_else(|| default_terminal().to_string());
		let terminal = self
			.terminal
			.unwrap_or_else(|| resolver::resolve_terminal(&terminal_name, &search_paths));

		let login_shell = config.login_shell.clone().or_else(|| match self.platform {
			Platform::Unix => std::env::var_os("SHELL").filter(|s| !s.is_empty()).map(PathBuf::from),
			Platform::Windows => None,
		});

		let settings = LaunchSettings {
			target,
			terminal_name,
			terminal,
			listen: config.listen_address.clone(),
			platform: self.platform,
			login_shell,
			working_dir: config.base_dir.clone(),
			api_key: config.api_key.clone(),
			liveness_grace: config.liveness_grace(),
			probe_timeout: config.probe_timeout(),
		};
		debug!(
			target = "vimhost.supervisor",
			nvim = %settings.target.path.display(),
			terminal = ?settings.terminal,
			platform = ?settings.platform,
			"supervisor configured"
		);

		Supervisor {
			shared: Arc::new(Shared::new(self.notifier, config.quit_timeout())),
			settings: Arc::new(settings),
			factory: self.factory,
		}
	}
}

/// Waits for the child to exit or for a kill request, then reports exit and close.
async fn watch_process(
	shared: Arc<Shared>,
	generation: u64,
	mut child: Child,
	kill_rx: oneshot::Receiver<()>,
	exited_tx: watch::Sender<bool>,
) {
	let status = tokio::select! {
		status = child.wait() => status,
		_ = kill_rx => {
			if let Err(e) = child.start_kill() {
				debug!(target = "vimhost.supervisor", error = %e, "kill failed");
			}
			child.wait().await
		}
	};
	let _ = exited_tx.send(true);

	match status {
		Ok(status) => shared.on_lifecycle(generation, LifecycleEvent::Exit(status.code())),
		Err(e) => shared.on_lifecycle(generation, LifecycleEvent::Error(e.kind())),
	}
	shared.on_lifecycle(generation, LifecycleEvent::Close);
}

async fn watch_channel(shared: Arc<Shared>, generation: u64, disconnected: DisconnectFuture) {
	disconnected.await;
	shared.on_lifecycle(generation, LifecycleEvent::Disconnect);
}

/// Waits out the grace delay, then checks the editor answers.
///
/// Only an error reply shuts the instance down; silence past `timeout` is
/// reported and tolerated.
async fn probe_liveness(shared: Arc<Shared>, generation: u64, grace: Duration, timeout: Duration) -> ProbeOutcome {
	tokio::time::sleep(grace).await;

	let Some(client) = shared.state.lock().client_for(generation) else {
		debug!(target = "vimhost.supervisor", generation, "instance gone before liveness probe");
		return ProbeOutcome::Gone;
	};

	let reason = match tokio::time::timeout(timeout, client.eval(PROBE_EXPR)).await {
		Ok(Ok(_)) => {
			info!(target = "vimhost.supervisor", generation, "liveness probe succeeded");
			shared.notify(Notice::info("Neovim connected"));
			return ProbeOutcome::Connected;
		}
		Ok(Err(e)) => e.to_string(),
		Err(_) => {
			warn!(target = "vimhost.supervisor", generation, timeout_ms = timeout.as_millis() as u64, "liveness unconfirmed");
			shared.notify(Notice::warning(format!(
				"Neovim did not answer within {} ms; leaving it running",
				timeout.as_millis()
			)));
			return ProbeOutcome::Unconfirmed;
		}
	};
	drop(client);

	let error = Error::Probe(reason.clone());
	warn!(target = "vimhost.supervisor", generation, error = %error, "liveness probe failed");
	shared.notify(Notice::error(error.to_string()));
	shared.shutdown(Some(generation)).await;
	ProbeOutcome::Failed(reason)
}

fn describe_io_kind(kind: std::io::ErrorKind) -> String {
	match kind {
		std::io::ErrorKind::NotFound => "executable not found".into(),
		std::io::ErrorKind::PermissionDenied => "permission denied".into(),
		other => other.to_string(),
	}
}
