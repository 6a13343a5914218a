//! Owned process/session state and its transitions.
//!
//! The process record and its control session live in one [`OwnedInstance`],
//! so they are always set and cleared in the same step. Every lifecycle signal
//! goes through [`OwnedState::apply`], which only acts on the generation that
//! is currently running.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{oneshot, watch};
use vimhost_runtime::RpcClient;

/// Supervisor phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
	Idle,
	Launching,
	Running,
	ShuttingDown,
}

/// Asynchronous signals about the owned process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
	/// Waiting on the process failed.
	Error(io::ErrorKind),
	/// The process exited, with its code when it had one.
	Exit(Option<i32>),
	/// The process's stdio is closed.
	Close,
	/// The control channel ended.
	Disconnect,
}

impl fmt::Display for LifecycleEvent {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			LifecycleEvent::Error(kind) => write!(f, "error ({kind})"),
			LifecycleEvent::Exit(Some(code)) => write!(f, "exit (code {code})"),
			LifecycleEvent::Exit(None) => f.write_str("exit (signal)"),
			LifecycleEvent::Close => f.write_str("close"),
			LifecycleEvent::Disconnect => f.write_str("disconnect"),
		}
	}
}

/// Handle to the spawned process.
///
/// Dropping it (or calling [`terminate`](Self::terminate)) tells the watcher
/// task to kill the child.
pub(crate) struct SupervisedProcess {
	pub(crate) pid: u32,
	kill_tx: Option<oneshot::Sender<()>>,
	exited: watch::Receiver<bool>,
}

impl SupervisedProcess {
	pub(crate) fn new(pid: u32, kill_tx: oneshot::Sender<()>, exited: watch::Receiver<bool>) -> Self {
		Self {
			pid,
			kill_tx: Some(kill_tx),
			exited,
		}
	}

	/// Kills the process and waits up to `wait` for the watcher to reap it.
	pub(crate) async fn terminate(mut self, wait: Duration) -> bool {
		if let Some(kill_tx) = self.kill_tx.take() {
			let _ = kill_tx.send(());
		}
		matches!(tokio::time::timeout(wait, self.exited.wait_for(|done| *done)).await, Ok(Ok(_)))
	}
}

impl fmt::Debug for SupervisedProcess {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SupervisedProcess").field("pid", &self.pid).finish_non_exhaustive()
	}
}

/// Attached control channel.
#[derive(Clone)]
pub(crate) struct ControlSession {
	pub(crate) client: Arc<dyn RpcClient>,
}

impl fmt::Debug for ControlSession {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ControlSession").finish_non_exhaustive()
	}
}

/// The process and its session; one cannot exist without the other.
#[derive(Debug)]
pub(crate) struct OwnedInstance {
	pub(crate) process: SupervisedProcess,
	pub(crate) session: ControlSession,
}

/// An instance removed from the state, together with the launch it belonged to.
#[derive(Debug)]
pub(crate) struct Teardown {
	pub(crate) generation: u64,
	pub(crate) instance: OwnedInstance,
}

#[derive(Debug)]
pub(crate) struct OwnedState {
	phase: Phase,
	generation: u64,
	instance: Option<OwnedInstance>,
}

impl Default for OwnedState {
	fn default() -> Self {
		Self {
			phase: Phase::Idle,
			generation: 0,
			instance: None,
		}
	}
}

impl OwnedState {
	pub(crate) fn phase(&self) -> Phase {
		self.phase
	}

	pub(crate) fn pid(&self) -> Option<u32> {
		self.instance.as_ref().map(|i| i.process.pid)
	}

	pub(crate) fn has_instance(&self) -> bool {
		self.instance.is_some()
	}

	pub(crate) fn client(&self) -> Option<Arc<dyn RpcClient>> {
		self.instance.as_ref().map(|i| Arc::clone(&i.session.client))
	}

	/// The client of `generation`, if that launch is still the running one.
	pub(crate) fn client_for(&self, generation: u64) -> Option<Arc<dyn RpcClient>> {
		if self.generation == generation && self.phase == Phase::Running {
			self.client()
		} else {
			None
		}
	}

	/// Claims the state for a new launch.
	///
	/// Fails with the current pid (if any) unless idle.
	pub(crate) fn reserve(&mut self) -> Result<u64, Option<u32>> {
		if self.phase != Phase::Idle {
			return Err(self.pid());
		}
		self.generation += 1;
		self.phase = Phase::Launching;
		Ok(self.generation)
	}

	/// Returns a reserved launch to idle after a failed spawn or attach.
	pub(crate) fn abort_launch(&mut self, generation: u64) -> bool {
		if self.generation == generation && self.phase == Phase::Launching {
			self.phase = Phase::Idle;
			true
		} else {
			false
		}
	}

	/// Stores the spawned instance; hands it back if the reservation is stale.
	pub(crate) fn commit(&mut self, generation: u64, instance: OwnedInstance) -> Result<(), OwnedInstance> {
		if self.generation != generation || self.phase != Phase::Launching {
			return Err(instance);
		}
		self.instance = Some(instance);
		self.phase = Phase::Running;
		Ok(())
	}

	/// Applies a lifecycle signal from `generation`.
	///
	/// Clears the instance and returns to idle when the signal belongs to the
	/// running launch. Anything else (a second signal, an older launch, a
	/// shutdown in progress) is ignored.
	pub(crate) fn apply(&mut self, generation: u64, _event: &LifecycleEvent) -> Option<Teardown> {
		if self.generation != generation || self.phase != Phase::Running {
			return None;
		}
		let instance = self.instance.take()?;
		self.phase = Phase::Idle;
		Some(Teardown { generation, instance })
	}

	/// Takes the running instance for an orderly shutdown.
	///
	/// With `Some(generation)` only that launch is taken.
	pub(crate) fn begin_shutdown(&mut self, generation: Option<u64>) -> Option<Teardown> {
		if self.phase != Phase::Running || generation.is_some_and(|g| g != self.generation) {
			return None;
		}
		let instance = self.instance.take()?;
		self.phase = Phase::ShuttingDown;
		Some(Teardown {
			generation: self.generation,
			instance,
		})
	}

	pub(crate) fn finish_shutdown(&mut self, generation: u64) -> bool {
		if self.generation == generation && self.phase == Phase::ShuttingDown {
			self.phase = Phase::Idle;
			true
		} else {
			false
		}
	}
}
