//! Fakes shared by the supervisor, session and router tests.

use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::process::{ChildStdin, ChildStdout};
use tokio::sync::oneshot;
use vimhost_protocol::Buffer;
use vimhost_runtime::{RpcClient, RpcFuture};

use crate::command::{CommandFuture, CommandOutput, CommandRunner, CommandSpec};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::notice::NoticeLog;
use crate::planner::Platform;
use crate::resolver::BinaryLocation;
use crate::session::{Attachment, SessionFactory};
use crate::supervisor::Supervisor;

/// How a [`FakeClient`] answers `eval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalBehavior {
	Answer,
	Fail,
	Hang,
}

/// Scriptable editor client.
pub struct FakeClient {
	pub eval: EvalBehavior,
	pub buffers: Vec<Buffer>,
	pub fail_buffers: bool,
	pub quit_calls: AtomicUsize,
	pub eval_calls: AtomicUsize,
}

impl FakeClient {
	pub fn new(eval: EvalBehavior) -> Self {
		Self {
			eval,
			buffers: vec![
				Buffer {
					id: 1,
					name: Some("notes/today.md".into()),
				},
				Buffer { id: 2, name: None },
			],
			fail_buffers: false,
			quit_calls: AtomicUsize::new(0),
			eval_calls: AtomicUsize::new(0),
		}
	}
}

impl RpcClient for FakeClient {
	fn eval(&self, _expr: &str) -> RpcFuture<'_, Value> {
		self.eval_calls.fetch_add(1, Ordering::SeqCst);
		let behavior = self.eval;
		Box::pin(async move {
			match behavior {
				EvalBehavior::Answer => Ok(Value::from(1)),
				EvalBehavior::Fail => Err(vimhost_runtime::Error::Remote {
					message: "E492: Not an editor command".into(),
					code: None,
				}),
				EvalBehavior::Hang => {
					tokio::time::sleep(Duration::from_secs(3600)).await;
					Ok(Value::Null)
				}
			}
		})
	}

	fn list_buffers(&self) -> RpcFuture<'_, Vec<Buffer>> {
		Box::pin(async move {
			if self.fail_buffers {
				Err(vimhost_runtime::Error::ChannelClosed)
			} else {
				Ok(self.buffers.clone())
			}
		})
	}

	fn quit(&self) -> RpcFuture<'_, ()> {
		self.quit_calls.fetch_add(1, Ordering::SeqCst);
		Box::pin(async { Ok(()) })
	}
}

/// Hands out prepared clients and lets tests trigger disconnects.
#[derive(Default)]
pub struct FakeFactory {
	clients: Mutex<VecDeque<Arc<FakeClient>>>,
	disconnects: Mutex<Vec<oneshot::Sender<()>>>,
	pub fail: bool,
}

impl FakeFactory {
	pub fn with_client(client: Arc<FakeClient>) -> Self {
		let factory = Self::default();
		factory.clients.lock().push_back(client);
		factory
	}

	pub fn failing() -> Self {
		Self {
			fail: true,
			..Self::default()
		}
	}

	/// Ends the control channel of the most recent attachment.
	pub fn disconnect_latest(&self) {
		if let Some(tx) = self.disconnects.lock().pop() {
			let _ = tx.send(());
		}
	}
}

impl SessionFactory for FakeFactory {
	fn attach(&self, _stdin: ChildStdin, _stdout: ChildStdout) -> Result<Attachment> {
		if self.fail {
			return Err(Error::Attach("handshake refused".into()));
		}
		let client = self
			.clients
			.lock()
			.pop_front()
			.unwrap_or_else(|| Arc::new(FakeClient::new(EvalBehavior::Answer)));
		let (tx, rx) = oneshot::channel::<()>();
		self.disconnects.lock().push(tx);
		Ok(Attachment {
			client,
			disconnected: Box::pin(async move {
				// A dropped sender (factory gone) is not a disconnect.
				if rx.await.is_err() {
					std::future::pending::<()>().await;
				}
			}),
		})
	}
}

/// Records every command and answers from a script.
#[derive(Default)]
pub struct RecordingRunner {
	pub calls: Mutex<Vec<CommandSpec>>,
	responses: Mutex<VecDeque<io::Result<CommandOutput>>>,
}

impl RecordingRunner {
	pub fn succeeding() -> Self {
		Self::default()
	}

	pub fn responding(response: io::Result<CommandOutput>) -> Self {
		let runner = Self::default();
		runner.responses.lock().push_back(response);
		runner
	}

	pub fn calls(&self) -> Vec<CommandSpec> {
		self.calls.lock().clone()
	}
}

impl CommandRunner for RecordingRunner {
	fn run(&self, spec: CommandSpec) -> CommandFuture {
		self.calls.lock().push(spec);
		let response = self.responses.lock().pop_front().unwrap_or_else(|| {
			Ok(CommandOutput {
				code: Some(0),
				..CommandOutput::default()
			})
		});
		Box::pin(async move { response })
	}
}

/// Writes an executable shell script.
#[cfg(unix)]
pub fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
	use std::os::unix::fs::PermissionsExt;

	let path = dir.join(name);
	std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
	std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
	path
}

/// Config with short timings for tests.
pub fn fast_config() -> Config {
	Config {
		liveness_grace_ms: 20,
		probe_timeout_ms: 200,
		quit_timeout_ms: 500,
		login_shell: Some(PathBuf::from("/bin/sh")),
		..Config::default()
	}
}

/// Supervisor running `terminal` through `/bin/sh` with fake sessions.
pub fn supervisor_with(config: &Config, terminal: Option<PathBuf>, factory: Arc<FakeFactory>, log: &NoticeLog) -> Supervisor {
	Supervisor::builder(config)
		.platform(Platform::Unix)
		.target(BinaryLocation::manual("/opt/nvim/bin/nvim"))
		.terminal(terminal)
		.session_factory(factory)
		.notifier(Arc::new(log.clone()))
		.build()
}
