//! Control sessions on the owned editor.
//!
//! A [`SessionFactory`] turns the spawned child's stdio into an
//! [`RpcClient`]; the [`SessionManager`] exposes buffer and eval calls on it and
//! performs the orderly shutdown used by both `close()` and a failed liveness
//! probe.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tokio::process::{ChildStdin, ChildStdout};
use tracing::{debug, warn};
use vimhost_protocol::Buffer;
use vimhost_runtime::{Connection, PipeTransport, RpcClient};

use crate::error::Result;
use crate::notice::Notice;
use crate::supervisor::Shared;

/// Resolves when the control channel has ended.
pub type DisconnectFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A freshly attached control channel.
pub struct Attachment {
	pub client: Arc<dyn RpcClient>,
	/// Completes when the channel ends; the supervisor treats that as a
	/// disconnect of the owned process.
	pub disconnected: DisconnectFuture,
}

/// Builds a control channel over the child's stdio.
pub trait SessionFactory: Send + Sync {
	fn attach(&self, stdin: ChildStdin, stdout: ChildStdout) -> Result<Attachment>;
}

/// Default factory: msgpack-RPC over the pipes, served by a [`Connection`].
#[derive(Debug, Default, Clone, Copy)]
pub struct PipeSessionFactory;

impl SessionFactory for PipeSessionFactory {
	fn attach(&self, stdin: ChildStdin, stdout: ChildStdout) -> Result<Attachment> {
		let (transport, message_rx) = PipeTransport::new(stdin, stdout);
		let connection = Arc::new(Connection::new(transport.into_transport_parts(message_rx)));

		let runner = Arc::clone(&connection);
		let loop_handle = tokio::spawn(async move {
			if let Err(e) = runner.run().await {
				debug!(target = "vimhost.session", error = %e, "connection loop failed");
			}
		});

		Ok(Attachment {
			client: connection,
			disconnected: Box::pin(async move {
				let _ = loop_handle.await;
			}),
		})
	}
}

/// Result of [`SessionManager::close`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
	Closed { pid: u32 },
	NotRunning,
}

/// Operations on the owned control session.
///
/// Cheap to clone; every clone observes the same supervisor state.
#[derive(Clone)]
pub struct SessionManager {
	shared: Arc<Shared>,
}

impl SessionManager {
	pub(crate) fn new(shared: Arc<Shared>) -> Self {
		Self { shared }
	}

	/// Whether a control session is attached.
	pub fn is_attached(&self) -> bool {
		self.shared.state.lock().has_instance()
	}

	/// Lists the editor's buffers.
	///
	/// Empty when nothing is attached or the call fails.
	pub async fn list_buffers(&self) -> Vec<Buffer> {
		let Some(client) = self.shared.state.lock().client() else {
			debug!(target = "vimhost.session", "list_buffers without a session");
			return Vec::new();
		};
		match client.list_buffers().await {
			Ok(buffers) => buffers,
			Err(e) => {
				warn!(target = "vimhost.session", error = %e, "failed to list buffers");
				Vec::new()
			}
		}
	}

	/// Evaluates `expr`; `None` when nothing is attached or the call fails.
	pub async fn eval(&self, expr: &str) -> Option<Value> {
		let client = self.shared.state.lock().client()?;
		match client.eval(expr).await {
			Ok(value) => Some(value),
			Err(e) => {
				warn!(target = "vimhost.session", expr, error = %e, "eval failed");
				None
			}
		}
	}

	/// Quits and kills the owned editor.
	///
	/// Both references are cleared whatever the quit call does; calling again
	/// is a no-op.
	pub async fn close(&self) -> CloseOutcome {
		match self.shared.shutdown(None).await {
			Some(pid) => {
				self.shared.notify(Notice::info("Neovim closed"));
				CloseOutcome::Closed { pid }
			}
			None => {
				debug!(target = "vimhost.session", "close with nothing running");
				CloseOutcome::NotRunning
			}
		}
	}
}

impl std::fmt::Debug for SessionManager {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SessionManager")
			.field("attached", &self.is_attached())
			.finish()
	}
}

#[cfg(all(test, unix))]
mod tests {
	use std::process::Stdio;
	use std::time::Duration;

	use tokio::process::Command;

	use super::*;

	#[tokio::test]
	async fn pipe_session_reports_disconnect_when_child_exits() {
		let mut child = Command::new("/bin/sh")
			.args(["-c", "dd bs=1 count=1 >/dev/null 2>&1; exit 0"])
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.spawn()
			.unwrap();
		let stdin = child.stdin.take().unwrap();
		let stdout = child.stdout.take().unwrap();

		let attachment = PipeSessionFactory.attach(stdin, stdout).unwrap();

		// The first request byte wakes the child up; it exits without answering.
		let err = attachment.client.eval("1").await.unwrap_err();
		assert!(err.is_disconnect(), "unexpected error: {err}");

		tokio::time::timeout(Duration::from_secs(5), attachment.disconnected)
			.await
			.expect("disconnect not reported");
		child.wait().await.unwrap();
	}
}
