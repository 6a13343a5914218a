//! Request/response correlation on top of a [`Transport`](crate::Transport).
//!
//! # Message Flow
//!
//! 1. Caller invokes [`Connection::send_request`] with a method and params
//! 2. Connection allocates an id and parks a oneshot sender under it
//! 3. The request is queued for the writer task
//! 4. The dispatch loop in [`Connection::run`] decodes incoming frames
//! 5. Responses are matched by id and delivered through the oneshot
//! 6. When the transport ends, every pending request fails with
//!    [`Error::ChannelClosed`]

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::task::{Context, Poll};

use parking_lot::Mutex;
use rmpv::Value as Msgpack;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use vimhost_protocol::{Message, RemoteError, Request, Response};

use crate::error::{Error, Result};
use crate::transport::{Transport, TransportParts, TransportReceiver};


/// Pending request callbacks keyed by request id.
type CallbackMap = Arc<Mutex<HashMap<u32, oneshot::Sender<Result<Value>>>>>;

/// Removes the parked callback when a request future is dropped before completion.
struct CancelGuard {
	id: u32,
	callbacks: CallbackMap,
	completed: bool,
}

impl Drop for CancelGuard {
	fn drop(&mut self) {
		if !self.completed && self.callbacks.lock().remove(&self.id).is_some() {
			tracing::debug!(target = "vimhost.rpc", id = self.id, "dropped pending request");
		}
	}
}

/// Future returned by [`Connection::send_request`].
struct ResponseFuture {
	rx: oneshot::Receiver<Result<Value>>,
	guard: CancelGuard,
}

impl Future for ResponseFuture {
	type Output = Result<Value>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match Pin::new(&mut self.rx).poll(cx) {
			Poll::Ready(result) => {
				self.guard.completed = true;
				Poll::Ready(result.map_err(|_| Error::ChannelClosed).and_then(|r| r))
			}
			Poll::Pending => Poll::Pending,
		}
	}
}

/// Correlating connection to a supervised editor.
///
/// Created from [`TransportParts`]; nothing is read or written until
/// [`run`](Self::run) is spawned.
pub struct Connection {
	last_id: AtomicU32,
	callbacks: CallbackMap,
	outbound_tx: mpsc::UnboundedSender<Msgpack>,
	io: Mutex<Option<ConnectionIo>>,
}

/// Transport halves and channels consumed by the first call to `run`.
struct ConnectionIo {
	sender: Box<dyn Transport>,
	receiver: Box<dyn TransportReceiver>,
	message_rx: mpsc::UnboundedReceiver<Msgpack>,
	outbound_rx: mpsc::UnboundedReceiver<Msgpack>,
}

impl Connection {
	pub fn new(parts: TransportParts) -> Self {
		let TransportParts {
			sender,
			receiver,
			message_rx,
		} = parts;
		let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

		Self {
			last_id: AtomicU32::new(0),
			callbacks: Arc::new(Mutex::new(HashMap::new())),
			outbound_tx,
			io: Mutex::new(Some(ConnectionIo {
				sender,
				receiver,
				message_rx,
				outbound_rx,
			})),
		}
	}

	/// Sends a request and awaits its response.
	///
	/// There is no built-in deadline; callers bound the wait with
	/// `tokio::time::timeout` where they need one.
	pub async fn send_request(&self, method: &str, params: Vec<Value>) -> Result<Value> {
		let id = self.last_id.fetch_add(1, Ordering::SeqCst);
		tracing::debug!(target = "vimhost.rpc", id, method, "sending request");

		let (tx, rx) = oneshot::channel();
		self.callbacks.lock().insert(id, tx);
		let guard = CancelGuard {
			id,
			callbacks: Arc::clone(&self.callbacks),
			completed: false,
		};

		let request = Request::new(id, method, params).to_value();
		if self.outbound_tx.send(request).is_err() {
			tracing::debug!(target = "vimhost.rpc", id, "outbound channel closed");
			return Err(Error::ChannelClosed);
		}

		ResponseFuture { rx, guard }.await
	}

	/// Runs the reader, writer and dispatch loop until the transport ends.
	///
	/// Returns once the peer has gone away; pending requests are failed with
	/// [`Error::ChannelClosed`] before returning.
	pub async fn run(self: &Arc<Self>) -> Result<()> {
		let Some(io) = self.io.lock().take() else {
			return Err(Error::ProtocolError("connection is already running".into()));
		};
		let ConnectionIo {
			mut sender,
			receiver,
			mut message_rx,
			mut outbound_rx,
		} = io;

		let reader_handle = tokio::spawn(async move {
			if let Err(e) = receiver.run().await {
				tracing::debug!(target = "vimhost.rpc", error = %e, "transport reader ended");
			}
		});

		let writer_handle = tokio::spawn(async move {
			while let Some(message) = outbound_rx.recv().await {
				if let Err(e) = sender.send(message).await {
					tracing::debug!(target = "vimhost.rpc", error = %e, "transport writer ended");
					break;
				}
			}
		});

		while let Some(value) = message_rx.recv().await {
			if let Err(e) = self.dispatch_internal(Message::from_value(value)) {
				tracing::warn!(target = "vimhost.rpc", error = %e, "failed to dispatch message");
			}
		}

		// Dropping the senders fails every pending request with ChannelClosed.
		self.callbacks.lock().clear();
		writer_handle.abort();
		let _ = reader_handle.await;

		tracing::debug!(target = "vimhost.rpc", "connection closed");
		Ok(())
	}

	/// Dispatch an incoming message (test-only public version)
	#[cfg(test)]
	pub(crate) fn dispatch(&self, message: Message) -> Result<()> {
		self.dispatch_internal(message)
	}

	fn dispatch_internal(&self, message: Message) -> Result<()> {
		match message {
			Message::Response(response) => {
				let Response { id, result, error } = response;
				let callback = self
					.callbacks
					.lock()
					.remove(&id)
					.ok_or_else(|| Error::ProtocolError(format!("Cannot find request to respond: id={id}")))?;

				let outcome = match error {
					Some(error) => Err(remote_error(error)),
					None => Ok(result.unwrap_or(Value::Null)),
				};
				let _ = callback.send(outcome);
				Ok(())
			}
			Message::Notification(notification) => {
				tracing::trace!(target = "vimhost.rpc", method = %notification.method, "ignoring notification");
				Ok(())
			}
			Message::Unknown(value) => {
				tracing::debug!(target = "vimhost.rpc", %value, "unexpected frame (ignored)");
				Ok(())
			}
		}
	}
}

fn remote_error(error: RemoteError) -> Error {
	Error::Remote {
		message: error.message,
		code: error.code,
	}
}
