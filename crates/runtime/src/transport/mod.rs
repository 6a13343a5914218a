//! msgpack-RPC transport over a child's standard streams.
//!
//! Frames are plain msgpack values written back to back, with no length
//! prefix. The transport is split into a sender half (owned by the
//! connection's writer task) and a receiver half (owned by the reader task)
//! so reads and writes never contend.

use std::future::Future;
use std::pin::Pin;

use rmpv::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::error::{Error, Result};


/// Buffered bytes beyond this without a complete frame are an error.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

const READ_CHUNK: usize = 8 * 1024;

/// Boxed future returned by transport operations.
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Sending half of a transport.
pub trait Transport: Send {
	/// Encode and write one message.
	fn send(&mut self, message: Value) -> TransportFuture<'_>;
}

/// Receiving half of a transport.
pub trait TransportReceiver: Send {
	/// Read frames until the stream ends, forwarding each decoded message.
	fn run(self: Box<Self>) -> TransportFuture<'static>;
}

/// Both halves of a transport plus the channel decoded messages arrive on.
pub struct TransportParts {
	pub sender: Box<dyn Transport>,
	pub receiver: Box<dyn TransportReceiver>,
	pub message_rx: mpsc::UnboundedReceiver<Value>,
}

/// Transport over a pair of pipes, typically a child's stdin and stdout.
pub struct PipeTransport<W, R> {
	stdin: W,
	stdout: R,
	message_tx: mpsc::UnboundedSender<Value>,
}

impl<W, R> PipeTransport<W, R>
where
	W: AsyncWrite + Unpin + Send + 'static,
	R: AsyncRead + Unpin + Send + 'static,
{
	/// Creates a transport writing to `stdin` and reading from `stdout`.
	///
	/// Returns the transport and the receiver decoded messages are delivered to.
	pub fn new(stdin: W, stdout: R) -> (Self, mpsc::UnboundedReceiver<Value>) {
		let (message_tx, message_rx) = mpsc::unbounded_channel();
		(
			Self {
				stdin,
				stdout,
				message_tx,
			},
			message_rx,
		)
	}

	/// Splits into independently owned sender and receiver halves.
	pub fn into_parts(self) -> (PipeTransportSender<W>, PipeTransportReceiver<R>) {
		(
			PipeTransportSender { stdin: self.stdin },
			PipeTransportReceiver {
				stdout: self.stdout,
				message_tx: self.message_tx,
			},
		)
	}

	/// Splits into boxed halves ready for a [`Connection`](crate::Connection).
	pub fn into_transport_parts(self, message_rx: mpsc::UnboundedReceiver<Value>) -> TransportParts {
		let (sender, receiver) = self.into_parts();
		TransportParts {
			sender: Box::new(sender),
			receiver: Box::new(receiver),
			message_rx,
		}
	}
}

/// Writing half of a [`PipeTransport`].
pub struct PipeTransportSender<W> {
	stdin: W,
}

impl<W> Transport for PipeTransportSender<W>
where
	W: AsyncWrite + Unpin + Send,
{
	fn send(&mut self, message: Value) -> TransportFuture<'_> {
		Box::pin(async move { write_frame(&mut self.stdin, &message).await })
	}
}

/// Reading half of a [`PipeTransport`].
pub struct PipeTransportReceiver<R> {
	stdout: R,
	message_tx: mpsc::UnboundedSender<Value>,
}

impl<R> TransportReceiver for PipeTransportReceiver<R>
where
	R: AsyncRead + Unpin + Send + 'static,
{
	fn run(mut self: Box<Self>) -> TransportFuture<'static> {
		Box::pin(async move { read_frames(&mut self.stdout, &self.message_tx).await })
	}
}

async fn write_frame<W>(writer: &mut W, message: &Value) -> Result<()>
where
	W: AsyncWrite + Unpin,
{
	let mut bytes = Vec::new();
	rmpv::encode::write_value(&mut bytes, message).map_err(|e| Error::ProtocolError(format!("failed to encode frame: {e}")))?;

	writer.write_all(&bytes).await?;
	writer.flush().await?;
	Ok(())
}

async fn read_frames<R>(reader: &mut R, message_tx: &mpsc::UnboundedSender<Value>) -> Result<()>
where
	R: AsyncRead + Unpin,
{
	let mut buffer = Vec::with_capacity(READ_CHUNK);
	let mut chunk = vec![0u8; READ_CHUNK];

	loop {
		while let Some(message) = take_frame(&mut buffer)? {
			if message_tx.send(message).is_err() {
				tracing::debug!(target = "vimhost.rpc", "message receiver dropped; stopping transport reader");
				return Ok(());
			}
		}

		if buffer.len() > MAX_FRAME_LEN {
			return Err(Error::ProtocolError(format!("frame exceeds limit of {MAX_FRAME_LEN} bytes")));
		}

		let read = reader
			.read(&mut chunk)
			.await
			.map_err(|e| Error::TransportError(format!("Failed to read frame: {e}")))?;
		if read == 0 {
			if buffer.is_empty() {
				return Ok(());
			}
			return Err(Error::TransportError(format!("stream ended inside a frame ({} bytes pending)", buffer.len())));
		}
		buffer.extend_from_slice(&chunk[..read]);
	}
}

/// Decodes one complete value from the front of `buffer`, if there is one.
fn take_frame(buffer: &mut Vec<u8>) -> Result<Option<Value>> {
	let mut cursor = std::io::Cursor::new(buffer.as_slice());
	match rmpv::decode::read_value(&mut cursor) {
		Ok(value) => {
			let consumed = cursor.position() as usize;
			buffer.drain(..consumed);
			Ok(Some(value))
		}
		Err(rmpv::decode::Error::InvalidMarkerRead(e) | rmpv::decode::Error::InvalidDataRead(e))
			if e.kind() == std::io::ErrorKind::UnexpectedEof =>
		{
			Ok(None)
		}
		Err(e) => Err(Error::Decode(e)),
	}
}
