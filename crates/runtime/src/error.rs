//! Error types for the control-channel runtime.

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to a supervised editor.
#[derive(Debug, Error)]
pub enum Error {
	/// Transport-level error (pipe read/write).
	#[error("Transport error: {0}")]
	TransportError(String),

	/// Protocol-level error (unexpected frame, unknown correlation id).
	#[error("Protocol error: {0}")]
	ProtocolError(String),

	/// The editor answered a request with an error payload.
	#[error("Remote error: {message}")]
	Remote {
		/// Message reported by the editor.
		message: String,
		/// Editor-specific error code, if any.
		code: Option<i64>,
	},

	/// The channel closed before a response arrived.
	#[error("Channel closed unexpectedly")]
	ChannelClosed,

	/// A frame that is not valid msgpack.
	#[error("msgpack decode error: {0}")]
	Decode(#[from] rmpv::decode::Error),

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// A result did not have the expected shape.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Returns true if the error means the peer is gone rather than misbehaving.
	pub fn is_disconnect(&self) -> bool {
		match self {
			Error::ChannelClosed => true,
			Error::Io(err) => matches!(
				err.kind(),
				std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::UnexpectedEof | std::io::ErrorKind::ConnectionReset
			),
			_ => false,
		}
	}
}
