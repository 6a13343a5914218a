//! msgpack-RPC request, response and notification frames.
//!
//! On the wire each frame is a msgpack array whose first element is its kind:
//!
//! - request: `[0, msgid, method, params]`
//! - response: `[1, msgid, error, result]`
//! - notification: `[2, method, params]`

use rmpv::Value as Msgpack;
use serde_json::Value;

use crate::value::{text, to_json, to_msgpack};

/// Method names understood by the editor side of the channel.
pub mod methods {
	/// Evaluate an expression and return its value.
	pub const EVAL: &str = "nvim_eval";
	/// List loaded buffers.
	pub const LIST_BUFS: &str = "nvim_list_bufs";
	/// Execute an Ex command (used for `qa!`).
	pub const COMMAND: &str = "nvim_command";
}

/// Frame kind tags.
pub const REQUEST: u64 = 0;
pub const RESPONSE: u64 = 1;
pub const NOTIFICATION: u64 = 2;

/// Method call sent to the editor.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
	/// Correlation id, unique per connection.
	pub id: u32,
	/// Method to invoke.
	pub method: String,
	/// Positional parameters.
	pub params: Vec<Value>,
}

impl Request {
	pub fn new(id: u32, method: impl Into<String>, params: Vec<Value>) -> Self {
		Self {
			id,
			method: method.into(),
			params,
		}
	}

	/// Encodes as `[0, id, method, params]`.
	pub fn to_value(&self) -> Msgpack {
		Msgpack::Array(vec![
			Msgpack::from(REQUEST),
			Msgpack::from(self.id),
			Msgpack::from(self.method.as_str()),
			Msgpack::Array(self.params.iter().map(to_msgpack).collect()),
		])
	}
}

/// Error payload returned by the editor for a failed request.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteError {
	/// Human-readable message.
	pub message: String,
	/// Editor error type (0 = exception, 1 = validation), when provided.
	pub code: Option<i64>,
}

impl RemoteError {
	/// Decodes the error slot of a response; `None` for nil.
	///
	/// Neovim sends `[type, message]`; a bare string is accepted too.
	fn from_value(value: Msgpack) -> Option<Self> {
		match value {
			Msgpack::Nil => None,
			Msgpack::Array(parts) => Some(match <[Msgpack; 2]>::try_from(parts) {
				Ok([code, message]) => Self {
					code: code.as_i64(),
					message: text(message),
				},
				Err(parts) => Self {
					message: to_json(Msgpack::Array(parts)).to_string(),
					code: None,
				},
			}),
			other => Some(Self {
				message: text(other),
				code: None,
			}),
		}
	}
}

/// Answer to a [`Request`].
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
	/// Id of the request this answers.
	pub id: u32,
	/// Success value; `None` when the editor returned nil.
	pub result: Option<Value>,
	/// Failure payload; takes precedence over `result`.
	pub error: Option<RemoteError>,
}

/// Unsolicited event from the editor.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
	pub method: String,
	pub params: Vec<Value>,
}

/// Any frame read from the channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
	Response(Response),
	Notification(Notification),
	/// Requests from the editor and malformed frames, kept for logging.
	Unknown(Msgpack),
}

impl Message {
	/// Classifies one decoded msgpack value.
	pub fn from_value(value: Msgpack) -> Self {
		match value {
			Msgpack::Array(items) => Self::from_items(items),
			other => Self::Unknown(other),
		}
	}

	fn from_items(items: Vec<Msgpack>) -> Self {
		let kind = items.first().and_then(Msgpack::as_u64);
		let id = items.get(1).and_then(Msgpack::as_u64).and_then(|id| u32::try_from(id).ok());

		match kind {
			Some(RESPONSE) => match (id, <[Msgpack; 4]>::try_from(items)) {
				(Some(id), Ok([_, _, error, result])) => Self::Response(Response {
					id,
					error: RemoteError::from_value(error),
					result: (!result.is_nil()).then(|| to_json(result)),
				}),
				(_, Ok(items)) => Self::Unknown(Msgpack::Array(items.into())),
				(_, Err(items)) => Self::Unknown(Msgpack::Array(items)),
			},
			Some(NOTIFICATION) => match <[Msgpack; 3]>::try_from(items) {
				Ok([_, method @ Msgpack::String(_), Msgpack::Array(params)]) => Self::Notification(Notification {
					method: text(method),
					params: params.into_iter().map(to_json).collect(),
				}),
				Ok(items) => Self::Unknown(Msgpack::Array(items.into())),
				Err(items) => Self::Unknown(Msgpack::Array(items)),
			},
			_ => Self::Unknown(Msgpack::Array(items)),
		}
	}
}
