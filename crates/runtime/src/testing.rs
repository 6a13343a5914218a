//! Editor side of a duplex pipe, speaking raw msgpack-RPC.

use std::io::Cursor;

use rmpv::Value as Msgpack;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use vimhost_protocol::Request;
use vimhost_protocol::value::{to_json, to_msgpack};

pub(crate) struct FakeEditor {
	pub(crate) stdin: DuplexStream,
	pub(crate) stdout: DuplexStream,
	pending: Vec<u8>,
}

impl FakeEditor {
	pub(crate) fn new(stdin: DuplexStream, stdout: DuplexStream) -> Self {
		Self {
			stdin,
			stdout,
			pending: Vec::new(),
		}
	}

	/// Reads the next `[0, id, method, params]` frame.
	pub(crate) async fn next_request(&mut self) -> Request {
		loop {
			let mut cursor = Cursor::new(self.pending.as_slice());
			if let Ok(value) = rmpv::decode::read_value(&mut cursor) {
				let consumed = cursor.position() as usize;
				self.pending.drain(..consumed);
				return decode_request(value);
			}
			let mut chunk = [0u8; 1024];
			let read = self.stdin.read(&mut chunk).await.unwrap();
			assert!(read > 0, "client closed before sending a request");
			self.pending.extend_from_slice(&chunk[..read]);
		}
	}

	pub(crate) async fn reply(&mut self, id: u32, result: Value) {
		self.write(Msgpack::Array(vec![Msgpack::from(1), Msgpack::from(id), Msgpack::Nil, to_msgpack(&result)]))
			.await;
	}

	/// Replies with nvim's `[type, message]` error shape.
	pub(crate) async fn reply_error(&mut self, id: u32, message: &str) {
		let error = Msgpack::Array(vec![Msgpack::from(0), Msgpack::from(message)]);
		self.write(Msgpack::Array(vec![Msgpack::from(1), Msgpack::from(id), error, Msgpack::Nil]))
			.await;
	}

	pub(crate) async fn write(&mut self, value: Msgpack) {
		let mut bytes = Vec::new();
		rmpv::encode::write_value(&mut bytes, &value).unwrap();
		self.stdout.write_all(&bytes).await.unwrap();
		self.stdout.flush().await.unwrap();
	}
}

fn decode_request(value: Msgpack) -> Request {
	let Msgpack::Array(items) = value else {
		panic!("request is not an array: {value}");
	};
	assert_eq!(items.len(), 4, "request frame: {items:?}");
	assert_eq!(items[0].as_u64(), Some(0), "not a request: {items:?}");
	let id = u32::try_from(items[1].as_u64().unwrap()).unwrap();
	let method = items[2].as_str().unwrap().to_string();
	let Value::Array(params) = to_json(items[3].clone()) else {
		panic!("params are not an array: {items:?}");
	};
	Request::new(id, method, params)
}
