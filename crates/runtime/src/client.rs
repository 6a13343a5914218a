//! The call contract the supervisor relies on.
//!
//! [`RpcClient`] covers three calls: evaluate an expression, list buffers,
//! quit. [`Connection`] implements it over the msgpack-RPC pipe transport; tests and
//! alternative codecs can provide their own implementation.

use std::future::Future;
use std::pin::Pin;

use serde_json::{Value, json};
use vimhost_protocol::{Buffer, methods};

use crate::connection::Connection;
use crate::error::Result;

/// Boxed future returned by [`RpcClient`] methods.
pub type RpcFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Control-channel operations on a running editor.
pub trait RpcClient: Send + Sync {
	/// Evaluates `expr` in the editor and returns its value.
	fn eval(&self, expr: &str) -> RpcFuture<'_, Value>;

	/// Lists the editor's loaded buffers.
	fn list_buffers(&self) -> RpcFuture<'_, Vec<Buffer>>;

	/// Asks the editor to quit, discarding unsaved changes.
	///
	/// The editor usually exits before answering, so a closed channel counts
	/// as success.
	fn quit(&self) -> RpcFuture<'_, ()>;
}

impl RpcClient for Connection {
	fn eval(&self, expr: &str) -> RpcFuture<'_, Value> {
		let expr = expr.to_string();
		Box::pin(async move { self.send_request(methods::EVAL, vec![json!(expr)]).await })
	}

	fn list_buffers(&self) -> RpcFuture<'_, Vec<Buffer>> {
		Box::pin(async move {
			let value = self.send_request(methods::LIST_BUFS, Vec::new()).await?;
			Ok(serde_json::from_value(value)?)
		})
	}

	fn quit(&self) -> RpcFuture<'_, ()> {
		Box::pin(async move {
			match self.send_request(methods::COMMAND, vec![json!("qa!")]).await {
				Ok(_) => Ok(()),
				Err(err) if err.is_disconnect() => Ok(()),
				Err(err) => Err(err),
			}
		})
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use tokio::io::duplex;

	use super::*;
	use crate::error::Error;
	use crate::testing::FakeEditor;
	use crate::transport::PipeTransport;

	fn running_connection() -> (Arc<Connection>, FakeEditor) {
		let (editor_stdin, stdin_write) = duplex(4096);
		let (stdout_read, editor_stdout) = duplex(4096);
		let (transport, rx) = PipeTransport::new(stdin_write, stdout_read);
		let connection = Arc::new(Connection::new(transport.into_transport_parts(rx)));
		let runner = Arc::clone(&connection);
		tokio::spawn(async move { runner.run().await });
		(connection, FakeEditor::new(editor_stdin, editor_stdout))
	}

	#[tokio::test]
	async fn list_buffers_decodes_ext_handles() {
		let (connection, mut editor) = running_connection();

		let editor_task = tokio::spawn(async move {
			let request = editor.next_request().await;
			assert_eq!(request.method, methods::LIST_BUFS);
			// Buffer handles are ext type 0 on the wire.
			editor
				.write(rmpv::Value::Array(vec![
					rmpv::Value::from(1),
					rmpv::Value::from(request.id),
					rmpv::Value::Nil,
					rmpv::Value::Array(vec![rmpv::Value::Ext(0, vec![0x01]), rmpv::Value::Ext(0, vec![0x03])]),
				]))
				.await;
			editor
		});

		let buffers = connection.list_buffers().await.unwrap();
		assert_eq!(buffers.iter().map(|b| b.id).collect::<Vec<_>>(), vec![1, 3]);
		drop(editor_task.await.unwrap());
	}

	#[tokio::test]
	async fn eval_returns_the_editor_value() {
		let (connection, mut editor) = running_connection();

		let editor_task = tokio::spawn(async move {
			let request = editor.next_request().await;
			assert_eq!(request.method, methods::EVAL);
			assert_eq!(request.params, vec![json!("1")]);
			editor.reply(request.id, json!(1)).await;
			editor
		});

		assert_eq!(connection.eval("1").await.unwrap(), json!(1));
		drop(editor_task.await.unwrap());
	}

	#[tokio::test]
	async fn quit_sends_qa_and_tolerates_hangup() {
		let (connection, mut editor) = running_connection();

		let editor_task = tokio::spawn(async move {
			let request = editor.next_request().await;
			assert_eq!(request.method, methods::COMMAND);
			assert_eq!(request.params, vec![json!("qa!")]);
			// Exit without answering, as the editor does.
			drop(editor);
		});

		connection.quit().await.unwrap();
		editor_task.await.unwrap();
	}

	#[tokio::test]
	async fn eval_surfaces_remote_errors() {
		let (connection, mut editor) = running_connection();

		let editor_task = tokio::spawn(async move {
			let request = editor.next_request().await;
			editor.reply_error(request.id, "Vim:E121: Undefined variable: x").await;
			editor
		});

		let err = connection.eval("x").await.unwrap_err();
		match err {
			Error::Remote { message, code } => {
				assert_eq!(message, "Vim:E121: Undefined variable: x");
				assert_eq!(code, Some(0));
			}
			other => panic!("expected remote error, got {other}"),
		}
		drop(editor_task.await.unwrap());
	}
}
