//! One-shot external commands.

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;

use tokio::process::Command;

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
	pub program: PathBuf,
	pub args: Vec<String>,
}

impl CommandSpec {
	pub fn new(program: impl Into<PathBuf>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
		Self {
			program: program.into(),
			args: args.into_iter().map(Into::into).collect(),
		}
	}
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
	/// Exit code; `None` when killed by a signal.
	pub code: Option<i32>,
	pub stdout: String,
	pub stderr: String,
}

impl CommandOutput {
	pub fn success(&self) -> bool {
		self.code == Some(0)
	}
}

pub type CommandFuture = Pin<Box<dyn Future<Output = io::Result<CommandOutput>> + Send>>;

/// Runs a command to completion, capturing its output.
pub trait CommandRunner: Send + Sync {
	fn run(&self, spec: CommandSpec) -> CommandFuture;
}

/// Runs commands as child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
	fn run(&self, spec: CommandSpec) -> CommandFuture {
		Box::pin(async move {
			let output = Command::new(&spec.program)
				.args(&spec.args)
				.stdin(Stdio::null())
				.stdout(Stdio::piped())
				.stderr(Stdio::piped())
				.output()
				.await?;
			Ok(CommandOutput {
				code: output.status.code(),
				stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
				stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
			})
		})
	}
}
