//! Launch argument construction.
//!
//! [`plan`] is a pure function: everything it needs (login shell, working
//! directory, API key) comes in through [`PlanRequest`], and the resulting
//! [`LaunchPlan`] fully determines the spawned command line.
//!
//! | Platform | Terminal | Arguments |
//! |---|---|---|
//! | Unix | any | `-e <nvim> --listen <addr>` through the login shell |
//! | Windows | Alacritty, WezTerm, Kitty | `-e <nvim> --listen <addr>` |
//! | Windows | Windows Terminal | `new-tab --title Neovim <nvim> --listen <addr>` |
//! | Windows | PowerShell | `-Command "Start-Process ..."` through the shell |
//! | Windows | cmd | `/c start "Neovim" <nvim> --listen <addr>` through the shell |
//! | Windows | anything else | `-e` form, flagged as a fallback |

mod family;
mod quote;


use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Serialize;
use tokio::process::Command;

pub use family::{Platform, TerminalFamily};
pub use quote::{ps_single_quote, sh_quote, win_quote};

use crate::address::ListenAddress;

/// Environment variable carrying the REST API key into the editor.
pub const API_KEY_ENV: &str = "OBSIDIAN_REST_API_KEY";

/// Window and tab title used where the terminal accepts one.
pub const WINDOW_TITLE: &str = "Neovim";

const DEFAULT_UNIX_SHELL: &str = "/bin/sh";
const DEFAULT_WINDOWS_SHELL: &str = "cmd.exe";

/// Inputs to [`plan`].
#[derive(Debug, Clone, Copy)]
pub struct PlanRequest<'a> {
	pub terminal: &'a Path,
	pub target: &'a Path,
	pub listen: &'a ListenAddress,
	pub platform: Platform,
	/// Shell used when the plan runs through one; the platform default when `None`.
	pub login_shell: Option<&'a Path>,
	pub working_dir: Option<&'a Path>,
	pub api_key: Option<&'a str>,
}

/// Exact spawn configuration for one launch attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchPlan {
	pub executable: PathBuf,
	pub args: Vec<String>,
	pub use_shell: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub shell: Option<PathBuf>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub working_dir: Option<PathBuf>,
	pub env: BTreeMap<String, String>,
	pub platform: Platform,
	pub family: TerminalFamily,
	/// Set when an unrecognized Windows terminal got the generic form.
	pub fallback: bool,
}

/// Builds the launch plan for `request`.
pub fn plan(request: &PlanRequest<'_>) -> LaunchPlan {
	let family = TerminalFamily::classify(request.terminal);
	let target = request.target.to_string_lossy().into_owned();
	let listen = request.listen.as_str().to_string();

	let exec_form = || vec!["-e".to_string(), target.clone(), "--listen".to_string(), listen.clone()];

	let (args, use_shell, fallback) = match request.platform {
		Platform::Unix => (exec_form(), true, false),
		Platform::Windows => match family {
			f if f.is_gpu() => (exec_form(), false, false),
			TerminalFamily::WindowsTerminal => (
				vec![
					"new-tab".into(),
					"--title".into(),
					WINDOW_TITLE.into(),
					target.clone(),
					"--listen".into(),
					listen.clone(),
				],
				false,
				false,
			),
			TerminalFamily::WindowsPowerShell | TerminalFamily::Pwsh => {
				let script = format!(
					"Start-Process -FilePath {} -ArgumentList {},{} -WindowStyle Normal",
					ps_single_quote(&target),
					ps_single_quote("--listen"),
					ps_single_quote(&listen),
				);
				(
					vec![
						"-NoProfile".into(),
						"-ExecutionPolicy".into(),
						"Bypass".into(),
						"-Command".into(),
						script,
					],
					true,
					false,
				)
			}
			TerminalFamily::Cmd => (
				vec![
					"/c".into(),
					"start".into(),
					format!("\"{WINDOW_TITLE}\""),
					target.clone(),
					"--listen".into(),
					listen.clone(),
				],
				true,
				false,
			),
			_ => (exec_form(), false, true),
		},
	};

	let mut env = BTreeMap::new();
	if let Some(key) = request.api_key.filter(|k| !k.is_empty()) {
		env.insert(API_KEY_ENV.to_string(), key.to_string());
	}

	LaunchPlan {
		executable: request.terminal.to_path_buf(),
		args,
		use_shell,
		shell: use_shell.then(|| request.login_shell.map(Path::to_path_buf)).flatten(),
		working_dir: request.working_dir.map(Path::to_path_buf),
		env,
		platform: request.platform,
		family,
		fallback,
	}
}

impl LaunchPlan {
	/// The terminal invocation as one quoted line.
	///
	/// Arguments that already carry their own quoting (the `cmd` window title)
	/// are passed through unchanged on Windows.
	pub fn command_line(&self) -> String {
		let exe = self.executable.to_string_lossy();
		let mut parts = Vec::with_capacity(self.args.len() + 1);
		match self.platform {
			Platform::Unix => {
				parts.push(sh_quote(&exe));
				parts.extend(self.args.iter().map(|a| sh_quote(a)));
			}
			Platform::Windows => {
				parts.push(win_quote(&exe));
				parts.extend(self.args.iter().map(|a| {
					if a.len() >= 2 && a.starts_with('"') && a.ends_with('"') {
						a.clone()
					} else {
						win_quote(a)
					}
				}));
			}
		}
		parts.join(" ")
	}

	/// The shell that wraps the command line, if the plan uses one.
	pub fn effective_shell(&self) -> Option<PathBuf> {
		if !self.use_shell {
			return None;
		}
		Some(self.shell.clone().unwrap_or_else(|| {
			PathBuf::from(match self.platform {
				Platform::Unix => DEFAULT_UNIX_SHELL,
				Platform::Windows => DEFAULT_WINDOWS_SHELL,
			})
		}))
	}

	/// Program and argument vector actually handed to the OS.
	pub fn argv(&self) -> (PathBuf, Vec<String>) {
		match (self.effective_shell(), self.platform) {
			(Some(shell), Platform::Unix) => (shell, vec!["-c".into(), self.command_line()]),
			(Some(shell), Platform::Windows) => (
				shell,
				vec!["/d".into(), "/s".into(), "/c".into(), format!("\"{}\"", self.command_line())],
			),
			(None, _) => (self.executable.clone(), self.args.clone()),
		}
	}

	/// Builds the spawnable command with piped stdin/stdout for the control channel.
	pub fn command(&self) -> Command {
		let (program, args) = self.argv();
		let mut command = Command::new(program);

		#[cfg(windows)]
		{
			if self.use_shell {
				// cmd.exe does its own parsing of the `/c` line; pass it verbatim.
				let mut iter = args.into_iter();
				for arg in iter.by_ref().take(3) {
					command.arg(arg);
				}
				for arg in iter {
					command.raw_arg(arg);
				}
			} else {
				command.args(args);
			}
		}
		#[cfg(not(windows))]
		{
			command.args(args);
		}

		if let Some(dir) = &self.working_dir {
			command.current_dir(dir);
		}
		command
			.envs(&self.env)
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::null())
			.kill_on_drop(true);
		command
	}
}
