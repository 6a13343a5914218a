//! Terminal output: notices on stderr, results as JSON on stdout.

use std::io::Write;

use serde::Serialize;
use vimhost::{Notice, NoticeLevel, Notifier};

/// Prints notices to stderr as `vimhost: <level>: <message>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrNotifier;

impl Notifier for StderrNotifier {
	fn notify(&self, notice: Notice) {
		let _ = writeln!(std::io::stderr().lock(), "{}", format_notice(&notice));
	}
}

pub fn format_notice(notice: &Notice) -> String {
	let level = match notice.level {
		NoticeLevel::Info => "info",
		NoticeLevel::Warning => "warning",
		NoticeLevel::Error => "error",
	};
	format!("vimhost: {level}: {}", notice.message)
}

/// Pretty-prints `value` to stdout.
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
	let json = serde_json::to_string_pretty(value)?;
	let mut stdout = std::io::stdout().lock();
	writeln!(stdout, "{json}")?;
	Ok(())
}
