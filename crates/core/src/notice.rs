//! User-facing notifications.
//!
//! Every operation ends in exactly one notice on its failure path and one on
//! its success path. The host decides how to present them.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
	Info,
	Warning,
	Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
	pub level: NoticeLevel,
	pub message: String,
}

impl Notice {
	pub fn info(message: impl Into<String>) -> Self {
		Self {
			level: NoticeLevel::Info,
			message: message.into(),
		}
	}

	pub fn warning(message: impl Into<String>) -> Self {
		Self {
			level: NoticeLevel::Warning,
			message: message.into(),
		}
	}

	pub fn error(message: impl Into<String>) -> Self {
		Self {
			level: NoticeLevel::Error,
			message: message.into(),
		}
	}
}

/// Sink for notices raised by the supervisor and router.
pub trait Notifier: Send + Sync {
	fn notify(&self, notice: Notice);
}

/// Forwards notices to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
	fn notify(&self, notice: Notice) {
		match notice.level {
			NoticeLevel::Info => tracing::info!(target = "vimhost.notice", "{}", notice.message),
			NoticeLevel::Warning => tracing::warn!(target = "vimhost.notice", "{}", notice.message),
			NoticeLevel::Error => tracing::error!(target = "vimhost.notice", "{}", notice.message),
		}
	}
}

/// Records notices in memory.
#[derive(Debug, Default, Clone)]
pub struct NoticeLog {
	entries: Arc<Mutex<Vec<Notice>>>,
}

impl NoticeLog {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn entries(&self) -> Vec<Notice> {
		self.entries.lock().clone()
	}

	pub fn messages(&self) -> Vec<String> {
		self.entries.lock().iter().map(|n| n.message.clone()).collect()
	}

	/// Removes and returns everything recorded so far.
	pub fn drain(&self) -> Vec<Notice> {
		std::mem::take(&mut *self.entries.lock())
	}

	pub fn contains(&self, needle: &str) -> bool {
		self.entries.lock().iter().any(|n| n.message.contains(needle))
	}
}

impl Notifier for NoticeLog {
	fn notify(&self, notice: Notice) {
		tracing::trace!(target = "vimhost.notice", level = ?notice.level, message = %notice.message, "recorded notice");
		self.entries.lock().push(notice);
	}
}
