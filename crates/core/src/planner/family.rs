use std::path::Path;

use serde::Serialize;

/// Host platform the plan targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
	Unix,
	Windows,
}

impl Platform {
	pub fn current() -> Self {
		if cfg!(windows) { Platform::Windows } else { Platform::Unix }
	}
}

/// Terminal emulators that need distinct launch arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TerminalFamily {
	Alacritty,
	WezTerm,
	Kitty,
	/// Windows Terminal (`wt.exe`).
	WindowsTerminal,
	/// Windows PowerShell 5.x (`powershell.exe`).
	WindowsPowerShell,
	/// PowerShell 7 (`pwsh.exe`).
	Pwsh,
	Cmd,
	Other,
}

impl TerminalFamily {
	/// Classifies by executable basename, ignoring case and a trailing `.exe`.
	///
	/// Both `/` and `\` are treated as separators so Windows paths classify the
	/// same on every host.
	pub fn classify(terminal: &Path) -> Self {
		let raw = terminal.to_string_lossy();
		let base = raw.rsplit(['/', '\\']).next().unwrap_or_default().to_ascii_lowercase();
		let stem = base.strip_suffix(".exe").unwrap_or(&base);

		match stem {
			"alacritty" => TerminalFamily::Alacritty,
			"wezterm" | "wezterm-gui" => TerminalFamily::WezTerm,
			"kitty" => TerminalFamily::Kitty,
			"wt" | "windowsterminal" => TerminalFamily::WindowsTerminal,
			"powershell" => TerminalFamily::WindowsPowerShell,
			"pwsh" => TerminalFamily::Pwsh,
			"cmd" => TerminalFamily::Cmd,
			_ => TerminalFamily::Other,
		}
	}

	/// GPU terminals accept the plain `-e` form on every platform.
	pub fn is_gpu(self) -> bool {
		matches!(self, TerminalFamily::Alacritty | TerminalFamily::WezTerm | TerminalFamily::Kitty)
	}
}
