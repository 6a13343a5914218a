//! Deterministic command-line quoting.

/// Quotes `value` for a POSIX `sh -c` line.
pub fn sh_quote(value: &str) -> String {
	let safe = !value.is_empty()
		&& value
			.chars()
			.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':' | '=' | '@' | ',' | '+' | '%'));
	if safe {
		value.to_string()
	} else {
		format!("'{}'", value.replace('\'', r"'\''"))
	}
}

/// Quotes `value` following the MSVC argv rules used by `CommandLineToArgvW`.
pub fn win_quote(value: &str) -> String {
	if !value.is_empty() && !value.contains([' ', '\t', '"']) {
		return value.to_string();
	}

	let mut quoted = String::with_capacity(value.len() + 2);
	quoted.push('"');
	let mut backslashes = 0usize;
	for c in value.chars() {
		match c {
			'\\' => backslashes += 1,
			'"' => {
				quoted.extend(std::iter::repeat_n('\\', backslashes * 2 + 1));
				quoted.push('"');
				backslashes = 0;
			}
			_ => {
				quoted.extend(std::iter::repeat_n('\\', backslashes));
				quoted.push(c);
				backslashes = 0;
			}
		}
	}
	quoted.extend(std::iter::repeat_n('\\', backslashes * 2));
	quoted.push('"');
	quoted
}

/// Quotes `value` as a PowerShell single-quoted literal.
pub fn ps_single_quote(value: &str) -> String {
	format!("'{}'", value.replace('\'', "''"))
}
