//! The configured `host:port` the editor listens on.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Listen address handed to `--listen` and `--server`.
///
/// The raw string is kept verbatim for the command line. A port is extracted
/// when the text ends in `:<u16>`; anything else (a named pipe, a socket path)
/// is still a valid address but has no probe target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ListenAddress {
	raw: String,
	host: String,
	port: Option<u16>,
}

impl ListenAddress {
	pub fn parse(raw: &str) -> Result<Self, ConfigurationError> {
		let raw = raw.trim();
		if raw.is_empty() {
			return Err(ConfigurationError::EmptyListenAddress);
		}

		let (host, port) = match raw.rsplit_once(':') {
			Some((host, port)) => match port.parse::<u16>() {
				Ok(port) => (host.trim_start_matches('[').trim_end_matches(']').to_string(), Some(port)),
				Err(_) => (raw.to_string(), None),
			},
			None => (raw.to_string(), None),
		};

		Ok(Self {
			raw: raw.to_string(),
			host,
			port,
		})
	}

	pub fn as_str(&self) -> &str {
		&self.raw
	}

	pub fn host(&self) -> &str {
		&self.host
	}

	pub fn port(&self) -> Option<u16> {
		self.port
	}

	/// Loopback socket the reachability probe connects to.
	///
	/// The probe always targets localhost regardless of the configured host.
	pub fn probe_target(&self) -> Option<SocketAddr> {
		self.port.map(|port| SocketAddr::from((Ipv4Addr::LOCALHOST, port)))
	}
}

impl Default for ListenAddress {
	fn default() -> Self {
		Self {
			raw: "127.0.0.1:2006".into(),
			host: "127.0.0.1".into(),
			port: Some(2006),
		}
	}
}

impl fmt::Display for ListenAddress {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.raw)
	}
}

impl std::str::FromStr for ListenAddress {
	type Err = ConfigurationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}

impl TryFrom<String> for ListenAddress {
	type Error = ConfigurationError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::parse(&value)
	}
}

impl From<ListenAddress> for String {
	fn from(value: ListenAddress) -> Self {
		value.raw
	}
}
