use std::process::ExitCode;

use clap::Parser;
use tracing::debug;
use vimhost_cli::{cli::Cli, commands, logging};

#[tokio::main]
async fn main() -> ExitCode {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	match commands::dispatch(cli).await {
		Ok(code) => code,
		Err(err) => {
			debug!(target = "vimhost", error = ?err, "command failed");
			eprintln!("error: {err:#}");
			ExitCode::FAILURE
		}
	}
}
