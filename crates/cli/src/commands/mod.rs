mod inspect;
mod launch;
mod open;

use std::process::ExitCode;

use anyhow::Context;
use tracing::debug;
use vimhost::{Config, ListenAddress};

use crate::cli::{Cli, Commands};

pub async fn dispatch(cli: Cli) -> anyhow::Result<ExitCode> {
	let config = load_config(&cli)?;

	match cli.command {
		Commands::Launch => launch::execute(&config).await,
		Commands::Open { file, base } => open::execute(&config, file, base).await,
		Commands::Plan => inspect::plan(&config),
		Commands::Resolve => inspect::resolve(&config),
	}
}

/// Loads the config file and applies command-line overrides on top.
pub fn load_config(cli: &Cli) -> anyhow::Result<Config> {
	let mut config = Config::load(cli.config.as_deref()).context("failed to load config")?;

	if let Some(nvim) = &cli.nvim {
		config.nvim_path = Some(nvim.clone());
	}
	if let Some(terminal) = &cli.terminal {
		config.terminal = Some(terminal.clone());
	}
	if let Some(listen) = &cli.listen {
		config.listen_address = ListenAddress::parse(listen).with_context(|| format!("invalid --listen {listen:?}"))?;
	}

	debug!(
		target = "vimhost.config",
		listen = %config.listen_address,
		terminal = ?config.terminal,
		nvim = ?config.nvim_path,
		"config loaded"
	);
	Ok(config)
}
