//! `plan` and `resolve`: show what a launch would do without doing it.

use std::path::PathBuf;
use std::process::ExitCode;

use serde::Serialize;
use vimhost::planner::API_KEY_ENV;
use vimhost::resolver::{self, default_search_paths};
use vimhost::supervisor::default_terminal;
use vimhost::{BinaryLocation, Config, LaunchPlan, Supervisor, resolve_terminal};

use crate::output::print_json;

const REDACTED: &str = "<redacted>";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanReport {
	#[serde(flatten)]
	plan: LaunchPlan,
	command_line: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TerminalReport {
	name: String,
	path: Option<PathBuf>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResolveReport {
	nvim: BinaryLocation,
	terminal: TerminalReport,
	search_paths: Vec<PathBuf>,
}

/// Prints the launch plan; an unresolved terminal is planned by its bare name.
pub fn plan(config: &Config) -> anyhow::Result<ExitCode> {
	let search_paths = default_search_paths(&config.search_paths);
	let name = terminal_name(config);
	let terminal = resolve_terminal(&name, &search_paths).unwrap_or_else(|| PathBuf::from(&name));

	let supervisor = Supervisor::builder(config).terminal(Some(terminal)).build();
	let mut plan = supervisor.plan()?;
	if let Some(key) = plan.env.get_mut(API_KEY_ENV) {
		*key = REDACTED.to_string();
	}

	let command_line = plan.command_line();
	print_json(&PlanReport { plan, command_line })?;
	Ok(ExitCode::SUCCESS)
}

/// Prints where Neovim and the terminal were found.
pub fn resolve(config: &Config) -> anyhow::Result<ExitCode> {
	let search_paths = default_search_paths(&config.search_paths);
	let nvim = resolver::resolve(config.nvim_path.as_deref(), &search_paths);
	let name = terminal_name(config);
	let path = resolve_terminal(&name, &search_paths);

	let resolved = nvim.is_resolved();
	print_json(&ResolveReport {
		nvim,
		terminal: TerminalReport { name, path },
		search_paths,
	})?;
	Ok(if resolved { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn terminal_name(config: &Config) -> String {
	config.terminal.clone().unwrap_or_else(|| default_terminal().to_string())
}
