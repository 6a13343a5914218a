use std::path::PathBuf;

use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "vimhost")]
#[command(about = "Launch Neovim in a terminal and route files to it")]
#[command(version)]
#[command(styles = help_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Config file (defaults to <config dir>/vimhost/config.json)
	#[arg(long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Neovim executable, skipping discovery
	#[arg(long, global = true, value_name = "PATH")]
	pub nvim: Option<PathBuf>,

	/// Terminal emulator name or path
	#[arg(long, global = true, value_name = "NAME")]
	pub terminal: Option<String>,

	/// Address Neovim listens on (host:port)
	#[arg(long, global = true, value_name = "ADDR")]
	pub listen: Option<String>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Launch Neovim in a terminal and supervise it until it exits or Ctrl-C
	Launch,

	/// Open a file in a running Neovim
	Open {
		/// File to open; relative paths resolve against the base directory
		file: PathBuf,

		/// Base directory for relative paths
		#[arg(long, value_name = "DIR")]
		base: Option<PathBuf>,
	},

	/// Print the launch plan for this platform as JSON
	Plan,

	/// Print where Neovim and the terminal were found as JSON
	Resolve,
}

/// Green headers and cyan literals, as cargo does.
fn help_styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Green.on_default().bold())
		.usage(AnsiColor::Green.on_default().bold())
		.literal(AnsiColor::Cyan.on_default())
		.placeholder(AnsiColor::Cyan.on_default())
}
