use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::debug;
use vimhost::{Config, OpenOutcome, OpenRequest, Router, resolve};

use crate::output::StderrNotifier;

/// Sends `file` to the Neovim listening on the configured address.
pub async fn execute(config: &Config, file: PathBuf, base: Option<PathBuf>) -> anyhow::Result<ExitCode> {
	let search_paths = vimhost::resolver::default_search_paths(&config.search_paths);
	let target = resolve(config.nvim_path.as_deref(), &search_paths);

	let mut router = Router::new(config, target).with_notifier(Arc::new(StderrNotifier));
	if let Some(base) = base {
		router = router.with_base_dir(base);
	}

	let request = OpenRequest::from_path(file, &config.composite_marker);
	let outcome = router.open_file(&request).await;
	debug!(target = "vimhost.router", ?outcome, "open finished");

	match outcome {
		OpenOutcome::Opened => Ok(ExitCode::SUCCESS),
		OpenOutcome::Skipped => anyhow::bail!(
			"{} is not a supported file type ({})",
			request.path.display(),
			config.supported_file_types.join(", ")
		),
		OpenOutcome::NoInstance | OpenOutcome::Unconfigured(_) | OpenOutcome::Failed(_) => Ok(ExitCode::FAILURE),
	}
}
