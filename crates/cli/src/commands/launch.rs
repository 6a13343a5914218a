use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, info};
use vimhost::{Config, LaunchOutcome, Phase, ProbeOutcome, Supervisor};

use crate::output::StderrNotifier;

/// Launches Neovim and stays attached until it exits or Ctrl-C closes it.
pub async fn execute(config: &Config) -> anyhow::Result<ExitCode> {
	let supervisor = Supervisor::new(config, Arc::new(StderrNotifier));
	debug!(target = "vimhost", status = ?supervisor.status(), "launching");

	let liveness = match supervisor.launch().await {
		LaunchOutcome::Started { pid, liveness } => {
			info!(target = "vimhost", pid, "spawned");
			liveness
		}
		LaunchOutcome::AlreadyRunning { pid } => {
			debug!(target = "vimhost", ?pid, "already running");
			return Ok(ExitCode::SUCCESS);
		}
		// Already reported through the notifier.
		LaunchOutcome::Failed(_) => return Ok(ExitCode::FAILURE),
	};

	match liveness.await.context("liveness probe task panicked")? {
		ProbeOutcome::Connected => {
			let buffers = supervisor.sessions().list_buffers().await;
			info!(target = "vimhost", buffers = buffers.len(), "Neovim is answering");
		}
		ProbeOutcome::Unconfirmed => debug!(target = "vimhost", "liveness unconfirmed; supervising anyway"),
		ProbeOutcome::Failed(_) => return Ok(ExitCode::FAILURE),
		ProbeOutcome::Gone => debug!(target = "vimhost", "Neovim exited before the probe"),
	}

	let mut phase = supervisor.subscribe();
	tokio::select! {
		result = async { phase.wait_for(|p| *p == Phase::Idle).await.map(|_| ()) } => {
			result.context("supervisor dropped")?;
			debug!(target = "vimhost", "Neovim is gone");
		}
		signal = tokio::signal::ctrl_c() => {
			signal.context("failed to listen for Ctrl-C")?;
			info!(target = "vimhost", "interrupted, closing Neovim");
			supervisor.sessions().close().await;
		}
	}

	Ok(ExitCode::SUCCESS)
}
