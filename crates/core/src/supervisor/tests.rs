use std::sync::atomic::Ordering;

use super::*;
use crate::notice::NoticeLog;
use crate::session::CloseOutcome;
use crate::testing::{EvalBehavior, FakeClient, FakeFactory, fast_config, supervisor_with};

async fn wait_for_phase(supervisor: &Supervisor, phase: Phase) {
	let mut rx = supervisor.subscribe();
	tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|p| *p == phase))
		.await
		.expect("phase change timed out")
		.expect("phase channel closed");
}

#[tokio::test]
async fn launch_without_target_is_a_configuration_error() {
	let log = NoticeLog::new();
	let supervisor = Supervisor::builder(&fast_config())
		.target(BinaryLocation::unresolved("could not find `nvim`"))
		.terminal(Some(PathBuf::from("/usr/bin/alacritty")))
		.notifier(Arc::new(log.clone()))
		.build();

	let outcome = supervisor.launch().await;
	assert!(matches!(
		outcome,
		LaunchOutcome::Failed(Error::Configuration(ConfigurationError::TargetUnresolved(_)))
	));
	assert_eq!(supervisor.phase(), Phase::Idle);
	assert!(log.contains("could not find `nvim`"));
}

#[tokio::test]
async fn launch_without_terminal_is_a_configuration_error() {
	let log = NoticeLog::new();
	let config = Config {
		terminal: Some("no-such-terminal".into()),
		..fast_config()
	};
	let supervisor = supervisor_with(&config, None, Arc::new(FakeFactory::default()), &log);

	let outcome = supervisor.launch().await;
	match outcome {
		LaunchOutcome::Failed(Error::Configuration(ConfigurationError::TerminalUnresolved(name))) => {
			assert_eq!(name, "no-such-terminal");
		}
		other => panic!("unexpected outcome: {other:?}"),
	}
	assert_eq!(supervisor.phase(), Phase::Idle);
	assert_eq!(log.entries().len(), 1);
}

#[test]
fn status_reports_resolution() {
	let supervisor = supervisor_with(
		&fast_config(),
		Some(PathBuf::from("/usr/bin/kitty")),
		Arc::new(FakeFactory::default()),
		&NoticeLog::new(),
	);
	let status = supervisor.status();
	assert_eq!(status.phase, Phase::Idle);
	assert_eq!(status.pid, None);
	assert!(!status.session_attached);
	assert_eq!(status.target.version.as_deref(), Some("manual"));

	let json = serde_json::to_value(&status).unwrap();
	assert_eq!(json["phase"], "idle");
	assert_eq!(json["listenAddress"], "127.0.0.1:2006");
}

#[test]
fn plan_uses_resolved_binaries() {
	let supervisor = supervisor_with(
		&fast_config(),
		Some(PathBuf::from("/usr/bin/kitty")),
		Arc::new(FakeFactory::default()),
		&NoticeLog::new(),
	);
	let plan = supervisor.plan().unwrap();
	assert_eq!(plan.executable, PathBuf::from("/usr/bin/kitty"));
	assert_eq!(plan.args, vec!["-e", "/opt/nvim/bin/nvim", "--listen", "127.0.0.1:2006"]);
	assert_eq!(plan.shell, Some(PathBuf::from("/bin/sh")));
}

#[cfg(unix)]
mod unix {
	use serde_json::Value;

	use super::*;
	use crate::testing::script;

	struct Fixture {
		_dir: tempfile::TempDir,
		supervisor: Supervisor,
		factory: Arc<FakeFactory>,
		client: Arc<FakeClient>,
		log: NoticeLog,
	}

	fn fixture(config: Config, body: &str, eval: EvalBehavior) -> Fixture {
		let dir = tempfile::tempdir().unwrap();
		let terminal = script(dir.path(), "term", body);
		let client = Arc::new(FakeClient::new(eval));
		let factory = Arc::new(FakeFactory::with_client(Arc::clone(&client)));
		let log = NoticeLog::new();
		let supervisor = supervisor_with(&config, Some(terminal), Arc::clone(&factory), &log);
		Fixture {
			_dir: dir,
			supervisor,
			factory,
			client,
			log,
		}
	}

	fn started(outcome: LaunchOutcome) -> (u32, JoinHandle<ProbeOutcome>) {
		match outcome {
			LaunchOutcome::Started { pid, liveness } => (pid, liveness),
			other => panic!("expected launch to start, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn launch_probe_and_close() {
		let fx = fixture(fast_config(), "exec sleep 30", EvalBehavior::Answer);

		let (pid, liveness) = started(fx.supervisor.launch().await);
		assert!(pid > 0);
		assert_eq!(liveness.await.unwrap(), ProbeOutcome::Connected);

		let status = fx.supervisor.status();
		assert_eq!(status.phase, Phase::Running);
		assert_eq!(status.pid, Some(pid));
		assert!(status.session_attached);
		assert!(fx.log.contains("Neovim started"));
		assert!(fx.log.contains("Neovim connected"));

		let sessions = fx.supervisor.sessions();
		assert_eq!(sessions.list_buffers().await.len(), 2);
		assert_eq!(sessions.eval("1").await, Some(Value::from(1)));

		assert_eq!(sessions.close().await, CloseOutcome::Closed { pid });
		assert_eq!(fx.supervisor.phase(), Phase::Idle);
		assert!(!sessions.is_attached());
		assert_eq!(fx.client.quit_calls.load(Ordering::SeqCst), 1);
		assert!(fx.log.contains("Neovim closed"));

		assert_eq!(sessions.close().await, CloseOutcome::NotRunning);
		assert_eq!(fx.client.quit_calls.load(Ordering::SeqCst), 1);
		assert!(sessions.list_buffers().await.is_empty());
		assert_eq!(sessions.eval("1").await, None);
	}

	#[tokio::test]
	async fn launch_while_running_keeps_pid() {
		let fx = fixture(fast_config(), "exec sleep 30", EvalBehavior::Answer);

		let (pid, _liveness) = started(fx.supervisor.launch().await);
		let second = fx.supervisor.launch().await;
		assert!(matches!(second, LaunchOutcome::AlreadyRunning { pid: Some(p) } if p == pid));
		assert_eq!(fx.supervisor.status().pid, Some(pid));
		assert!(fx.log.contains("already running"));

		fx.supervisor.sessions().close().await;
	}

	#[tokio::test]
	async fn failed_probe_shuts_instance_down() {
		let fx = fixture(fast_config(), "exec sleep 30", EvalBehavior::Fail);

		let (_pid, liveness) = started(fx.supervisor.launch().await);
		match liveness.await.unwrap() {
			ProbeOutcome::Failed(reason) => assert!(reason.contains("E492")),
			other => panic!("unexpected probe outcome: {other:?}"),
		}
		assert_eq!(fx.supervisor.phase(), Phase::Idle);
		assert!(!fx.supervisor.sessions().is_attached());
		assert_eq!(fx.client.quit_calls.load(Ordering::SeqCst), 1);
		assert!(fx.log.contains("did not respond"));
	}

	#[tokio::test]
	async fn unanswered_liveness_eval_leaves_instance_running() {
		let fx = fixture(fast_config(), "exec sleep 30", EvalBehavior::Hang);

		let (pid, liveness) = started(fx.supervisor.launch().await);
		assert_eq!(liveness.await.unwrap(), ProbeOutcome::Unconfirmed);

		assert_eq!(fx.supervisor.phase(), Phase::Running);
		assert_eq!(fx.supervisor.status().pid, Some(pid));
		assert!(fx.supervisor.sessions().is_attached());
		assert_eq!(fx.client.quit_calls.load(Ordering::SeqCst), 0);
		assert!(fx.log.contains("did not answer within 200 ms"));
		assert!(!fx.log.contains("did not respond"));

		fx.supervisor.sessions().close().await;
	}

	#[tokio::test]
	async fn silent_pipe_session_stays_running() {
		let dir = tempfile::tempdir().unwrap();
		let terminal = script(dir.path(), "term", "exec sleep 30");
		let log = NoticeLog::new();
		let supervisor = Supervisor::builder(&fast_config())
			.target(BinaryLocation::manual("/opt/nvim/bin/nvim"))
			.terminal(Some(terminal))
			.notifier(Arc::new(log.clone()))
			.build();

		let (pid, liveness) = started(supervisor.launch().await);
		assert_eq!(liveness.await.unwrap(), ProbeOutcome::Unconfirmed);
		assert_eq!(supervisor.phase(), Phase::Running);
		assert_eq!(supervisor.status().pid, Some(pid));

		assert_eq!(supervisor.sessions().close().await, CloseOutcome::Closed { pid });
		assert_eq!(supervisor.phase(), Phase::Idle);
	}

	#[tokio::test]
	async fn process_exit_clears_state() {
		let config = Config {
			liveness_grace_ms: 5_000,
			..fast_config()
		};
		let fx = fixture(config, "exit 3", EvalBehavior::Answer);

		let (_pid, _liveness) = started(fx.supervisor.launch().await);
		wait_for_phase(&fx.supervisor, Phase::Idle).await;

		assert!(!fx.supervisor.sessions().is_attached());
		assert_eq!(fx.supervisor.status().pid, None);
		assert!(fx.log.contains("exited with code 3"));
		// Exit and close both fired; only the first was reported.
		assert_eq!(fx.log.messages().iter().filter(|m| m.contains("exited") || m.contains("closed")).count(), 1);
	}

	#[tokio::test]
	async fn disconnect_clears_state_and_allows_relaunch() {
		let config = Config {
			liveness_grace_ms: 5_000,
			..fast_config()
		};
		let fx = fixture(config, "exec sleep 30", EvalBehavior::Answer);

		let (first, _liveness) = started(fx.supervisor.launch().await);
		fx.factory.disconnect_latest();
		wait_for_phase(&fx.supervisor, Phase::Idle).await;
		assert!(fx.log.contains("disconnected"));

		let (second, _liveness) = started(fx.supervisor.launch().await);
		assert_ne!(first, second);
		assert_eq!(fx.supervisor.phase(), Phase::Running);

		fx.supervisor.sessions().close().await;
	}

	#[tokio::test]
	async fn spawn_failure_leaves_state_untouched() {
		let config = Config {
			login_shell: Some(PathBuf::from("/nonexistent/bin/zsh")),
			..fast_config()
		};
		let fx = fixture(config, "exec sleep 30", EvalBehavior::Answer);

		for _ in 0..2 {
			let outcome = fx.supervisor.launch().await;
			assert!(
				matches!(outcome, LaunchOutcome::Failed(Error::Spawn(SpawnError::NotFound { .. }))),
				"{outcome:?}"
			);
			assert_eq!(fx.supervisor.phase(), Phase::Idle);
			assert!(!fx.supervisor.sessions().is_attached());
		}
		assert!(fx.log.contains("/nonexistent/bin/zsh"));
	}

	#[tokio::test]
	async fn attach_failure_returns_to_idle() {
		let dir = tempfile::tempdir().unwrap();
		let terminal = script(dir.path(), "term", "exec sleep 30");
		let log = NoticeLog::new();
		let supervisor = supervisor_with(&fast_config(), Some(terminal), Arc::new(FakeFactory::failing()), &log);

		let outcome = supervisor.launch().await;
		assert!(matches!(outcome, LaunchOutcome::Failed(Error::Attach(_))), "{outcome:?}");
		assert_eq!(supervisor.phase(), Phase::Idle);
		assert!(log.contains("handshake refused"));
	}

	#[tokio::test]
	async fn list_buffers_errors_are_empty() {
		let dir = tempfile::tempdir().unwrap();
		let terminal = script(dir.path(), "term", "exec sleep 30");
		let mut client = FakeClient::new(EvalBehavior::Answer);
		client.fail_buffers = true;
		let factory = Arc::new(FakeFactory::with_client(Arc::new(client)));
		let supervisor = supervisor_with(&fast_config(), Some(terminal), factory, &NoticeLog::new());

		let _ = started(supervisor.launch().await);
		assert!(supervisor.sessions().list_buffers().await.is_empty());
		supervisor.sessions().close().await;
	}
}
