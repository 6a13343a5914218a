//! vimhost - launch, supervise and remote-control Neovim
//!
//! # Components
//!
//! - [`resolver`]: finds the Neovim and terminal executables
//! - [`planner`]: builds the per-platform terminal command line
//! - [`Supervisor`]: owns the spawned process, its lifecycle and liveness probe
//! - [`SessionManager`]: buffer/eval calls and orderly shutdown of the owned instance
//! - [`Router`]: sends file-open requests to an owned or independently running instance
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use vimhost::{Config, OpenRequest, Router, Supervisor, TracingNotifier};
//!
//! let config = Config::load(None)?;
//! let notifier = Arc::new(TracingNotifier);
//! let supervisor = Supervisor::new(&config, notifier.clone());
//! supervisor.launch().await;
//!
//! let router = Router::for_supervisor(&config, &supervisor, notifier);
//! router.open_file(&OpenRequest::from_path("notes/today.md", &config.composite_marker)).await;
//! ```

pub mod address;
pub mod command;
pub mod config;
pub mod error;
pub mod notice;
pub mod planner;
pub mod resolver;
pub mod router;
pub mod session;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod testing;

pub use address::ListenAddress;
pub use command::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner};
pub use config::Config;
pub use error::{ConfigurationError, Error, RemoteOpenFailure, Result, SpawnError};
pub use notice::{Notice, NoticeLevel, NoticeLog, Notifier, TracingNotifier};
pub use planner::{LaunchPlan, PlanRequest, Platform, TerminalFamily, plan};
pub use resolver::{BinaryLocation, resolve, resolve_terminal};
pub use router::{OpenOutcome, OpenRequest, Router};
pub use session::{Attachment, CloseOutcome, PipeSessionFactory, SessionFactory, SessionManager};
pub use supervisor::{InstanceView, LaunchOutcome, LifecycleEvent, Phase, ProbeOutcome, Status, Supervisor, SupervisorBuilder};
