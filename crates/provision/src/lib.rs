//! # Provision
//!
//! One-time host provisioning engine.
//!
//! Turns a set of operator decisions into an ordered sequence of
//! independently-failable steps, remembers which destructive steps already
//! ran on this host, reconciles an installed configuration file against a
//! canonical copy, and reports each step as it finishes.
//!
//! ## Core Concepts
//!
//! - **Plan**: validated operator decisions, built by [`ConfigCollector`]
//! - **Step**: one unit of work with a criticality and an optional marker key
//! - **IdempotencyGuard**: durable markers for steps that must run once
//! - **ConfigSync**: fetch, compare, back up and replace a config file
//! - **Orchestrator**: runs the steps and produces an [`ExecutionReport`]
//!
//! Every side effect goes through a collaborator trait in [`context`]; the
//! crate itself never spawns a process or touches a terminal.
//!
//! ## Example
//!
//! ```ignore
//! use provision::{ConfigSync, MarkerStore, Orchestrator, StepSettings};
//!
//! let sync = ConfigSync::new(&fetcher, url, "/etc/ssh/sshd_config");
//! let markers = MarkerStore::new("/var/lib/hostprep");
//! let orchestrator = Orchestrator::new(StepSettings::default(), &host, &markers, &sync);
//! let report = orchestrator.run(&plan, &mut checklist);
//! std::process::exit(report.exit_code().into());
//! ```

pub mod collect;
pub mod context;
pub mod edit;
pub mod error;
pub mod guard;
pub mod orchestrator;
pub mod plan;
pub mod step;
pub mod sync;
pub mod types;

pub use collect::{ConfigCollector, validate_hostname, validate_public_key, validate_username};
pub use context::{Accounts, ChecklistReporter, Fetcher, NoReport, Prompter, System};
pub use error::{Error, Result};
pub use guard::{IdempotencyGuard, Marker, MarkerStore};
pub use orchestrator::Orchestrator;
pub use plan::{Collected, KeyAction, NewUser, Plan, RootAction, Secret, UserAction};
pub use step::{Action, Criticality, PARTITION_MARKER, Step, StepSettings, build_steps, ids};
pub use sync::{ConfigSync, SyncOutcome};
pub use types::{
    AbortReason, EXIT_ABORTED, EXIT_OK, EXIT_PRECONDITION, ExecutionReport, Outcome, StepResult,
    StepStatus,
};
