//! Collaborator traits
//!
//! The engine never spawns a process, opens a socket or draws on a
//! terminal. Everything with a side effect on the host or the operator goes
//! through one of these traits, so the binary can plug in real
//! implementations and tests can plug in recording ones.

use std::path::Path;

use anyhow::Result;

use crate::plan::{KeyAction, NewUser, Secret};
use crate::step::Step;
use crate::types::{ExecutionReport, StepResult};

/// Operating-system mutation primitives.
///
/// Each call is synchronous and either succeeds or returns the reason it
/// did not. Timeouts are the implementation's business.
pub trait System {
    fn install_packages(&self, packages: &[String]) -> Result<()>;

    fn regenerate_host_keys(&self) -> Result<()>;

    /// Syntax-check a configuration file before the service reloads it
    fn validate_config(&self, path: &Path) -> Result<()>;

    fn restart_service(&self, service: &str) -> Result<()>;

    /// Grow the root partition and its filesystem to fill the disk
    fn expand_root_partition(&self) -> Result<()>;

    /// Set the hostname and its loopback entry in the hosts file
    fn set_hostname(&self, hostname: &str) -> Result<()>;

    fn create_user(&self, user: &NewUser) -> Result<()>;

    fn update_authorized_keys(&self, username: &str, key_action: &KeyAction) -> Result<()>;

    fn remove_root_password(&self) -> Result<()>;

    fn set_root_password(&self, password: &Secret) -> Result<()>;

    fn reboot(&self, delay_minutes: u32) -> Result<()>;
}

/// Read-only view of the account database and host identity
pub trait Accounts {
    fn user_exists(&self, username: &str) -> bool;

    fn current_hostname(&self) -> Result<String>;
}

/// Raw retrieval of the canonical configuration document
pub trait Fetcher {
    fn fetch(&self, source: &str) -> Result<Vec<u8>>;
}

/// Interactive prompt widgets.
///
/// Validation and re-prompting live in the collector; implementations only
/// ask and return what was typed.
pub trait Prompter {
    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool>;

    /// Free text; `default` is returned for an empty answer when given
    fn input(&mut self, prompt: &str, default: Option<&str>) -> Result<String>;

    /// Masked text
    fn password(&mut self, prompt: &str) -> Result<String>;

    /// Single choice, returns the selected index
    fn select(&mut self, prompt: &str, items: &[&str], default: usize) -> Result<usize>;

    /// Tell the operator why an answer was rejected
    fn warn(&mut self, message: &str);
}

/// Observer of step execution.
///
/// Called in execution order: a start and a result per step, then the final
/// report exactly once.
pub trait ChecklistReporter {
    fn on_step_start(&mut self, step: &Step);

    fn on_step_result(&mut self, result: &StepResult);

    fn on_final_report(&mut self, report: &ExecutionReport);
}

/// Reporter that renders nothing
pub struct NoReport;

impl ChecklistReporter for NoReport {
    fn on_step_start(&mut self, _step: &Step) {}
    fn on_step_result(&mut self, _result: &StepResult) {}
    fn on_final_report(&mut self, _report: &ExecutionReport) {}
}
