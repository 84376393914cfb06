//! Sequential step execution
//!
//! Builds the step sequence from a [`Plan`] and runs it in order. Each step
//! yields exactly one [`StepResult`]; a tolerant failure is recorded and the
//! run moves on, a fatal one stops the run.

use crate::context::{ChecklistReporter, System};
use crate::guard::IdempotencyGuard;
use crate::plan::{KeyAction, Plan, RootAction};
use crate::step::{Action, Criticality, Step, StepSettings, build_steps};
use crate::sync::{ConfigSync, SyncOutcome};
use crate::types::{AbortReason, ExecutionReport, Outcome, StepResult};

/// What performing an action produced, before guard bookkeeping
type ActionOutcome = std::result::Result<String, String>;

/// Runs the provisioning steps for one plan
pub struct Orchestrator<'a> {
    settings: StepSettings,
    system: &'a dyn System,
    guard: &'a dyn IdempotencyGuard,
    sync: &'a ConfigSync<'a>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        settings: StepSettings,
        system: &'a dyn System,
        guard: &'a dyn IdempotencyGuard,
        sync: &'a ConfigSync<'a>,
    ) -> Self {
        Self {
            settings,
            system,
            guard,
            sync,
        }
    }

    /// Execute every step built from `plan`, reporting as it goes
    pub fn run(&self, plan: &Plan, reporter: &mut dyn ChecklistReporter) -> ExecutionReport {
        let steps = build_steps(plan, &self.settings);
        log::info!("Running {} provisioning steps", steps.len());

        let mut report = ExecutionReport::default();

        for step in &steps {
            reporter.on_step_start(step);
            let result = self.run_step(step, &report);
            log::info!("{}: {:?} ({})", step.id, result.status, result.detail);
            reporter.on_step_result(&result);

            let halt = !result.is_success() && step.criticality == Criticality::Fatal;
            report.results.push(result);

            if halt {
                log::warn!("Fatal step '{}' failed, stopping", step.id);
                report.outcome = Outcome::Aborted {
                    reason: AbortReason::StepFailure {
                        step_id: step.id.to_string(),
                    },
                };
                break;
            }
        }

        reporter.on_final_report(&report);
        report
    }

    fn run_step(&self, step: &Step, so_far: &ExecutionReport) -> StepResult {
        if let Some(dependency) = step
            .depends_on
            .iter()
            .find(|id| !so_far.result_for(id).is_some_and(StepResult::is_success))
        {
            return StepResult::skipped(step, format!("blocked: {dependency} did not succeed"));
        }

        if let Some(key) = step.idempotency_key
            && self.guard.is_done(key)
        {
            log::debug!("Step '{}' guarded by marker '{key}', skipping", step.id);
            return StepResult::skipped(step, format!("already done (marker '{key}')"));
        }

        log::debug!("Performing step '{}'", step.id);
        let detail = match self.perform(&step.action) {
            Ok(detail) => detail,
            Err(detail) => return StepResult::failure(step, detail),
        };

        if let Some(key) = step.idempotency_key
            && let Err(e) = self.guard.mark_done(key)
        {
            return StepResult::failure(step, format!("{detail}, but {e}"));
        }

        StepResult::success(step, detail)
    }

    fn perform(&self, action: &Action) -> ActionOutcome {
        let system = self.system;
        match action {
            Action::InstallPackages { packages } => {
                done(system.install_packages(packages), "packages installed")
            }
            Action::RegenerateHostKeys => {
                done(system.regenerate_host_keys(), "host keys regenerated")
            }
            Action::SyncHardeningConfig => self.sync_config(),
            Action::RestartService { service } => {
                done(system.restart_service(service), "service restarted")
            }
            Action::ExpandRootPartition => {
                done(system.expand_root_partition(), "root filesystem expanded")
            }
            Action::SetHostname { hostname } => {
                done(system.set_hostname(hostname), "hostname set")
            }
            Action::CreateUser(user) => done(system.create_user(user), "user created"),
            Action::UpdateUserKeys {
                username,
                key_action,
            } => {
                if matches!(key_action, KeyAction::Skip) {
                    return Ok("authorized keys left unchanged".to_string());
                }
                done(
                    system.update_authorized_keys(username, key_action),
                    "authorized keys updated",
                )
            }
            Action::ConfigureRoot(RootAction::RemovePassword) => done(
                system.remove_root_password(),
                "root password removed and locked",
            ),
            Action::ConfigureRoot(RootAction::SetPassword(password)) => {
                done(system.set_root_password(password), "root password set")
            }
            Action::Reboot { delay_minutes } => done(
                system.reboot(*delay_minutes),
                &format!("reboot scheduled in {delay_minutes} minute(s)"),
            ),
        }
    }

    fn sync_config(&self) -> ActionOutcome {
        let outcome = self.sync.apply().map_err(|e| e.to_string())?;

        let summary = match &outcome {
            SyncOutcome::Updated { backup } => {
                format!("updated, previous saved to {}", backup.display())
            }
            other => other.label().to_string(),
        };

        self.system
            .validate_config(self.sync.installed_path())
            .map_err(|e| format!("{summary} but validation failed: {e:#}"))?;

        Ok(format!("{summary}, validated"))
    }
}

fn done(result: anyhow::Result<()>, detail: &str) -> ActionOutcome {
    result.map(|()| detail.to_string()).map_err(|e| format!("{e:#}"))
}
