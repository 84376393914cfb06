//! Run command - interview the operator, then provision this host

use anyhow::Result;
use colored::Colorize;

use provision::{
    ChecklistReporter, Collected, ConfigCollector, ConfigSync, EXIT_OK, ExecutionReport,
    MarkerStore, Orchestrator, Plan,
};

use crate::Context as AppContext;
use crate::checklist::{JsonChecklist, TerminalChecklist};
use crate::config::Settings;
use crate::fetch::HttpFetcher;
use crate::host::HostSystem;
use crate::precondition;
use crate::prompt::DialoguerPrompter;
use crate::ui;

/// Returns the process exit status
pub fn run(ctx: &AppContext) -> Result<u8> {
    let mut reporter: Box<dyn ChecklistReporter> = if ctx.json {
        Box::new(JsonChecklist::stdout())
    } else {
        Box::new(TerminalChecklist::new())
    };

    if let Err(e) = precondition::check() {
        log::error!("{e}");
        let report = ExecutionReport::insufficient_privilege();
        reporter.on_final_report(&report);
        return Ok(report.exit_code());
    }

    let (settings, source) = Settings::load(ctx.config.as_deref())?;
    match &source {
        Some(path) => log::info!("Loaded settings from {}", path.display()),
        None => log::info!("Using built-in settings"),
    }

    if !ctx.json && !ctx.quiet {
        ui::header("hostprep - first-boot provisioning");
        println!();
    }

    let host = HostSystem::new(settings.hosts_file(), settings.sudo_group.clone());
    let mut prompter = DialoguerPrompter::new();
    let plan = match ConfigCollector::new(&mut prompter, &host).collect()? {
        Collected::Cancelled => {
            let report = ExecutionReport::cancelled();
            reporter.on_final_report(&report);
            return Ok(report.exit_code());
        }
        Collected::Confirmed(plan) => plan,
    };

    if !ctx.json {
        show_plan(&plan);
    }

    let fetcher = HttpFetcher::new(settings.fetch_timeout());
    let sync = ConfigSync::new(
        &fetcher,
        settings.hardening_url.clone(),
        settings.hardening_path(),
    );
    let markers = MarkerStore::new(settings.state_dir());
    let orchestrator = Orchestrator::new(settings.step_settings(), &host, &markers, &sync);

    let report = orchestrator.run(&plan, reporter.as_mut());

    if report.exit_code() == EXIT_OK && plan.reboot && !ctx.json {
        println!();
        println!(
            "  {} {}",
            "Note:".yellow(),
            format!(
                "the host reboots in {} minute(s); run 'shutdown -c' to cancel",
                settings.reboot_delay_minutes
            )
            .dimmed()
        );
    }

    Ok(report.exit_code())
}

fn show_plan(plan: &Plan) {
    ui::section("Plan");
    for (label, value) in plan.summary() {
        ui::kv(label, &value);
    }
    println!();
}
