//! Checklist renderers
//!
//! `TerminalChecklist` draws a spinner for the running step and a marked
//! line per finished step, then a numbered summary. `JsonChecklist` stays
//! silent until the end and prints the whole report as JSON.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::time::Duration;

use provision::{
    AbortReason, ChecklistReporter, ExecutionReport, Outcome, Step, StepResult, StepStatus,
};

use crate::ui;

/// Live checklist on the terminal
#[derive(Default)]
pub struct TerminalChecklist {
    spinner: Option<ProgressBar>,
    started: usize,
}

impl TerminalChecklist {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChecklistReporter for TerminalChecklist {
    fn on_step_start(&mut self, step: &Step) {
        self.started += 1;
        let message = format!("[{}] {}", self.started, step.description);

        let spinner = ProgressBar::new_spinner();
        if spinner.is_hidden() {
            // No terminal: keep a plain trace of progress instead
            println!("{} {}", "…".dimmed(), message);
            return;
        }
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(message);
        spinner.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(spinner);
    }

    fn on_step_result(&mut self, result: &StepResult) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
        println!("{}", result_line(self.started, result));
    }

    fn on_final_report(&mut self, report: &ExecutionReport) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }

        // A run stopped before its first step only gets the closing message
        let rows = summary_lines(report);
        if !rows.is_empty() {
            ui::header("Summary");
            for row in &rows {
                println!("{row}");
            }
            println!();
            ui::dim(&counts_line(report));
        }

        let (tone, message) = closing(report);
        match tone {
            Tone::Info => ui::info(&message),
            Tone::Success => ui::success(&message),
            Tone::Warning => ui::warn(&message),
            Tone::Error => ui::error(&message),
        }
    }
}

/// How the closing message is printed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tone {
    Info,
    Success,
    Warning,
    Error,
}

fn marker(status: StepStatus) -> colored::ColoredString {
    match status {
        StepStatus::Success => "✓".green(),
        StepStatus::Failure => "✗".red(),
        StepStatus::Skipped => "○".yellow(),
    }
}

/// Line printed as a step finishes
fn result_line(position: usize, result: &StepResult) -> String {
    format!(
        "{} [{}] {} {}",
        marker(result.status),
        position,
        result.description,
        format!("({})", result.detail).dimmed()
    )
}

/// Numbered summary rows, one per recorded result
fn summary_lines(report: &ExecutionReport) -> Vec<String> {
    report
        .results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            format!(
                "  {:>2}. {} {}: {}",
                i + 1,
                marker(result.status),
                result.description,
                result.detail
            )
        })
        .collect()
}

fn closing(report: &ExecutionReport) -> (Tone, String) {
    match &report.outcome {
        Outcome::Completed if report.count(StepStatus::Failure) == 0 => {
            (Tone::Success, "Provisioning completed".to_string())
        }
        Outcome::Completed => (
            Tone::Warning,
            "Provisioning completed with failures".to_string(),
        ),
        Outcome::Aborted {
            reason: reason @ AbortReason::UserCancelled,
        } => (Tone::Info, abort_message(reason)),
        Outcome::Aborted { reason } => (Tone::Error, abort_message(reason)),
    }
}

fn abort_message(reason: &AbortReason) -> String {
    match reason {
        AbortReason::StepFailure { step_id } => {
            format!("Provisioning stopped after fatal step '{step_id}' failed")
        }
        AbortReason::UserCancelled => "Cancelled, no changes made".to_string(),
        AbortReason::InsufficientPrivilege => "Not running as root, no changes made".to_string(),
    }
}

/// "3 succeeded, 1 failed, 1 skipped"
pub fn counts_line(report: &ExecutionReport) -> String {
    format!(
        "{} succeeded, {} failed, {} skipped",
        report.count(StepStatus::Success),
        report.count(StepStatus::Failure),
        report.count(StepStatus::Skipped)
    )
}

/// Prints the final report as pretty JSON
pub struct JsonChecklist<W: Write> {
    out: W,
}

impl JsonChecklist<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> JsonChecklist<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ChecklistReporter for JsonChecklist<W> {
    fn on_step_start(&mut self, step: &Step) {
        log::debug!("Starting {}", step.id);
    }

    fn on_step_result(&mut self, result: &StepResult) {
        log::debug!("Finished {}: {:?}", result.step_id, result.status);
    }

    fn on_final_report(&mut self, report: &ExecutionReport) {
        let written = serde_json::to_writer_pretty(&mut self.out, report)
            .map_err(anyhow::Error::from)
            .and_then(|()| writeln!(self.out).map_err(anyhow::Error::from));
        if let Err(e) = written {
            log::error!("Failed to write JSON report: {e}");
        }
    }
}
