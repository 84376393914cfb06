//! Terminal prompts backed by dialoguer

use anyhow::{Context, Result};
use colored::Colorize;
use dialoguer::{Confirm, Input, Password, Select};
use std::io::{self, Write};

use provision::Prompter;

/// Interactive prompter on the controlling terminal.
///
/// Prompts and re-prompt warnings both go to stderr, leaving stdout to the
/// final report.
pub struct DialoguerPrompter<W: Write = io::Stderr> {
    warnings: W,
}

impl DialoguerPrompter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for DialoguerPrompter {
    fn default() -> Self {
        Self {
            warnings: io::stderr(),
        }
    }
}

impl<W: Write> Prompter for DialoguerPrompter<W> {
    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool> {
        Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()
            .context("Failed to read user input")
    }

    fn input(&mut self, prompt: &str, default: Option<&str>) -> Result<String> {
        let mut input = Input::<String>::new().with_prompt(prompt).allow_empty(true);
        if let Some(default) = default {
            input = input.default(default.to_string());
        }
        input
            .interact_text()
            .with_context(|| format!("Failed to read {}", prompt.to_lowercase()))
    }

    fn password(&mut self, prompt: &str) -> Result<String> {
        // Empty answers come back so the collector can explain the rejection
        Password::new()
            .with_prompt(prompt)
            .with_confirmation("Repeat to confirm", "Passwords do not match")
            .allow_empty_password(true)
            .interact()
            .context("Failed to read password")
    }

    fn select(&mut self, prompt: &str, items: &[&str], default: usize) -> Result<usize> {
        Select::new()
            .with_prompt(prompt)
            .items(items)
            .default(default)
            .interact()
            .with_context(|| format!("Failed to read {} selection", prompt.to_lowercase()))
    }

    fn warn(&mut self, message: &str) {
        if let Err(e) = writeln!(self.warnings, "{} {}", "⚠".yellow(), message) {
            log::debug!("Could not print warning: {e}");
        }
    }
}
