mod checklist;
mod cli;
mod commands;
mod config;
mod fetch;
mod host;
mod paths;
mod precondition;
mod prompt;
mod runner;
mod ui;

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use provision::{EXIT_ABORTED, EXIT_OK};

/// Global context for the application
pub struct Context {
    pub quiet: bool,
    pub json: bool,
    pub config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        quiet: cli.quiet,
        json: cli.json,
        config: cli.config,
    };

    let result = match cli.command.unwrap_or(Command::Run) {
        Command::Run => commands::run::run(&ctx),
        Command::Status => commands::status::run(&ctx).map(|()| EXIT_OK),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "hostprep", &mut io::stdout());
            Ok(EXIT_OK)
        }
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            ui::error(&format!("{e:#}"));
            ExitCode::from(EXIT_ABORTED)
        }
    }
}
