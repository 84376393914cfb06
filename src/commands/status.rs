//! Status command - read-only view of settings and provisioning state

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use colored::Colorize;
use serde_json::json;

use provision::{MarkerStore, PARTITION_MARKER, sync};

use crate::Context as AppContext;
use crate::config::Settings;
use crate::precondition;
use crate::ui;

pub fn run(ctx: &AppContext) -> Result<()> {
    let (settings, source) = Settings::load(ctx.config.as_deref())?;
    let markers = MarkerStore::new(settings.state_dir()).list()?;
    let backups = sync::list_backups(&settings.hardening_path())?;

    if ctx.json {
        let document = json!({
            "settings_file": source.as_ref().map(|p| p.display().to_string()),
            "settings": settings,
            "markers": markers
                .iter()
                .map(|m| json!({ "key": m.key, "recorded_at": m.recorded_at }))
                .collect::<Vec<_>>(),
            "backups": backups
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>(),
        });
        let rendered =
            serde_json::to_string_pretty(&document).context("Failed to serialize status")?;
        println!("{rendered}");
        return Ok(());
    }

    ui::header("hostprep status");

    ui::section("Settings");
    ui::kv(
        "Source",
        &source.map_or_else(|| "built-in defaults".to_string(), |p| p.display().to_string()),
    );
    ui::kv("Hardening source", &settings.hardening_url);
    ui::kv("Installed at", &settings.hardening_path().display().to_string());
    ui::kv("SSH service", &settings.ssh_service);
    ui::kv("Packages", &settings.packages.join(", "));
    ui::kv("State directory", &settings.state_dir().display().to_string());
    ui::kv(
        "Strict validation",
        if settings.strict_validation { "yes" } else { "no" },
    );
    if precondition::effective_uid() != 0 {
        ui::dim("(not running as root: 'run' will refuse to start)");
    }

    ui::section("Markers");
    if markers.is_empty() {
        ui::dim("none recorded");
    }
    for marker in &markers {
        println!(
            "  {} {} {}",
            "✓".green(),
            marker.key,
            format_recorded(&marker.recorded_at).dimmed()
        );
    }
    if !markers.iter().any(|m| m.key == PARTITION_MARKER) {
        ui::dim("root partition has not been expanded by hostprep");
    }

    ui::section("Config backups");
    if backups.is_empty() {
        ui::dim("none");
    }
    for backup in &backups {
        println!("  {}", backup.display());
    }

    Ok(())
}

/// Local-time rendering of a marker's RFC 3339 timestamp
fn format_recorded(recorded_at: &str) -> String {
    match DateTime::parse_from_rfc3339(recorded_at) {
        Ok(at) => at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        Err(_) if recorded_at.is_empty() => "(no timestamp)".to_string(),
        Err(_) => recorded_at.to_string(),
    }
}
