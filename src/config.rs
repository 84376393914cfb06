//! Site settings
//!
//! Every field has a default, so an empty or partial TOML file is valid and
//! running without any file uses the built-in values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use provision::StepSettings;

use crate::paths;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Canonical hardened `sshd_config` (https:// or file://)
    pub hardening_url: String,
    /// Installed location of the hardened configuration
    pub hardening_path: String,
    /// Unit restarted after the configuration is installed
    pub ssh_service: String,
    /// Packages installed on every run
    pub packages: Vec<String>,
    /// Directory holding idempotency markers
    pub state_dir: String,
    pub hosts_file: String,
    pub fetch_timeout_secs: u64,
    /// Abort the run when the hardened configuration fails validation
    pub strict_validation: bool,
    pub reboot_delay_minutes: u32,
    /// Group granting administrative rights to a new user
    pub sudo_group: String,
}

impl Default for Settings {
    fn default() -> Self {
        let steps = StepSettings::default();
        Self {
            hardening_url: "https://raw.githubusercontent.com/hostprep/hardening/main/sshd_config"
                .to_string(),
            hardening_path: "/etc/ssh/sshd_config".to_string(),
            ssh_service: steps.ssh_service,
            packages: steps.packages,
            state_dir: "/var/lib/hostprep".to_string(),
            hosts_file: "/etc/hosts".to_string(),
            fetch_timeout_secs: 30,
            strict_validation: steps.strict_validation,
            reboot_delay_minutes: steps.reboot_delay_minutes,
            sudo_group: "sudo".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from the resolved file, or defaults when there is none
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        match paths::config_file(explicit) {
            Some(path) => Ok((Self::from_file(&path)?, Some(path))),
            None => Ok((Self::default(), None)),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid settings in {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let settings: Self = toml::from_str(content)?;
        if settings.packages.iter().any(|p| p.trim().is_empty()) {
            anyhow::bail!("packages must not contain empty names");
        }
        if settings.ssh_service.trim().is_empty() {
            anyhow::bail!("ssh_service must not be empty");
        }
        Ok(settings)
    }

    pub fn step_settings(&self) -> StepSettings {
        StepSettings {
            packages: self.packages.clone(),
            ssh_service: self.ssh_service.clone(),
            strict_validation: self.strict_validation,
            reboot_delay_minutes: self.reboot_delay_minutes,
        }
    }

    pub fn hardening_path(&self) -> PathBuf {
        paths::expand(&self.hardening_path)
    }

    pub fn hosts_file(&self) -> PathBuf {
        paths::expand(&self.hosts_file)
    }

    pub fn state_dir(&self) -> PathBuf {
        paths::state_dir(&self.state_dir)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}
