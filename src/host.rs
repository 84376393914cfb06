//! Host collaborators for Debian-family systems
//!
//! Each operation shells out to the standard tool for the job and turns a
//! non-zero exit into an error carrying the tool's stderr.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use provision::edit::{merge_authorized_keys, upsert_loopback_alias};
use provision::{Accounts, KeyAction, NewUser, Secret, System};

use crate::runner;

/// Where sshd keeps its host keys
const SSH_DIR: &str = "/etc/ssh";

const APT_ENV: [(&str, &str); 1] = [("DEBIAN_FRONTEND", "noninteractive")];

/// The running host
pub struct HostSystem {
    hosts_file: PathBuf,
    sudo_group: String,
}

impl HostSystem {
    pub fn new(hosts_file: impl Into<PathBuf>, sudo_group: impl Into<String>) -> Self {
        Self {
            hosts_file: hosts_file.into(),
            sudo_group: sudo_group.into(),
        }
    }

    fn write_authorized_keys(&self, username: &str, action: &KeyAction) -> Result<()> {
        let home = home_dir_of(username)?;
        let ssh_dir = home.join(".ssh");
        let keys_file = ssh_dir.join("authorized_keys");

        fs::create_dir_all(&ssh_dir)
            .with_context(|| format!("Failed to create {}", ssh_dir.display()))?;
        set_mode(&ssh_dir, 0o700)?;

        let existing = match fs::read_to_string(&keys_file) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("Could not read {}", keys_file.display()));
            }
        };
        fs::write(&keys_file, merge_authorized_keys(&existing, action))
            .with_context(|| format!("Failed to write {}", keys_file.display()))?;
        set_mode(&keys_file, 0o600)?;

        let ssh_dir = ssh_dir.to_string_lossy();
        runner::run_checked("chown", &["-R", &format!("{username}:"), &ssh_dir])
    }
}

impl System for HostSystem {
    fn install_packages(&self, packages: &[String]) -> Result<()> {
        if packages.is_empty() {
            return Ok(());
        }
        runner::run_with_env("apt-get", &["update", "-q"], &APT_ENV)?;

        let mut args = vec!["install", "-y", "-q"];
        args.extend(packages.iter().map(String::as_str));
        runner::run_with_env("apt-get", &args, &APT_ENV)
    }

    fn regenerate_host_keys(&self) -> Result<()> {
        rotate_host_keys(Path::new(SSH_DIR), || runner::run_checked("ssh-keygen", &["-A"]))
    }

    fn validate_config(&self, path: &Path) -> Result<()> {
        runner::run_checked("sshd", &["-t", "-f", &path.to_string_lossy()])
    }

    fn restart_service(&self, service: &str) -> Result<()> {
        runner::run_checked("systemctl", &["restart", service])
    }

    fn expand_root_partition(&self) -> Result<()> {
        let mount = runner::run_capture("findmnt", &["-n", "-o", "SOURCE,FSTYPE", "/"])?;
        let mut fields = mount.split_whitespace();
        let (Some(source), Some(fstype)) = (fields.next(), fields.next()) else {
            anyhow::bail!("Unexpected findmnt output: '{mount}'");
        };

        let (disk, number) = split_partition(source)
            .with_context(|| format!("Cannot determine the disk behind {source}"))?;

        let output = runner::run_output("growpart", &[disk.as_str(), number.as_str()])?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        if output.status.success() {
            log::info!("Grew partition {number} of {disk}");
        } else if stdout.contains("NOCHANGE") {
            log::info!("Partition {number} of {disk} already fills the disk");
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("growpart failed: {}", stderr.trim());
        }

        match fstype {
            "ext2" | "ext3" | "ext4" => runner::run_checked("resize2fs", &[source]),
            "xfs" => runner::run_checked("xfs_growfs", &["/"]),
            other => anyhow::bail!("Cannot grow a {other} filesystem"),
        }
    }

    fn set_hostname(&self, hostname: &str) -> Result<()> {
        runner::run_checked("hostnamectl", &["set-hostname", hostname])?;
        update_hosts_file(&self.hosts_file, hostname)
    }

    fn create_user(&self, user: &NewUser) -> Result<()> {
        runner::run_checked("useradd", &["-m", "-s", "/bin/bash", &user.username])?;
        runner::run_with_input(
            "chpasswd",
            &[],
            &format!("{}:{}\n", user.username, user.password.expose()),
        )?;
        self.write_authorized_keys(&user.username, &KeyAction::Replace(user.public_key.clone()))?;
        if user.add_to_sudo {
            runner::run_checked("usermod", &["-aG", &self.sudo_group, &user.username])?;
        }
        Ok(())
    }

    fn update_authorized_keys(&self, username: &str, key_action: &KeyAction) -> Result<()> {
        if matches!(key_action, KeyAction::Skip) {
            return Ok(());
        }
        self.write_authorized_keys(username, key_action)
    }

    fn remove_root_password(&self) -> Result<()> {
        runner::run_checked("passwd", &["-d", "root"])?;
        runner::run_checked("passwd", &["-l", "root"])
    }

    fn set_root_password(&self, password: &Secret) -> Result<()> {
        runner::run_with_input("chpasswd", &[], &format!("root:{}\n", password.expose()))
    }

    fn reboot(&self, delay_minutes: u32) -> Result<()> {
        runner::run_checked("shutdown", &["-r", &format!("+{delay_minutes}")])
    }
}

impl Accounts for HostSystem {
    fn user_exists(&self, username: &str) -> bool {
        runner::run_quiet("getent", &["passwd", username])
    }

    fn current_hostname(&self) -> Result<String> {
        runner::run_capture("hostname", &[])
    }
}

/// Rewrite the loopback alias line of a hosts file
pub fn update_hosts_file(path: &Path, hostname: &str) -> Result<()> {
    let current = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e).with_context(|| format!("Could not read {}", path.display())),
    };
    let updated = upsert_loopback_alias(&current, hostname);
    if updated != current {
        fs::write(path, updated).with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}

/// Replace the host keys in `dir` with whatever `generate` creates.
///
/// The current keys are renamed to `*.old` first and put back if `generate`
/// fails or leaves no keys behind, so sshd never restarts without keys.
pub fn rotate_host_keys(dir: &Path, generate: impl FnOnce() -> Result<()>) -> Result<()> {
    let mut retired = Vec::new();
    for key in host_keys(dir)? {
        let old = retired_path(&key);
        log::debug!("Moving host key {} aside", key.display());
        if let Err(e) = fs::rename(&key, &old) {
            restore_host_keys(dir, &retired);
            return Err(e).with_context(|| format!("Failed to move {} aside", key.display()));
        }
        retired.push((key, old));
    }

    let generated = generate().and_then(|()| {
        if host_keys(dir)?.is_empty() {
            anyhow::bail!("No host keys were generated in {}", dir.display());
        }
        Ok(())
    });
    if let Err(e) = generated {
        restore_host_keys(dir, &retired);
        return Err(e.context("Kept the previous host keys"));
    }

    for (_, old) in &retired {
        if let Err(e) = fs::remove_file(old) {
            log::warn!("Could not remove {}: {e}", old.display());
        }
    }
    Ok(())
}

/// Current host key files, excluding ones moved aside
fn host_keys(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).with_context(|| format!("Could not read {}", dir.display()))?;
    let mut keys: Vec<PathBuf> = entries
        .flatten()
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name.starts_with("ssh_host_") && !name.ends_with(".old")
        })
        .map(|entry| entry.path())
        .collect();
    keys.sort();
    Ok(keys)
}

fn retired_path(key: &Path) -> PathBuf {
    let mut name = key.as_os_str().to_owned();
    name.push(".old");
    PathBuf::from(name)
}

/// Drop partially generated keys and move the retired ones back
fn restore_host_keys(dir: &Path, retired: &[(PathBuf, PathBuf)]) {
    for partial in host_keys(dir).unwrap_or_default() {
        if let Err(e) = fs::remove_file(&partial) {
            log::warn!("Could not remove {}: {e}", partial.display());
        }
    }
    for (key, old) in retired {
        if let Err(e) = fs::rename(old, key) {
            log::error!("Could not restore host key {}: {e}", key.display());
        }
    }
}

fn home_dir_of(username: &str) -> Result<PathBuf> {
    let entry = runner::run_capture("getent", &["passwd", username])
        .with_context(|| format!("User {username} not found"))?;
    passwd_home(&entry).with_context(|| format!("No home directory for {username}"))
}

/// Home directory field of a passwd line
fn passwd_home(entry: &str) -> Option<PathBuf> {
    entry
        .split(':')
        .nth(5)
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
}

/// Split a partition device into its disk and partition number.
///
/// `/dev/sda1` is `("/dev/sda", "1")`; `nvme`, `mmcblk` and `loop` devices
/// put a `p` between the two (`/dev/nvme0n1p2`). Mapper devices have no
/// partition to grow.
pub fn split_partition(device: &str) -> Option<(String, String)> {
    if !device.starts_with("/dev/") || device.starts_with("/dev/mapper/") {
        return None;
    }

    let digits = device.len() - device.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    let (head, number) = device.split_at(device.len() - digits);

    let name = head.trim_start_matches("/dev/");
    let disk = if ["nvme", "mmcblk", "loop"]
        .iter()
        .any(|prefix| name.starts_with(prefix))
    {
        head.strip_suffix('p')
            .filter(|disk| disk.ends_with(|c: char| c.is_ascii_digit()))?
    } else {
        head
    };

    Some((disk.to_string(), number.to_string()))
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .with_context(|| format!("Failed to set permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
