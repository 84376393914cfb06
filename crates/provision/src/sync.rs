//! Reconcile the installed hardening configuration with its canonical copy
//!
//! Three outcomes, decided by a byte-for-byte comparison:
//! - nothing installed: the canonical document is installed
//! - identical: nothing is written
//! - diverged: the installed file is copied to a timestamped backup, then
//!   replaced
//!
//! Backups are never overwritten, so divergent runs accumulate them.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use similar::TextDiff;

use crate::context::Fetcher;
use crate::error::{Error, Result};

/// Mode for a freshly installed configuration file
#[cfg(unix)]
const FRESH_INSTALL_MODE: u32 = 0o644;

/// What a reconcile did to the installed artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Installed,
    Unchanged,
    Updated { backup: PathBuf },
}

impl SyncOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Installed => "installed",
            Self::Unchanged => "unchanged",
            Self::Updated { .. } => "updated",
        }
    }
}

/// Fetch-and-reconcile for one configuration artifact
pub struct ConfigSync<'a> {
    fetcher: &'a dyn Fetcher,
    source: String,
    installed: PathBuf,
}

impl<'a> ConfigSync<'a> {
    pub fn new(
        fetcher: &'a dyn Fetcher,
        source: impl Into<String>,
        installed: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fetcher,
            source: source.into(),
            installed: installed.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn installed_path(&self) -> &Path {
        &self.installed
    }

    /// Fetch the canonical document and reconcile the installed copy.
    ///
    /// A failed fetch leaves the installed artifact untouched.
    pub fn apply(&self) -> Result<SyncOutcome> {
        self.apply_at(Local::now().naive_local())
    }

    /// [`apply`](Self::apply) with an explicit clock for backup names
    pub fn apply_at(&self, now: NaiveDateTime) -> Result<SyncOutcome> {
        log::debug!("Fetching canonical configuration from {}", self.source);
        let canonical = self
            .fetcher
            .fetch(&self.source)
            .map_err(|e| Error::Fetch {
                message: format!("{e:#}"),
            })?;

        if canonical.is_empty() {
            return Err(Error::Fetch {
                message: format!("{} returned an empty document", self.source),
            });
        }

        reconcile(&self.installed, &canonical, now)
    }

    pub fn backups(&self) -> Result<Vec<PathBuf>> {
        list_backups(&self.installed)
    }
}

/// Bring `installed` in line with `canonical`, backing up a diverged copy
pub fn reconcile(installed: &Path, canonical: &[u8], now: NaiveDateTime) -> Result<SyncOutcome> {
    let current = match fs::read(installed) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            write_atomic(installed, canonical, None)?;
            log::info!("Installed {}", installed.display());
            return Ok(SyncOutcome::Installed);
        }
        Err(e) => return Err(Error::io("read", installed, e)),
    };

    if current == canonical {
        log::debug!("{} already matches canonical copy", installed.display());
        return Ok(SyncOutcome::Unchanged);
    }

    log_divergence(installed, &current, canonical);

    let backup = backup_path(installed, now);
    fs::copy(installed, &backup).map_err(|e| Error::io("back up", installed, e))?;

    let permissions = fs::metadata(installed)
        .map(|m| m.permissions())
        .map_err(|e| Error::io("stat", installed, e))?;
    write_atomic(installed, canonical, Some(permissions))?;

    log::info!(
        "Updated {} (previous copy at {})",
        installed.display(),
        backup.display()
    );
    Ok(SyncOutcome::Updated { backup })
}

/// First free backup path for `installed` at `now`.
///
/// `<name>.bak.<YYYYMMDD-HHMMSS>`, with `-1`, `-2`, ... appended when that
/// second already has a backup.
pub fn backup_path(installed: &Path, now: NaiveDateTime) -> PathBuf {
    let name = file_name(installed);
    let stamp = now.format("%Y%m%d-%H%M%S");

    let base = installed.with_file_name(format!("{name}.bak.{stamp}"));
    if !base.exists() {
        return base;
    }

    let mut n: u32 = 1;
    loop {
        let candidate = installed.with_file_name(format!("{name}.bak.{stamp}-{n}"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Backups of `installed`, oldest name first
pub fn list_backups(installed: &Path) -> Result<Vec<PathBuf>> {
    let dir = match installed.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let prefix = format!("{}.bak.", file_name(installed));

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::io("list", dir, e)),
    };

    let mut backups: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(&prefix))
        .map(|entry| entry.path())
        .collect();
    backups.sort();
    Ok(backups)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "config".to_string())
}

/// Replace `path` via a synced temp file in the same directory
fn write_atomic(path: &Path, content: &[u8], permissions: Option<fs::Permissions>) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| Error::io("create", parent, e))?;
    }

    let tmp = path.with_file_name(format!(".{}.hostprep-tmp", file_name(path)));

    let mut file = File::create(&tmp).map_err(|e| Error::io("create", &tmp, e))?;
    file.write_all(content)
        .and_then(|()| file.sync_all())
        .map_err(|e| Error::io("write", &tmp, e))?;
    drop(file);

    match permissions {
        Some(permissions) => fs::set_permissions(&tmp, permissions)
            .map_err(|e| Error::io("set permissions on", &tmp, e))?,
        None => set_fresh_mode(&tmp)?,
    }

    fs::rename(&tmp, path).map_err(|e| Error::io("replace", path, e))?;

    sync_parent(path)
}

/// Flush the directory entry of a freshly renamed file
fn sync_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => File::open(parent)
            .and_then(|dir| dir.sync_all())
            .map_err(|e| Error::io("sync", parent, e)),
        _ => Ok(()),
    }
}

#[cfg(unix)]
fn set_fresh_mode(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(FRESH_INSTALL_MODE))
        .map_err(|e| Error::io("set permissions on", path, e))
}

#[cfg(not(unix))]
fn set_fresh_mode(_path: &Path) -> Result<()> {
    Ok(())
}

fn log_divergence(installed: &Path, current: &[u8], canonical: &[u8]) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }

    let old = String::from_utf8_lossy(current);
    let new = String::from_utf8_lossy(canonical);
    let diff = TextDiff::from_lines(old.as_ref(), new.as_ref())
        .unified_diff()
        .context_radius(2)
        .header(&installed.display().to_string(), "canonical")
        .to_string();
    log::debug!("{} differs from canonical copy:\n{diff}", installed.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::cell::RefCell;
    use tempfile::TempDir;

    struct StaticFetcher {
        body: RefCell<anyhow::Result<Vec<u8>>>,
    }

    impl StaticFetcher {
        fn serving(body: &str) -> Self {
            Self {
                body: RefCell::new(Ok(body.as_bytes().to_vec())),
            }
        }

        fn failing() -> Self {
            Self {
                body: RefCell::new(Err(anyhow::anyhow!("connection timed out"))),
            }
        }

        fn serve(&self, body: &str) {
            *self.body.borrow_mut() = Ok(body.as_bytes().to_vec());
        }
    }

    impl Fetcher for StaticFetcher {
        fn fetch(&self, _source: &str) -> anyhow::Result<Vec<u8>> {
            match &*self.body.borrow() {
                Ok(bytes) => Ok(bytes.clone()),
                Err(e) => Err(anyhow::anyhow!("{e}")),
            }
        }
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 17)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_fresh_install() {
        let tmp = TempDir::new().unwrap();
        let installed = tmp.path().join("ssh").join("sshd_config");
        let fetcher = StaticFetcher::serving("PermitRootLogin no\n");
        let sync = ConfigSync::new(&fetcher, "https://example.invalid/sshd_config", &installed);

        assert_eq!(sync.apply_at(at(10, 0, 0)).unwrap(), SyncOutcome::Installed);
        assert_eq!(fs::read_to_string(&installed).unwrap(), "PermitRootLogin no\n");
        assert!(sync.backups().unwrap().is_empty());
    }

    #[test]
    fn test_unchanged_twice_creates_no_backup() {
        let tmp = TempDir::new().unwrap();
        let installed = tmp.path().join("sshd_config");
        fs::write(&installed, "PermitRootLogin yes\n").unwrap();
        let fetcher = StaticFetcher::serving("PermitRootLogin no\n");
        let sync = ConfigSync::new(&fetcher, "src", &installed);

        assert!(matches!(
            sync.apply_at(at(10, 0, 0)).unwrap(),
            SyncOutcome::Updated { .. }
        ));
        assert_eq!(sync.backups().unwrap().len(), 1);

        assert_eq!(sync.apply_at(at(10, 5, 0)).unwrap(), SyncOutcome::Unchanged);
        assert_eq!(sync.backups().unwrap().len(), 1);
        assert_eq!(fs::read_to_string(&installed).unwrap(), "PermitRootLogin no\n");
    }

    #[test]
    fn test_divergent_runs_accumulate_distinct_backups() {
        let tmp = TempDir::new().unwrap();
        let installed = tmp.path().join("sshd_config");
        fs::write(&installed, "v1\n").unwrap();
        let fetcher = StaticFetcher::serving("v2\n");
        let sync = ConfigSync::new(&fetcher, "src", &installed);

        let first = match sync.apply_at(at(9, 0, 0)).unwrap() {
            SyncOutcome::Updated { backup } => backup,
            other => panic!("expected update, got {other:?}"),
        };
        assert_eq!(fs::read_to_string(&first).unwrap(), "v1\n");

        fetcher.serve("v3\n");
        let second = match sync.apply_at(at(9, 0, 0)).unwrap() {
            SyncOutcome::Updated { backup } => backup,
            other => panic!("expected update, got {other:?}"),
        };

        assert_ne!(first, second);
        assert_eq!(fs::read_to_string(&first).unwrap(), "v1\n");
        assert_eq!(fs::read_to_string(&second).unwrap(), "v2\n");
        assert_eq!(fs::read_to_string(&installed).unwrap(), "v3\n");
        assert_eq!(sync.backups().unwrap().len(), 2);
    }

    #[test]
    fn test_fetch_failure_leaves_installed_untouched() {
        let tmp = TempDir::new().unwrap();
        let installed = tmp.path().join("sshd_config");
        fs::write(&installed, "original\n").unwrap();
        let fetcher = StaticFetcher::failing();
        let sync = ConfigSync::new(&fetcher, "src", &installed);

        let err = sync.apply_at(at(10, 0, 0)).unwrap_err();
        assert!(err.to_string().starts_with("fetch failed"));
        assert!(err.to_string().contains("timed out"));
        assert_eq!(fs::read_to_string(&installed).unwrap(), "original\n");
        assert!(sync.backups().unwrap().is_empty());
    }

    #[test]
    fn test_empty_document_is_a_fetch_failure() {
        let tmp = TempDir::new().unwrap();
        let installed = tmp.path().join("sshd_config");
        fs::write(&installed, "original\n").unwrap();
        let fetcher = StaticFetcher::serving("");
        let sync = ConfigSync::new(&fetcher, "src", &installed);

        assert!(matches!(
            sync.apply_at(at(10, 0, 0)),
            Err(Error::Fetch { .. })
        ));
        assert_eq!(fs::read_to_string(&installed).unwrap(), "original\n");
    }

    #[test]
    fn test_sync_parent_reports_missing_directory() {
        let tmp = TempDir::new().unwrap();
        let inside = tmp.path().join("gone").join("sshd_config");

        let err = sync_parent(&inside).unwrap_err();
        assert!(matches!(err, Error::Io { action: "sync", .. }));
        assert!(sync_parent(&tmp.path().join("sshd_config")).is_ok());
        assert!(sync_parent(Path::new("sshd_config")).is_ok());
    }

    #[test]
    fn test_backup_path_format() {
        let path = backup_path(Path::new("/etc/ssh/sshd_config"), at(14, 3, 9));
        assert_eq!(
            path,
            PathBuf::from("/etc/ssh/sshd_config.bak.20261017-140309")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_update_keeps_existing_mode() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let installed = tmp.path().join("sshd_config");
        fs::write(&installed, "old\n").unwrap();
        fs::set_permissions(&installed, fs::Permissions::from_mode(0o600)).unwrap();

        reconcile(&installed, b"new\n", at(8, 0, 0)).unwrap();

        let mode = fs::metadata(&installed).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn test_list_backups_ignores_other_files() {
        let tmp = TempDir::new().unwrap();
        let installed = tmp.path().join("sshd_config");
        fs::write(tmp.path().join("sshd_config.bak.20260101-000000"), "a").unwrap();
        fs::write(tmp.path().join("ssh_config.bak.20260101-000000"), "b").unwrap();
        fs::write(tmp.path().join("moduli"), "c").unwrap();

        let backups = list_backups(&installed).unwrap();
        assert_eq!(backups.len(), 1);
    }
}
