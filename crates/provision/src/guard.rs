//! Durable markers for one-time destructive actions
//!
//! A marker is a file named after its key inside the state directory. Its
//! presence means the guarded action already succeeded on this host. Markers
//! are only ever created here; clearing one is a manual operator decision.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::{Error, Result};

/// Records which guarded steps already ran
pub trait IdempotencyGuard {
    /// Absence of a marker means "not yet done"
    fn is_done(&self, key: &str) -> bool;

    /// Record success durably; a repeat call for the same key is a no-op
    fn mark_done(&self, key: &str) -> Result<()>;
}

/// A recorded marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub key: String,
    /// Completion time as written (RFC 3339, UTC)
    pub recorded_at: String,
}

/// File-backed marker store
#[derive(Debug, Clone)]
pub struct MarkerStore {
    dir: PathBuf,
}

impl MarkerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the marker for `key`
    pub fn marker_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(key))
    }

    /// All markers currently recorded, sorted by key
    pub fn list(&self) -> Result<Vec<Marker>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io("read markers in", &self.dir, e)),
        };

        let mut markers = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::io("read markers in", &self.dir, e))?;
            let key = entry.file_name().to_string_lossy().to_string();
            if validate_key(&key).is_err() || !entry.path().is_file() {
                continue;
            }
            let recorded_at = fs::read_to_string(entry.path())
                .map(|s| s.trim().to_string())
                .unwrap_or_default();
            markers.push(Marker { key, recorded_at });
        }

        markers.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(markers)
    }

    fn write_marker(&self, path: &Path) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;

        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(()),
            Err(e) => return Err(e),
        };
        writeln!(file, "{}", Utc::now().to_rfc3339())?;
        file.sync_all()?;

        // The new directory entry must survive a crash too
        File::open(&self.dir)?.sync_all()
    }
}

impl IdempotencyGuard for MarkerStore {
    fn is_done(&self, key: &str) -> bool {
        match self.marker_path(key) {
            Ok(path) => path.is_file(),
            Err(_) => false,
        }
    }

    fn mark_done(&self, key: &str) -> Result<()> {
        let path = self.marker_path(key)?;
        if path.is_file() {
            log::debug!("Marker '{key}' already recorded");
            return Ok(());
        }

        self.write_marker(&path).map_err(|source| Error::MarkerWrite {
            key: key.to_string(),
            path: path.clone(),
            source,
        })?;

        log::debug!("Recorded marker '{key}' at {}", path.display());
        Ok(())
    }
}

fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidMarkerKey {
            key: key.to_string(),
        })
    }
}
