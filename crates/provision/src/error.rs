//! Error types for provisioning operations.
//!
//! Collaborator failures (commands, prompts, fetches) travel as
//! `anyhow::Error`; this enum covers what the engine itself can get wrong.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the provisioning engine.
#[derive(Debug, Error)]
pub enum Error {
    /// The process cannot mutate the host
    #[error("insufficient privilege: running as uid {euid}, root (uid 0) is required")]
    InsufficientPrivilege {
        /// Effective uid of the running process
        euid: u32,
    },

    /// Marker keys become file names, so they are restricted
    #[error("invalid marker key '{key}': use lowercase letters, digits and '-'")]
    InvalidMarkerKey {
        /// The rejected key
        key: String,
    },

    /// A guarded action succeeded but could not be recorded
    #[error("could not record marker '{key}' at {}: {source}", path.display())]
    MarkerWrite {
        /// Marker key
        key: String,
        /// Marker file path
        path: PathBuf,
        /// Underlying I/O failure
        source: std::io::Error,
    },

    /// The canonical configuration could not be retrieved
    #[error("fetch failed: {message}")]
    Fetch {
        /// Collaborator error, flattened
        message: String,
    },

    /// Filesystem failure while reading or writing provisioning state
    #[error("failed to {action} {}: {source}", path.display())]
    Io {
        /// What was being attempted ("read", "back up", ...)
        action: &'static str,
        /// Path involved
        path: PathBuf,
        /// Underlying I/O failure
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}
