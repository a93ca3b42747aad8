//! Typed error surface of the core.
//!
//! Every core module returns these kinds so the host can branch on them
//! (retry policy, user messaging). The binary boundary wraps them in
//! `anyhow` for display.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Instance, project, or group id does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Name collision on create/rename.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Project lock is held by a live process.
    #[error("project is locked by running process {holder}")]
    AlreadyLocked { holder: u32 },

    /// Caller-supplied data is unusable (missing directory, empty name, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Operation requires a live tmux session but none exists.
    #[error("no live session for instance '{0}'")]
    NotRunning(String),

    /// Start was asked to create a session that is already live.
    #[error("instance '{0}' is already running")]
    AlreadyRunning(String),

    /// A tmux subprocess invocation failed unexpectedly.
    #[error("tmux: {0}")]
    External(String),

    /// Read/write/parse failure on a registry, projects, or lock file.
    #[error("storage: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
