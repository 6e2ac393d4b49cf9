use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Operational failures surfaced by the tracker.
///
/// Expected absences (not a repository, no changes, unknown baseline commit)
/// are never errors; they come back as `Ok(None)` or empty collections.
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("`{command}` exited with code {code:?}: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Failed to parse git output: {0}")]
    Parse(String),

    #[error("Failed to (de)serialize baseline record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to walk {path}: {message}")]
    Walk { path: PathBuf, message: String },
}

impl TrackerError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        TrackerError::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether the failure came from a hung git subprocess
    pub fn is_timeout(&self) -> bool {
        matches!(self, TrackerError::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
