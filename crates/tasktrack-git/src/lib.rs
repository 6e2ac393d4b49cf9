//! # tasktrack-git
//!
//! Workspace state tracking for task judging.
//!
//! This crate records where a working directory stood when a task began and
//! later answers "what changed since then", whether or not the directory is
//! under git.
//!
//! ## Overview
//!
//! - A baseline (HEAD commit, timestamp, dirty files) is written once at the
//!   start of a session
//! - A fingerprint is a cheap equality check: unchanged fingerprint means
//!   there is no need to recompute a diff
//! - Structured diffs list every changed file with its status and line counts,
//!   plus an optional size-bounded unified patch
//!
//! ## Key Types
//!
//! - [`WorkspaceTracker`] - Entry point for all queries
//! - [`RepositoryStatus`] - Head commit, branch, dirty and untracked files
//! - [`StructuredDiff`] / [`FileChange`] - Parsed diff output
//! - [`BaselineRecord`] - Persisted reference point
//! - [`Fingerprint`] - Hex SHA-256 of the directory state
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tasktrack_git::{DiffOptions, WorkspaceTracker};
//!
//! let tracker = WorkspaceTracker::new(".");
//! let baseline = tracker.create_baseline(".tasktrack").await?;
//!
//! // ... agent makes changes ...
//!
//! if let Some(commit) = baseline.head_commit.as_deref() {
//!     if let Some(diff) = tracker.diff_since(commit, &DiffOptions::new()).await? {
//!         println!("{}", diff.summary);
//!     }
//! }
//! ```
//!
//! ## Absence vs failure
//!
//! Not being a repository, having no changes, or asking about a commit that
//! no longer exists are normal outcomes and come back as `Ok(None)`. Only
//! operational problems (git missing or hung, unreadable files, unwritable
//! snapshot directory) are errors.

mod baseline;
mod command;
mod diff;
mod error;
mod fingerprint;
mod status;
mod tracker;

pub use baseline::{BaselineRecord, BASELINE_FILE_NAME};
pub use command::{GitCommand, DEFAULT_COMMAND_TIMEOUT};
pub use diff::{DiffOptions, DiffStats, FileChange, FileStatus, StructuredDiff};
pub use error::{Result, TrackerError};
pub use fingerprint::{
    combine_file_digests, file_digest, fingerprint_plain_directory, Fingerprint, DEFAULT_SKIP_DIRS,
};
pub use status::RepositoryStatus;
pub use tracker::{Workspace, WorkspaceTracker};
