use git2::{ErrorCode, Repository, Status, StatusOptions};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Version-control state of the tracked directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryStatus {
    pub is_repo: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_commit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Tracked files with staged or unstaged modifications
    pub dirty_files: Vec<String>,
    /// Files on disk that are neither tracked nor ignored
    pub untracked_files: Vec<String>,
}

impl RepositoryStatus {
    /// Shape reported for a directory without version control
    pub fn not_a_repository() -> Self {
        Self::default()
    }

    pub fn is_clean(&self) -> bool {
        self.dirty_files.is_empty() && self.untracked_files.is_empty()
    }

    pub fn total_changes(&self) -> usize {
        self.dirty_files.len() + self.untracked_files.len()
    }
}

/// Any index or worktree change to a tracked path
fn dirty_mask() -> Status {
    Status::INDEX_NEW
        | Status::INDEX_MODIFIED
        | Status::INDEX_DELETED
        | Status::INDEX_RENAMED
        | Status::INDEX_TYPECHANGE
        | Status::WT_MODIFIED
        | Status::WT_DELETED
        | Status::WT_RENAMED
        | Status::WT_TYPECHANGE
        | Status::CONFLICTED
}

pub(crate) fn capture_status(repo: &Repository) -> Result<RepositoryStatus> {
    let (head_commit, branch) = head_info(repo)?;
    let (dirty_files, untracked_files) = working_tree_paths(repo)?;

    debug!(
        head = head_commit.as_deref().unwrap_or("<none>"),
        branch = branch.as_deref().unwrap_or("<detached>"),
        dirty = dirty_files.len(),
        untracked = untracked_files.len(),
        "Captured repository status"
    );

    Ok(RepositoryStatus {
        is_repo: true,
        head_commit,
        branch,
        dirty_files,
        untracked_files,
    })
}

/// Current commit id and branch name.
///
/// An unborn branch has no commit but still names the branch HEAD points at.
/// A detached HEAD has a commit but no branch.
pub(crate) fn head_info(repo: &Repository) -> Result<(Option<String>, Option<String>)> {
    match repo.head() {
        Ok(head) => {
            let commit = head.peel_to_commit()?.id().to_string();
            let branch = if head.is_branch() {
                head.shorthand().map(str::to_string)
            } else {
                None
            };
            Ok((Some(commit), branch))
        }
        Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
            Ok((None, unborn_branch_name(repo)))
        }
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn head_commit(repo: &Repository) -> Result<Option<String>> {
    head_info(repo).map(|(commit, _)| commit)
}

fn unborn_branch_name(repo: &Repository) -> Option<String> {
    let head = repo.find_reference("HEAD").ok()?;
    head.symbolic_target()
        .and_then(|target| target.strip_prefix("refs/heads/"))
        .map(str::to_string)
}

/// Dirty tracked paths and untracked paths, both sorted
pub(crate) fn working_tree_paths(repo: &Repository) -> Result<(Vec<String>, Vec<String>)> {
    let mut opts = StatusOptions::new();
    opts.include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_ignored(false)
        .exclude_submodules(true);

    let statuses = repo.statuses(Some(&mut opts))?;

    let dirty_mask = dirty_mask();
    let mut dirty = Vec::new();
    let mut untracked = Vec::new();

    for entry in statuses.iter() {
        let path = String::from_utf8_lossy(entry.path_bytes()).into_owned();
        let st = entry.status();

        if st.intersects(dirty_mask) {
            dirty.push(path);
        } else if st.is_wt_new() {
            untracked.push(path);
        }
    }

    dirty.sort();
    untracked.sort();

    Ok((dirty, untracked))
}
