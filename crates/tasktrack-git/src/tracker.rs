use std::path::{Path, PathBuf};
use std::time::Duration;

use git2::Repository;
use tracing::{debug, info};

use crate::baseline::BaselineRecord;
use crate::command::{GitCommand, DEFAULT_COMMAND_TIMEOUT};
use crate::diff::{self, DiffOptions, StructuredDiff};
use crate::error::Result;
use crate::fingerprint::{self, Fingerprint, DEFAULT_SKIP_DIRS};
use crate::status::{self, RepositoryStatus};

/// The tracked directory, classified once at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Workspace {
    /// Directory inside a git working tree rooted at `root`
    Repository { root: PathBuf, dir: PathBuf },
    /// Directory without version control metadata at or above it
    PlainDirectory(PathBuf),
}

impl Workspace {
    pub fn detect(dir: &Path) -> Self {
        match Repository::discover(dir) {
            Ok(repo) => match repo.workdir() {
                Some(root) => Workspace::Repository {
                    root: root.to_path_buf(),
                    dir: dir.to_path_buf(),
                },
                None => {
                    debug!(dir = %dir.display(), "Bare repository, treating as plain directory");
                    Workspace::PlainDirectory(dir.to_path_buf())
                }
            },
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "No git repository found");
                Workspace::PlainDirectory(dir.to_path_buf())
            }
        }
    }

    pub fn dir(&self) -> &Path {
        match self {
            Workspace::Repository { dir, .. } => dir,
            Workspace::PlainDirectory(dir) => dir,
        }
    }
}

/// Tracks the version-control state of one directory across a task.
///
/// The tracker never modifies the tracked directory. Apart from the resolved
/// [`Workspace`] it holds no state: every query re-reads git and the
/// filesystem, so a tracker can be shared freely between tasks.
#[derive(Debug, Clone)]
pub struct WorkspaceTracker {
    workspace: Workspace,
    command_timeout: Duration,
    skip_dirs: Vec<String>,
}

impl WorkspaceTracker {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let workspace = Workspace::detect(dir.as_ref());
        debug!(workspace = ?workspace, "Workspace tracker created");
        Self {
            workspace,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            skip_dirs: DEFAULT_SKIP_DIRS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Ceiling for each git subprocess
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Additional directory names skipped when fingerprinting a plain directory
    pub fn with_skip_dirs<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for dir in dirs {
            let dir = dir.into();
            if !self.skip_dirs.contains(&dir) {
                self.skip_dirs.push(dir);
            }
        }
        self
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn dir(&self) -> &Path {
        self.workspace.dir()
    }

    pub fn is_repository(&self) -> bool {
        matches!(self.workspace, Workspace::Repository { .. })
    }

    pub fn status(&self) -> Result<RepositoryStatus> {
        match &self.workspace {
            Workspace::Repository { root, .. } => status::capture_status(&Repository::open(root)?),
            Workspace::PlainDirectory(_) => Ok(RepositoryStatus::not_a_repository()),
        }
    }

    /// Digest of everything that could affect a diff.
    ///
    /// Equal fingerprints mean no content changed, so callers can skip
    /// recomputing a diff.
    pub fn fingerprint(&self) -> Result<Fingerprint> {
        match &self.workspace {
            Workspace::Repository { root, .. } => {
                fingerprint::repository_fingerprint(&Repository::open(root)?)
            }
            Workspace::PlainDirectory(_) => self.fingerprint_plain_directory(),
        }
    }

    /// Content-hash fingerprint of the directory, ignoring version control
    pub fn fingerprint_plain_directory(&self) -> Result<Fingerprint> {
        fingerprint::fingerprint_plain_directory(self.dir(), &self.skip_dirs)
    }

    /// Diff between `baseline_commit` and the current working tree.
    ///
    /// Returns `Ok(None)` outside a repository or when the commit cannot be
    /// resolved. A resolvable commit always yields a diff, possibly empty.
    pub async fn diff_since(
        &self,
        baseline_commit: &str,
        options: &DiffOptions,
    ) -> Result<Option<StructuredDiff>> {
        let Workspace::Repository { root, .. } = &self.workspace else {
            return Ok(None);
        };

        let (base, untracked) = {
            let repo = Repository::open(root)?;
            let Some(base) = resolve_commit(&repo, baseline_commit) else {
                debug!(commit = %baseline_commit, "Baseline commit not found");
                return Ok(None);
            };
            (base, untracked_for(&repo, options)?)
        };

        let diff = diff::compute(&self.git(root), &base, &untracked, options).await?;
        Ok(Some(diff))
    }

    /// Uncommitted changes relative to HEAD (or to nothing, before the
    /// first commit). `Ok(None)` outside a repository or when clean.
    pub async fn current_diff(&self, options: &DiffOptions) -> Result<Option<StructuredDiff>> {
        let Workspace::Repository { root, .. } = &self.workspace else {
            return Ok(None);
        };

        let (head, untracked) = {
            let repo = Repository::open(root)?;
            (status::head_commit(&repo)?, untracked_for(&repo, options)?)
        };

        let git = self.git(root);
        let base = match head {
            Some(id) => id,
            None => empty_tree(&git).await?,
        };

        let diff = diff::compute(&git, &base, &untracked, options).await?;
        Ok((!diff.is_empty()).then_some(diff))
    }

    /// Record `(head commit, now, dirty files)` into `snapshot_dir`.
    ///
    /// Replaces any earlier baseline in the same directory. Failure to create
    /// or write the snapshot directory is returned to the caller.
    pub async fn create_baseline(&self, snapshot_dir: impl AsRef<Path>) -> Result<BaselineRecord> {
        let record = match &self.workspace {
            Workspace::Repository { root, .. } => {
                let repo = Repository::open(root)?;
                let head = status::head_commit(&repo)?;
                let (dirty, _) = status::working_tree_paths(&repo)?;
                BaselineRecord::new(head, dirty)
            }
            Workspace::PlainDirectory(_) => BaselineRecord::new(None, Vec::new()),
        };

        record.write(snapshot_dir.as_ref()).await?;
        Ok(record)
    }

    pub async fn load_baseline(
        &self,
        snapshot_dir: impl AsRef<Path>,
    ) -> Result<Option<BaselineRecord>> {
        BaselineRecord::read(snapshot_dir.as_ref()).await
    }

    /// Diff against the commit recorded in `snapshot_dir`.
    ///
    /// `Ok(None)` when there is no baseline, it recorded no commit, or the
    /// commit is gone.
    pub async fn diff_since_baseline(
        &self,
        snapshot_dir: impl AsRef<Path>,
        options: &DiffOptions,
    ) -> Result<Option<StructuredDiff>> {
        let Some(record) = self.load_baseline(snapshot_dir).await? else {
            info!("No baseline recorded");
            return Ok(None);
        };
        match record.head_commit {
            Some(ref commit) => self.diff_since(commit, options).await,
            None => Ok(None),
        }
    }

    fn git(&self, root: &Path) -> GitCommand {
        GitCommand::new(root).with_timeout(self.command_timeout)
    }
}

fn resolve_commit(repo: &Repository, spec: &str) -> Option<String> {
    let spec = spec.trim();
    if spec.is_empty() {
        return None;
    }
    let object = repo.revparse_single(spec).ok()?;
    let commit = object.peel_to_commit().ok()?;
    Some(commit.id().to_string())
}

fn untracked_for(repo: &Repository, options: &DiffOptions) -> Result<Vec<String>> {
    if !options.include_untracked {
        return Ok(Vec::new());
    }
    let (_, untracked) = status::working_tree_paths(repo)?;
    Ok(untracked)
}

/// Id of the empty tree in this repository's object format
async fn empty_tree(git: &GitCommand) -> Result<String> {
    let out = git.run(&["hash-object", "-t", "tree", "--stdin"]).await?;
    Ok(out.trim().to_string())
}
