use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::command::GitCommand;
use crate::error::{Result, TrackerError};

/// How a file differs between the two compared states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
}

impl FileStatus {
    /// Map a `--name-status` letter (with optional similarity score)
    fn from_code(code: &str) -> Option<Self> {
        match code.chars().next()? {
            'A' | 'C' => Some(FileStatus::Added),
            'M' | 'T' | 'U' | 'X' => Some(FileStatus::Modified),
            'D' => Some(FileStatus::Deleted),
            'R' => Some(FileStatus::Renamed),
            _ => None,
        }
    }
}

/// Per-file entry of a structured diff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub status: FileStatus,
    pub additions: u64,
    pub deletions: u64,
    /// Source path of a rename
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_path: Option<String>,
    #[serde(default)]
    pub binary: bool,
}

/// Aggregate totals of a structured diff
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub files_changed: usize,
    pub insertions: u64,
    pub deletions: u64,
}

impl DiffStats {
    pub fn from_files(files: &[FileChange]) -> Self {
        Self {
            files_changed: files.len(),
            insertions: files.iter().map(|f| f.additions).sum(),
            deletions: files.iter().map(|f| f.deletions).sum(),
        }
    }

    /// `git diff --shortstat` style summary line
    pub fn summary(&self) -> String {
        format!(
            "{} {} changed, {} {}(+), {} {}(-)",
            self.files_changed,
            if self.files_changed == 1 { "file" } else { "files" },
            self.insertions,
            if self.insertions == 1 { "insertion" } else { "insertions" },
            self.deletions,
            if self.deletions == 1 { "deletion" } else { "deletions" },
        )
    }
}

/// Parsed, per-file view of the difference between two states
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredDiff {
    pub files: Vec<FileChange>,
    pub stats: DiffStats,
    pub summary: String,
    /// Raw unified diff; absent when not requested or over the size ceiling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
}

impl StructuredDiff {
    pub fn new(files: Vec<FileChange>, patch: Option<String>) -> Self {
        let stats = DiffStats::from_files(&files);
        Self {
            summary: stats.summary(),
            files,
            stats,
            patch,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Knobs for diff computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffOptions {
    /// Byte ceiling for `patch`; larger patches are dropped, not truncated
    pub max_size: Option<usize>,
    /// Whether to produce `patch` at all
    pub include_patch: bool,
    /// Report untracked files as additions
    pub include_untracked: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            max_size: None,
            include_patch: true,
            include_untracked: false,
        }
    }
}

impl DiffOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = Some(max_size);
        self
    }

    pub fn with_patch(mut self, include: bool) -> Self {
        self.include_patch = include;
        self
    }

    pub fn with_untracked(mut self, include: bool) -> Self {
        self.include_untracked = include;
        self
    }
}

const DIFF_FLAGS: &[&str] = &["--no-color", "--no-ext-diff", "-M"];

/// Diff `base` (a commit or tree id) against the working tree.
///
/// `untracked` lists repository-relative paths that are reported as new files
/// when `options.include_untracked` is set.
pub(crate) async fn compute(
    git: &GitCommand,
    base: &str,
    untracked: &[String],
    options: &DiffOptions,
) -> Result<StructuredDiff> {
    let mut name_status_args = vec!["diff", "-z", "--name-status"];
    name_status_args.extend_from_slice(DIFF_FLAGS);
    name_status_args.extend_from_slice(&[base, "--"]);

    let mut numstat_args = vec!["diff", "-z", "--numstat"];
    numstat_args.extend_from_slice(DIFF_FLAGS);
    numstat_args.extend_from_slice(&[base, "--"]);

    let (name_status, numstat) =
        tokio::try_join!(git.run(&name_status_args), git.run(&numstat_args))?;

    let mut files = merge_entries(parse_name_status(&name_status)?, parse_numstat(&numstat)?);

    let untracked: &[String] = if options.include_untracked { untracked } else { &[] };
    let mut patchable = Vec::with_capacity(untracked.len());
    for path in untracked {
        let (change, has_patch) = untracked_change(git.working_dir(), path)?;
        if has_patch {
            patchable.push(path.clone());
        }
        files.push(change);
    }

    let patch = if options.include_patch {
        let text = build_patch(git, base, &patchable).await?;
        match options.max_size {
            Some(max) if text.len() > max => {
                debug!(patch_len = text.len(), max_size = max, "Patch exceeds size ceiling, omitting");
                None
            }
            _ => Some(text),
        }
    } else {
        None
    };

    let diff = StructuredDiff::new(files, patch);
    debug!(
        base = %base,
        files = diff.stats.files_changed,
        insertions = diff.stats.insertions,
        deletions = diff.stats.deletions,
        patch = diff.patch.is_some(),
        "Computed structured diff"
    );
    Ok(diff)
}

async fn build_patch(git: &GitCommand, base: &str, untracked: &[String]) -> Result<String> {
    let mut args = vec!["diff"];
    args.extend_from_slice(DIFF_FLAGS);
    args.extend_from_slice(&[base, "--"]);
    let mut patch = git.run(&args).await?;

    for path in untracked {
        let text = git
            .run_accepting(
                &["diff", "--no-index", "--no-color", "--no-ext-diff", "--", "/dev/null", path.as_str()],
                &[0, 1],
            )
            .await?;
        patch.push_str(&text);
    }

    Ok(patch)
}

/// One `--name-status -z` record
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NameStatus {
    pub status: FileStatus,
    pub path: String,
    pub old_path: Option<String>,
}

/// Parse `git diff -z --name-status` output.
///
/// Records are `STATUS\0PATH\0`, or `RNNN\0OLD\0NEW\0` for renames and copies.
pub(crate) fn parse_name_status(output: &str) -> Result<Vec<NameStatus>> {
    let mut fields = output.split('\0').filter(|f| !f.is_empty());
    let mut entries = Vec::new();

    while let Some(code) = fields.next() {
        let status = FileStatus::from_code(code)
            .ok_or_else(|| TrackerError::Parse(format!("unknown name-status code {code:?}")))?;
        let first = fields
            .next()
            .ok_or_else(|| TrackerError::Parse(format!("missing path after {code:?}")))?;

        let two_paths = code.starts_with('R') || code.starts_with('C');
        let entry = if two_paths {
            let second = fields
                .next()
                .ok_or_else(|| TrackerError::Parse(format!("missing target path for {first:?}")))?;
            NameStatus {
                status,
                path: second.to_string(),
                old_path: (status == FileStatus::Renamed).then(|| first.to_string()),
            }
        } else {
            NameStatus {
                status,
                path: first.to_string(),
                old_path: None,
            }
        };
        entries.push(entry);
    }

    Ok(entries)
}

/// Line counts keyed by destination path; `None` marks a binary file
pub(crate) type NumstatMap = HashMap<String, Option<(u64, u64)>>;

/// Parse `git diff -z --numstat` output.
///
/// Records are `ADD\tDEL\tPATH\0`, or `ADD\tDEL\t\0OLD\0NEW\0` for renames.
/// Binary files report `-` for both counts.
pub(crate) fn parse_numstat(output: &str) -> Result<NumstatMap> {
    let mut fields = output.split('\0');
    let mut map = NumstatMap::new();

    while let Some(record) = fields.next() {
        if record.is_empty() {
            continue;
        }
        let mut parts = record.splitn(3, '\t');
        let (Some(adds), Some(dels), Some(path)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(TrackerError::Parse(format!("malformed numstat record {record:?}")));
        };

        let path = if path.is_empty() {
            let _old = fields.next();
            fields
                .next()
                .ok_or_else(|| TrackerError::Parse(format!("missing rename target in {record:?}")))?
        } else {
            path
        };

        let counts = match (adds, dels) {
            ("-", "-") => None,
            _ => Some((parse_count(adds)?, parse_count(dels)?)),
        };
        map.insert(path.to_string(), counts);
    }

    Ok(map)
}

fn parse_count(s: &str) -> Result<u64> {
    s.parse()
        .map_err(|_| TrackerError::Parse(format!("invalid line count {s:?}")))
}

/// Join name-status order with numstat counts.
///
/// Text entries reported as modified with zero line changes (mode-only
/// changes) are dropped so every `modified` entry carries a line delta.
pub(crate) fn merge_entries(entries: Vec<NameStatus>, counts: NumstatMap) -> Vec<FileChange> {
    entries
        .into_iter()
        .filter_map(|entry| {
            let (additions, deletions, binary) = match counts.get(&entry.path) {
                Some(Some((a, d))) => (*a, *d, false),
                Some(None) => (0, 0, true),
                None => (0, 0, false),
            };
            if entry.status == FileStatus::Modified && !binary && additions + deletions == 0 {
                return None;
            }
            Some(FileChange {
                path: entry.path,
                status: entry.status,
                additions,
                deletions,
                old_path: entry.old_path,
                binary,
            })
        })
        .collect()
}

/// Report an untracked entry as an addition of all of its lines.
///
/// Symlinks are not followed: their content is the target path, as git
/// records it. A directory (an untracked nested repository) or a path that
/// cannot be opened under its reported name is an addition without line
/// counts, and the returned flag is false because `--no-index` has no patch
/// to produce for it.
fn untracked_change(root: &Path, path: &str) -> Result<(FileChange, bool)> {
    let full = root.join(path);
    let file_type = match std::fs::symlink_metadata(&full) {
        Ok(metadata) => metadata.file_type(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok((added(path, 0, false), false));
        }
        Err(e) => {
            return Err(TrackerError::io(
                format!("Inspecting untracked path {}", full.display()),
                e,
            ))
        }
    };

    if file_type.is_dir() {
        return Ok((added(path, 0, false), false));
    }

    let content = if file_type.is_symlink() {
        std::fs::read_link(&full)
            .map_err(|e| TrackerError::io(format!("Reading untracked link {}", full.display()), e))?
            .into_os_string()
            .into_encoded_bytes()
    } else {
        std::fs::read(&full)
            .map_err(|e| TrackerError::io(format!("Reading untracked file {}", full.display()), e))?
    };

    let binary = looks_binary(&content);
    let additions = if binary { 0 } else { count_lines(&content) };
    Ok((added(path, additions, binary), true))
}

fn added(path: &str, additions: u64, binary: bool) -> FileChange {
    FileChange {
        path: path.to_string(),
        status: FileStatus::Added,
        additions,
        deletions: 0,
        old_path: None,
        binary,
    }
}

/// Same heuristic git uses: a NUL byte in the first 8000 bytes
fn looks_binary(content: &[u8]) -> bool {
    content.iter().take(8000).any(|&b| b == 0)
}

fn count_lines(content: &[u8]) -> u64 {
    if content.is_empty() {
        return 0;
    }
    let newlines = content.iter().filter(|&&b| b == b'\n').count() as u64;
    if content.ends_with(b"\n") {
        newlines
    } else {
        newlines + 1
    }
}
