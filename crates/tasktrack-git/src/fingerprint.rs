use std::fmt;
use std::path::{Component, Path};

use git2::{DiffFormat, DiffOptions, ErrorCode, Repository};
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{Result, TrackerError};
use crate::status;

/// Directories that never hold task content in a plain directory
pub const DEFAULT_SKIP_DIRS: &[&str] = &[".git", ".hg", ".svn", "node_modules"];

/// Hex SHA-256 digest of a directory's content state
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    fn from_hasher(hasher: Sha256) -> Self {
        Fingerprint(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fingerprint of a git working tree: HEAD id, the full uncommitted diff
/// (untracked and binary content included), and the sorted untracked paths.
pub(crate) fn repository_fingerprint(repo: &Repository) -> Result<Fingerprint> {
    let mut hasher = Sha256::new();

    let head = status::head_commit(repo)?;
    if let Some(ref id) = head {
        hasher.update(id.as_bytes());
    }
    hasher.update([0u8]);

    let head_tree = match repo.head() {
        Ok(head) => Some(head.peel_to_tree()?),
        Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => None,
        Err(e) => return Err(e.into()),
    };

    let mut opts = DiffOptions::new();
    opts.include_untracked(true)
        .recurse_untracked_dirs(true)
        .show_untracked_content(true)
        .show_binary(true);

    let diff = repo.diff_tree_to_workdir_with_index(head_tree.as_ref(), Some(&mut opts))?;

    let mut diff_len = 0usize;
    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        let origin = line.origin();
        if matches!(origin, '+' | '-' | ' ') {
            let mut buf = [0u8; 4];
            hasher.update(origin.encode_utf8(&mut buf).as_bytes());
        }
        hasher.update(line.content());
        diff_len += line.content().len();
        true
    })?;
    hasher.update([0u8]);

    let (_, untracked) = status::working_tree_paths(repo)?;
    for path in &untracked {
        hasher.update(path.as_bytes());
        hasher.update(b"\n");
    }

    let fingerprint = Fingerprint::from_hasher(hasher);
    debug!(
        fingerprint = %fingerprint,
        diff_len,
        untracked = untracked.len(),
        "Computed repository fingerprint"
    );
    Ok(fingerprint)
}

/// Fingerprint of a directory without version control.
///
/// Every regular file below `dir` contributes `sha256(path \0 content)`,
/// with `path` relative and `/`-separated. Symlinks contribute their target
/// instead of being followed. Directories named in `skip_dirs` are pruned.
pub fn fingerprint_plain_directory(dir: &Path, skip_dirs: &[String]) -> Result<Fingerprint> {
    let skip: Vec<String> = skip_dirs.to_vec();

    let walker = WalkBuilder::new(dir)
        .standard_filters(false)
        .follow_links(false)
        .filter_entry(move |entry| {
            if entry.depth() == 0 {
                return true;
            }
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            !(is_dir && skip.iter().any(|s| entry.file_name() == s.as_str()))
        })
        .build();

    let mut digests = Vec::new();

    for entry in walker {
        let entry = entry.map_err(|e| TrackerError::Walk {
            path: dir.to_path_buf(),
            message: e.to_string(),
        })?;
        let Some(file_type) = entry.file_type() else {
            continue;
        };

        let path = entry.path();
        let content = if file_type.is_file() {
            std::fs::read(path)
                .map_err(|e| TrackerError::io(format!("Reading {}", path.display()), e))?
        } else if file_type.is_symlink() {
            let target = std::fs::read_link(path)
                .map_err(|e| TrackerError::io(format!("Reading link {}", path.display()), e))?;
            let mut content = b"symlink:".to_vec();
            content.extend_from_slice(target.as_os_str().as_encoded_bytes());
            content
        } else {
            continue;
        };

        let relative = relative_path(dir, path);
        digests.push(file_digest(&relative, &content));
    }

    let count = digests.len();
    let fingerprint = combine_file_digests(digests);
    debug!(fingerprint = %fingerprint, files = count, "Computed directory fingerprint");
    Ok(fingerprint)
}

/// Digest of one file's identity: its relative path and its bytes
pub fn file_digest(relative_path: impl AsRef<[u8]>, content: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(relative_path.as_ref());
    hasher.update([0u8]);
    hasher.update(content);
    hasher.finalize().into()
}

/// Combine per-file digests independently of the order they were produced in
pub fn combine_file_digests(mut digests: Vec<[u8; 32]>) -> Fingerprint {
    digests.sort_unstable();

    let mut hasher = Sha256::new();
    for digest in &digests {
        hasher.update(digest);
    }
    Fingerprint::from_hasher(hasher)
}

/// Raw `/`-separated relative path; non-UTF-8 names keep their exact bytes
fn relative_path(root: &Path, path: &Path) -> Vec<u8> {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let mut out = Vec::new();
    for part in rel.components().filter_map(|c| match c {
        Component::Normal(part) => Some(part),
        _ => None,
    }) {
        if !out.is_empty() {
            out.push(b'/');
        }
        out.extend_from_slice(part.as_encoded_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_is_order_independent() {
        let a = file_digest("a.txt", b"alpha");
        let b = file_digest("b.txt", b"beta");
        let c = file_digest("nested/c.txt", b"gamma");

        let forward = combine_file_digests(vec![a, b, c]);
        let reversed = combine_file_digests(vec![c, b, a]);
        let shuffled = combine_file_digests(vec![b, c, a]);

        assert_eq!(forward, reversed);
        assert_eq!(forward, shuffled);
        assert_eq!(forward.as_str().len(), 64);
    }

    #[test]
    fn path_is_part_of_the_digest() {
        assert_ne!(file_digest("a.txt", b"same"), file_digest("b.txt", b"same"));
    }

    #[test]
    fn path_and_content_boundary_is_unambiguous() {
        assert_ne!(file_digest("ab", b"c"), file_digest("a", b"bc"));
    }

    #[test]
    fn empty_set_has_a_stable_fingerprint() {
        assert_eq!(combine_file_digests(Vec::new()), combine_file_digests(Vec::new()));
    }

    #[test]
    fn relative_paths_use_forward_slashes() {
        let root = Path::new("/work");
        assert_eq!(relative_path(root, &root.join("src").join("main.rs")), b"src/main.rs");
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_names_are_hashed_by_their_bytes() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let root = Path::new("/work");
        let first = relative_path(root, &root.join(OsStr::from_bytes(b"data\xff")));
        let second = relative_path(root, &root.join(OsStr::from_bytes(b"data\xfe")));

        assert_ne!(first, second);
        assert_ne!(file_digest(&first, b"same"), file_digest(&second, b"same"));
    }
}
